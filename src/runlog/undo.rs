//! Reverse the renames recorded in a run log.
//!
//! File renames are undone first, newest first, then folder renames, newest
//! first, so every recorded path is valid again by the time it is used.
//! Folder renames the run already rolled back are left out.

use super::summary::{LogSummary, RenameEntry};
use super::{unique_log_path, RunLog, Tag};
use crate::config::UNDO_LOG_PREFIX;
use crate::executor::FsBackend;
use crate::scanner::EntryKind;
use chrono::Local;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoStep {
    pub kind: EntryKind,
    /// Where the entry is now.
    pub from: PathBuf,
    /// The name it had before the run.
    pub to: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoPlan {
    pub files: Vec<UndoStep>,
    pub dirs: Vec<UndoStep>,
}

impl UndoPlan {
    pub fn steps(&self) -> impl Iterator<Item = &UndoStep> {
        self.files.iter().chain(self.dirs.iter())
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct UndoOptions {
    pub dry_run: bool,
    /// Move an existing entry at the original name aside instead of skipping.
    pub force: bool,
    /// Steps per phase (files, then folders); 0 means all.
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoReport {
    pub moved: usize,
    pub would_move: usize,
    pub skipped: usize,
    pub failed: usize,
    pub backups: Vec<PathBuf>,
}

pub fn build_undo_plan(summary: &LogSummary) -> UndoPlan {
    let mut reverted: HashMap<(&str, &str), usize> = HashMap::new();
    for entry in &summary.rolled_back {
        *reverted
            .entry((entry.to.as_str(), entry.from.as_str()))
            .or_default() += 1;
    }

    let files = summary
        .renamed_files
        .iter()
        .rev()
        .map(|e| reverse(EntryKind::File, e))
        .collect();

    let mut dirs = Vec::new();
    for entry in summary.renamed_dirs.iter().rev() {
        if let Some(count) = reverted.get_mut(&(entry.from.as_str(), entry.to.as_str())) {
            if *count > 0 {
                *count -= 1;
                continue;
            }
        }
        dirs.push(reverse(EntryKind::Folder, entry));
    }

    UndoPlan { files, dirs }
}

fn reverse(kind: EntryKind, entry: &RenameEntry) -> UndoStep {
    UndoStep {
        kind,
        from: PathBuf::from(&entry.to),
        to: PathBuf::from(&entry.from),
    }
}

/// `undo_<log stem>_<timestamp>.log` next to the source log.
pub fn undo_log_path(source_log: &Path) -> PathBuf {
    let dir = source_log.parent().unwrap_or_else(|| Path::new("."));
    let stem = source_log
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    unique_log_path(
        dir,
        &format!(
            "{}{}_{}",
            UNDO_LOG_PREFIX,
            stem,
            Local::now().format("%Y%m%d_%H%M%S")
        ),
    )
}

pub fn apply_undo<B: FsBackend + ?Sized>(
    plan: &UndoPlan,
    options: &UndoOptions,
    backend: &B,
    log: &mut RunLog,
) -> UndoReport {
    let mut report = UndoReport::default();
    let limit = if options.limit == 0 {
        usize::MAX
    } else {
        options.limit
    };

    let phases = [&plan.files, &plan.dirs];
    for step in phases.into_iter().flat_map(|phase| phase.iter().take(limit)) {
        let body = format!("{} -> {}", step.from.display(), step.to.display());
        if options.dry_run {
            log.info(Tag::WouldUndo, body);
            report.would_move += 1;
            continue;
        }

        match move_back(step, options.force, backend) {
            Ok(backup) => {
                if let Some(backup) = backup {
                    log.warn(
                        Tag::UndoMove,
                        format!("backed up {} to {}", step.to.display(), backup.display()),
                    );
                    report.backups.push(backup);
                }
                log.info(Tag::UndoMove, body);
                report.moved += 1;
            }
            Err(UndoFailure::Skip(reason)) => {
                log.warn(Tag::UndoSkip, format!("{} : {}", body, reason));
                report.skipped += 1;
            }
            Err(UndoFailure::Io(e)) => {
                log.error(Tag::UndoSkip, format!("{} : {}", body, e));
                report.failed += 1;
            }
        }
    }

    info!(
        "Undo: {} moved, {} would move, {} skipped, {} failed",
        report.moved, report.would_move, report.skipped, report.failed
    );
    report
}

enum UndoFailure {
    Skip(&'static str),
    Io(io::Error),
}

fn move_back<B: FsBackend + ?Sized>(
    step: &UndoStep,
    force: bool,
    backend: &B,
) -> Result<Option<PathBuf>, UndoFailure> {
    if !backend.exists(&step.from) {
        return Err(UndoFailure::Skip("source missing"));
    }

    let mut backup = None;
    if backend.exists(&step.to) {
        if !force {
            return Err(UndoFailure::Skip("target exists, use --force"));
        }
        let aside = backup_path(&step.to);
        backend.rename(&step.to, &aside).map_err(UndoFailure::Io)?;
        backup = Some(aside);
    }

    if let Some(parent) = step.to.parent() {
        if !backend.exists(parent) {
            backend.create_dir_all(parent).map_err(UndoFailure::Io)?;
        }
    }
    backend.rename(&step.from, &step.to).map_err(UndoFailure::Io)?;
    Ok(backup)
}

fn backup_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(
        "{}.bak_undo_{}",
        name,
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

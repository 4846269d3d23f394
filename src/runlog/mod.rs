//! Append-only, per-run log.
//!
//! Each entry is kept in memory for the [`RunRecord`] and written straight
//! through to a line-oriented log file:
//!
//! ```text
//! <rfc3339 timestamp>\t<LEVEL>\t<TAG>\t<body>
//! ```
//!
//! Rename bodies read `<from> -> <to>`. If the file cannot be written the log
//! keeps going in memory and on the console.

pub mod summary;
pub mod undo;

use crate::config::LOG_PREFIX;
use crate::error::Error;
use crate::executor::RunMode;
use crate::planner::RenameOperation;
use crate::scanner::EntryKind;
use chrono::{DateTime, FixedOffset, Local};
use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const RENAME_SEPARATOR: &str = " -> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARN",
            Level::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(Level::Info),
            "WARN" => Some(Level::Warning),
            "ERROR" => Some(Level::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tag {
    Start,
    Mode,
    MaxDepth,
    Abort,
    Plan,
    Warning,
    Skip,
    WouldRenameDir,
    WouldRenameFile,
    RenamedDir,
    RenamedFile,
    SkippedRename,
    ErrorRenamingDir,
    ErrorRenamingFile,
    RollbackDir,
    ErrorRollback,
    TempDirCreated,
    TempDirRemoved,
    TempDirKept,
    Cancelled,
    Finished,
    WouldUndo,
    UndoMove,
    UndoSkip,
}

impl Tag {
    const ALL: [Tag; 24] = [
        Tag::Start,
        Tag::Mode,
        Tag::MaxDepth,
        Tag::Abort,
        Tag::Plan,
        Tag::Warning,
        Tag::Skip,
        Tag::WouldRenameDir,
        Tag::WouldRenameFile,
        Tag::RenamedDir,
        Tag::RenamedFile,
        Tag::SkippedRename,
        Tag::ErrorRenamingDir,
        Tag::ErrorRenamingFile,
        Tag::RollbackDir,
        Tag::ErrorRollback,
        Tag::TempDirCreated,
        Tag::TempDirRemoved,
        Tag::TempDirKept,
        Tag::Cancelled,
        Tag::Finished,
        Tag::WouldUndo,
        Tag::UndoMove,
        Tag::UndoSkip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Start => "START",
            Tag::Mode => "MODE",
            Tag::MaxDepth => "MAX_DEPTH",
            Tag::Abort => "ABORT",
            Tag::Plan => "PLAN",
            Tag::Warning => "WARNING",
            Tag::Skip => "SKIP",
            Tag::WouldRenameDir => "WOULD_RENAME_DIR",
            Tag::WouldRenameFile => "WOULD_RENAME_FILE",
            Tag::RenamedDir => "RENAMED_DIR",
            Tag::RenamedFile => "RENAMED_FILE",
            Tag::SkippedRename => "SKIPPED_RENAME",
            Tag::ErrorRenamingDir => "ERROR_RENAMING_DIR",
            Tag::ErrorRenamingFile => "ERROR_RENAMING_FILE",
            Tag::RollbackDir => "ROLLBACK_DIR",
            Tag::ErrorRollback => "ERROR_ROLLBACK",
            Tag::TempDirCreated => "TEMP_DIR_CREATED",
            Tag::TempDirRemoved => "TEMP_DIR_REMOVED",
            Tag::TempDirKept => "TEMP_DIR_KEPT",
            Tag::Cancelled => "CANCELLED",
            Tag::Finished => "FINISHED",
            Tag::WouldUndo => "WOULD_UNDO",
            Tag::UndoMove => "UNDO_MOVE",
            Tag::UndoSkip => "UNDO_SKIP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Tag::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    WouldApply,
    Applied,
    Skipped,
    Failed,
    RolledBack,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::WouldApply => "would apply",
            Outcome::Applied => "applied",
            Outcome::Skipped => "skipped",
            Outcome::Failed => "failed",
            Outcome::RolledBack => "rolled back",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Completed,
    CompletedWithErrors,
    Cancelled,
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithErrors => "completed with errors",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub tag: Tag,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub operation: RenameOperation,
    pub outcome: Outcome,
    pub message: String,
}

/// Everything one run did, finalized when the run ends.
#[derive(Debug)]
pub struct RunRecord {
    pub root: PathBuf,
    pub mode: RunMode,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub status: RunStatus,
    pub operations: Vec<OperationRecord>,
    pub events: Vec<LogEvent>,
    pub log_path: Option<PathBuf>,
    pub failure: Option<Error>,
}

impl RunRecord {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.operations
            .iter()
            .filter(|r| r.outcome == outcome)
            .count()
    }

    pub fn events_tagged(&self, tag: Tag) -> impl Iterator<Item = &LogEvent> {
        self.events.iter().filter(move |e| e.tag == tag)
    }
}

pub struct RunLog {
    root: PathBuf,
    mode: RunMode,
    started_at: DateTime<Local>,
    path: Option<PathBuf>,
    file: Option<File>,
    events: Vec<LogEvent>,
    operations: Vec<OperationRecord>,
}

impl RunLog {
    /// Log for a rename run. Real runs write under the root unless `log_dir`
    /// says otherwise; dry runs only persist when `log_dir` is given.
    pub fn for_run(root: &Path, mode: RunMode, log_dir: Option<&Path>) -> Self {
        let dir = match (log_dir, mode) {
            (Some(dir), _) => Some(dir.to_path_buf()),
            (None, RunMode::Real) => Some(root.to_path_buf()),
            (None, RunMode::DryRun) => None,
        };
        let started_at = Local::now();
        let path = dir.map(|dir| {
            unique_log_path(&dir, &format!("{}{}", LOG_PREFIX, started_at.format("%Y%m%d_%H%M%S")))
        });
        Self::open_at(root, mode, path, started_at)
    }

    /// Log written to an explicit file, or kept in memory only.
    pub fn open(root: &Path, mode: RunMode, path: Option<PathBuf>) -> Self {
        Self::open_at(root, mode, path, Local::now())
    }

    fn open_at(
        root: &Path,
        mode: RunMode,
        path: Option<PathBuf>,
        started_at: DateTime<Local>,
    ) -> Self {
        let file = path.as_ref().and_then(|p| {
            match OpenOptions::new().create(true).append(true).open(p) {
                Ok(f) => Some(f),
                Err(e) => {
                    warn!(
                        "Cannot write run log {}: {}; continuing with console only",
                        p.display(),
                        e
                    );
                    None
                }
            }
        });
        let path = if file.is_some() { path } else { None };
        Self {
            root: root.to_path_buf(),
            mode,
            started_at,
            path,
            file,
            events: Vec::new(),
            operations: Vec::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_persisted(&self) -> bool {
        self.file.is_some()
    }

    pub fn info(&mut self, tag: Tag, message: impl Into<String>) {
        self.write(Level::Info, tag, message);
    }

    pub fn warn(&mut self, tag: Tag, message: impl Into<String>) {
        self.write(Level::Warning, tag, message);
    }

    pub fn error(&mut self, tag: Tag, message: impl Into<String>) {
        self.write(Level::Error, tag, message);
    }

    pub fn write(&mut self, level: Level, tag: Tag, message: impl Into<String>) {
        let message = message.into().replace(['\t', '\n', '\r'], " ");
        let timestamp = Local::now();

        match level {
            Level::Info => info!("{}: {}", tag, message),
            Level::Warning => warn!("{}: {}", tag, message),
            Level::Error => error!("{}: {}", tag, message),
        }

        if let Some(file) = self.file.as_mut() {
            let line = format_line(&timestamp, level, tag, &message);
            if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
                let path = self.path.take().unwrap_or_default();
                warn!(
                    "{}",
                    Error::Logging {
                        path,
                        source: e
                    }
                );
                self.file = None;
            }
        }

        self.events.push(LogEvent {
            timestamp,
            level,
            tag,
            message,
        });
    }

    /// Record the outcome of one planned operation.
    pub fn record(&mut self, op: &RenameOperation, outcome: Outcome, message: impl Into<String>) {
        let message = message.into();
        let folder = op.kind == EntryKind::Folder;
        let forward = format!(
            "{}{}{}",
            op.resolved_source().display(),
            RENAME_SEPARATOR,
            op.target_path().display()
        );
        let (level, tag, body) = match outcome {
            Outcome::WouldApply => (
                Level::Info,
                if folder { Tag::WouldRenameDir } else { Tag::WouldRenameFile },
                forward,
            ),
            Outcome::Applied => (
                Level::Info,
                if folder { Tag::RenamedDir } else { Tag::RenamedFile },
                forward,
            ),
            Outcome::Skipped => (Level::Info, Tag::SkippedRename, with_note(forward, &message)),
            Outcome::Failed => (
                Level::Error,
                if folder { Tag::ErrorRenamingDir } else { Tag::ErrorRenamingFile },
                with_note(forward, &message),
            ),
            Outcome::RolledBack => (
                Level::Warning,
                Tag::RollbackDir,
                format!(
                    "{}{}{}",
                    op.target_path().display(),
                    RENAME_SEPARATOR,
                    op.resolved_source().display()
                ),
            ),
        };
        self.write(level, tag, body);
        self.operations.push(OperationRecord {
            operation: op.clone(),
            outcome,
            message,
        });
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn operations(&self) -> &[OperationRecord] {
        &self.operations
    }

    /// Write the closing line, sync the file and hand back the record.
    pub fn finish(mut self, status: RunStatus, failure: Option<Error>) -> RunRecord {
        let level = match status {
            RunStatus::Completed | RunStatus::Cancelled => Level::Info,
            RunStatus::CompletedWithErrors => Level::Warning,
            RunStatus::Aborted => Level::Error,
        };
        self.write(level, Tag::Finished, status.to_string());
        if let Some(file) = self.file.as_ref() {
            if let Err(e) = file.sync_data() {
                warn!("Cannot sync run log: {}", e);
            }
        }
        RunRecord {
            root: self.root,
            mode: self.mode,
            started_at: self.started_at,
            finished_at: Local::now(),
            status,
            operations: self.operations,
            events: self.events,
            log_path: self.path,
            failure,
        }
    }
}

fn with_note(body: String, note: &str) -> String {
    if note.is_empty() {
        body
    } else {
        format!("{} : {}", body, note)
    }
}

fn format_line(timestamp: &DateTime<Local>, level: Level, tag: Tag, message: &str) -> String {
    format!("{}\t{}\t{}\t{}\n", timestamp.to_rfc3339(), level, tag, message)
}

/// `<dir>/<stem>.log`, or `<stem>_<n>.log` when a file by that name exists.
pub fn unique_log_path(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{}.log", stem));
    if !first.exists() {
        return first;
    }
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{}_{}.log", stem, n));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// One parsed line of a run log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub level: Level,
    pub tag: Tag,
    pub body: String,
}

impl LogLine {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.trim_end_matches(['\r', '\n']).splitn(4, '\t');
        let timestamp = DateTime::parse_from_rfc3339(parts.next()?).ok();
        let level = Level::parse(parts.next()?)?;
        let tag = Tag::parse(parts.next()?)?;
        let body = parts.next().unwrap_or_default().to_string();
        Some(Self {
            timestamp,
            level,
            tag,
            body,
        })
    }

    /// `(from, to)` of a rename body, ignoring any trailing ` : note`.
    pub fn rename_pair(&self) -> Option<(String, String)> {
        let (from, rest) = self.body.split_once(RENAME_SEPARATOR)?;
        let to = rest.split_once(" : ").map(|(to, _)| to).unwrap_or(rest);
        Some((from.trim().to_string(), to.trim().to_string()))
    }
}

/// Read all lines of a log file, for the summary and undo tools.
pub fn read_lines(path: &Path) -> Result<Vec<String>, Error> {
    let text = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => Error::Logging {
            path: path.to_path_buf(),
            source,
        },
        _ => Error::Io(source),
    })?;
    Ok(text.lines().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_op(root: &Path) -> RenameOperation {
        RenameOperation {
            kind: EntryKind::Folder,
            source_path: root.join("Old Name"),
            resolved_parent: root.to_path_buf(),
            target_name: "old_name".to_string(),
            sequence_index: None,
        }
    }

    #[test]
    fn test_tags_roundtrip() {
        for tag in Tag::ALL {
            assert_eq!(Tag::parse(tag.as_str()), Some(tag));
        }
        assert_eq!(Tag::parse("NOPE"), None);
    }

    #[test]
    fn test_real_run_log_lands_under_root() {
        let tmp = tempdir().unwrap();
        let mut log = RunLog::for_run(tmp.path(), RunMode::Real, None);
        let path = log.path().unwrap().to_path_buf();
        assert!(path.starts_with(tmp.path()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(LOG_PREFIX));

        log.info(Tag::Start, "root=somewhere");
        log.record(&sample_op(tmp.path()), Outcome::Applied, "");
        let record = log.finish(RunStatus::Completed, None);

        let lines = read_lines(&path).unwrap();
        assert_eq!(lines.len(), 3);
        let parsed: Vec<LogLine> = lines.iter().filter_map(|l| LogLine::parse(l)).collect();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1].tag, Tag::RenamedDir);
        let (from, to) = parsed[1].rename_pair().unwrap();
        assert!(from.ends_with("Old Name"));
        assert!(to.ends_with("old_name"));
        assert_eq!(parsed[2].tag, Tag::Finished);
        assert!(parsed[0].timestamp.is_some());

        assert_eq!(record.count(Outcome::Applied), 1);
        assert_eq!(record.log_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_dry_run_log_stays_in_memory() {
        let tmp = tempdir().unwrap();
        let mut log = RunLog::for_run(tmp.path(), RunMode::DryRun, None);
        assert!(log.path().is_none());
        log.record(&sample_op(tmp.path()), Outcome::WouldApply, "");
        let record = log.finish(RunStatus::Completed, None);
        assert_eq!(record.count(Outcome::WouldApply), 1);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unwritable_log_degrades() {
        let tmp = tempdir().unwrap();
        let missing_dir = tmp.path().join("no/such/dir");
        let mut log = RunLog::for_run(tmp.path(), RunMode::Real, Some(&missing_dir));
        assert!(!log.is_persisted());
        log.warn(Tag::Warning, "still recorded");
        let record = log.finish(RunStatus::Completed, None);
        assert_eq!(record.events.len(), 2);
        assert!(record.log_path.is_none());
    }

    #[test]
    fn test_failed_rename_note_is_not_part_of_target() {
        let line = LogLine::parse(
            "2024-01-01T10:00:00+01:00\tERROR\tERROR_RENAMING_FILE\t/a/b.tif -> /a/c.tif : permission denied",
        )
        .unwrap();
        assert_eq!(line.level, Level::Error);
        assert_eq!(
            line.rename_pair(),
            Some(("/a/b.tif".to_string(), "/a/c.tif".to_string()))
        );
        assert!(LogLine::parse("garbage line").is_none());
    }

    #[test]
    fn test_unique_log_path() {
        let tmp = tempdir().unwrap();
        let first = unique_log_path(tmp.path(), "archive_rename_log_x");
        std::fs::write(&first, "").unwrap();
        let second = unique_log_path(tmp.path(), "archive_rename_log_x");
        assert_ne!(first, second);
        assert!(second.ends_with("archive_rename_log_x_1.log"));
    }
}

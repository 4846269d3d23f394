use crate::config::{AppConfig, LOG_PREFIX, STAGING_PREFIX, UNDO_LOG_PREFIX};
use crate::error::Error;
use glob::Pattern;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use walkdir::WalkDir;

/// The directory an operator pointed the tool at. Never renamed or moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSelection {
    path: PathBuf,
}

impl RootSelection {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::RootMissing(path.to_path_buf()));
            }
            Err(err) => return Err(Error::Io(err)),
        };
        if !metadata.is_dir() {
            return Err(Error::RootNotADirectory(path.to_path_buf()));
        }
        Ok(Self {
            path: fs::canonicalize(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Folder,
    File,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Folder => write!(f, "folder"),
            EntryKind::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Absolute path at snapshot time.
    pub path: PathBuf,
    pub relative: PathBuf,
    /// Number of segments in `relative`.
    pub depth: usize,
    pub kind: EntryKind,
    /// Lowercased extension without the dot, files only.
    pub extension: Option<String>,
}

impl TreeEntry {
    pub fn name(&self) -> String {
        self.relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn parent_relative(&self) -> &Path {
        self.relative.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Depth of the folder this entry lives in, or of the folder itself.
    pub fn folder_depth(&self) -> usize {
        match self.kind {
            EntryKind::Folder => self.depth,
            EntryKind::File => self.depth.saturating_sub(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    Staging,
    RunLog,
    Symlink,
    Ignored,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExclusionReason::Staging => "staging directory",
            ExclusionReason::RunLog => "run log",
            ExclusionReason::Symlink => "symlink",
            ExclusionReason::Ignored => "ignore pattern",
        };
        write!(f, "{}", s)
    }
}

/// Entries left out of the snapshot. Their names still occupy their parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedEntry {
    pub relative: PathBuf,
    pub reason: ExclusionReason,
}

/// One walk of the tree, taken before anything is mutated.
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    pub root: PathBuf,
    pub entries: Vec<TreeEntry>,
    pub excluded: Vec<ExcludedEntry>,
}

impl TreeSnapshot {
    /// Walk the tree under `root` once, sorted by file name, without
    /// following symlinks.
    pub fn capture(root: &RootSelection, config: &AppConfig) -> Result<Self, Error> {
        let ignore_patterns: Vec<Pattern> = config
            .ignore_patterns
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        let mut entries = Vec::new();
        let mut excluded = Vec::new();

        let mut walker = WalkDir::new(root.path())
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(next) = walker.next() {
            let entry = next?;
            let relative = match entry.path().strip_prefix(root.path()) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };
            let file_type = entry.file_type();
            let name = entry.file_name().to_string_lossy();

            let reason = if file_type.is_symlink() {
                Some(ExclusionReason::Symlink)
            } else if file_type.is_dir() && name.starts_with(STAGING_PREFIX) {
                Some(ExclusionReason::Staging)
            } else if file_type.is_file() && is_run_log_name(&name) {
                Some(ExclusionReason::RunLog)
            } else if ignore_patterns.iter().any(|p| p.matches_path(entry.path())) {
                Some(ExclusionReason::Ignored)
            } else {
                None
            };

            if let Some(reason) = reason {
                if file_type.is_dir() {
                    walker.skip_current_dir();
                }
                debug!("Excluding {} ({})", entry.path().display(), reason);
                excluded.push(ExcludedEntry { relative, reason });
                continue;
            }

            let kind = if file_type.is_dir() {
                EntryKind::Folder
            } else {
                EntryKind::File
            };
            let extension = match kind {
                EntryKind::File => relative
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase()),
                EntryKind::Folder => None,
            };

            entries.push(TreeEntry {
                path: entry.path().to_path_buf(),
                depth: relative.components().count(),
                relative,
                kind,
                extension,
            });
        }

        debug!(
            "Snapshot of {}: {} entries, {} excluded",
            root.path().display(),
            entries.len(),
            excluded.len()
        );

        Ok(Self {
            root: root.path().to_path_buf(),
            entries,
            excluded,
        })
    }

    pub fn files(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::File)
    }

    pub fn folders(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::Folder)
    }
}

pub fn is_run_log_name(name: &str) -> bool {
    let undo_prefix = format!("{}{}", UNDO_LOG_PREFIX, LOG_PREFIX);
    name.ends_with(".log") && (name.starts_with(LOG_PREFIX) || name.starts_with(&undo_prefix))
}

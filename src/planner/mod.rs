//! Turns a validated snapshot into an ordered, immutable rename plan.
//!
//! Folder operations come first, deepest first, so a child is always renamed
//! while its recorded parent path is still valid. File operations carry the
//! leaf folder path as it will look after the folder pass; nothing here
//! touches the filesystem.

pub mod naming;

use crate::config::{is_allowed_extension, AppConfig, FileOrder, PLACEHOLDER};
use crate::error::Error;
use crate::normalize::{normalize, tidy_separators};
use crate::scanner::{EntryKind, TreeEntry, ValidatedTree};
use naming::{natural_cmp, NamingContext};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOperation {
    pub kind: EntryKind,
    /// Path of the entry in the pre-mutation snapshot.
    pub source_path: PathBuf,
    /// Containing folder as it exists when this operation runs.
    pub resolved_parent: PathBuf,
    pub target_name: String,
    pub sequence_index: Option<u32>,
}

impl RenameOperation {
    pub fn source_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Where the entry is when this operation runs.
    pub fn resolved_source(&self) -> PathBuf {
        match self.source_path.file_name() {
            Some(name) => self.resolved_parent.join(name),
            None => self.source_path.clone(),
        }
    }

    pub fn target_path(&self) -> PathBuf {
        self.resolved_parent.join(&self.target_name)
    }
}

impl fmt::Display for RenameOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.resolved_source().display(),
            self.target_path().display()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedExtension,
    NotInLeafFolder,
    AtRootLevel,
    AlreadyNamed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::UnsupportedExtension => "unsupported extension",
            SkipReason::NotInLeafFolder => "not in a leaf folder",
            SkipReason::AtRootLevel => "at root level",
            SkipReason::AlreadyNamed => "already named",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Non-fatal naming problems, resolved with a fallback name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanWarning {
    EmptyName { path: PathBuf, assigned: String },
    Collision {
        path: PathBuf,
        wanted: String,
        assigned: String,
    },
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanWarning::EmptyName { path, assigned } => write!(
                f,
                "name of {} normalizes to nothing, using '{}'",
                path.display(),
                assigned
            ),
            PlanWarning::Collision {
                path,
                wanted,
                assigned,
            } => write!(
                f,
                "'{}' for {} is taken, using '{}'",
                wanted,
                path.display(),
                assigned
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenamePlan {
    pub root: PathBuf,
    pub folder_ops: Vec<RenameOperation>,
    pub file_ops: Vec<RenameOperation>,
    pub skipped: Vec<SkippedFile>,
    pub warnings: Vec<PlanWarning>,
}

impl RenamePlan {
    /// Every operation in execution order.
    pub fn operations(&self) -> impl Iterator<Item = &RenameOperation> {
        self.folder_ops.iter().chain(self.file_ops.iter())
    }

    pub fn len(&self) -> usize {
        self.folder_ops.len() + self.file_ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Refuse any operation that would move the root or reach outside it.
pub fn guard_root(op: &RenameOperation, root: &Path) -> Result<(), Error> {
    for path in [&op.source_path, &op.resolved_source()] {
        if path.as_path() == root || !path.starts_with(root) {
            return Err(Error::RootTargeted(path.to_path_buf()));
        }
    }
    Ok(())
}

pub fn plan(tree: ValidatedTree<'_>, config: &AppConfig) -> Result<RenamePlan, Error> {
    let snapshot = tree.snapshot();
    let root = snapshot.root.clone();

    let mut children: BTreeMap<&Path, Vec<&TreeEntry>> = BTreeMap::new();
    for entry in &snapshot.entries {
        children.entry(entry.parent_relative()).or_default().push(entry);
    }
    let mut occupied: HashMap<&Path, Vec<String>> = HashMap::new();
    for excluded in &snapshot.excluded {
        if let Some(name) = excluded.relative.file_name() {
            occupied
                .entry(excluded.relative.parent().unwrap_or_else(|| Path::new("")))
                .or_default()
                .push(name.to_string_lossy().into_owned());
        }
    }

    let mut warnings = Vec::new();
    let final_names = assign_folder_names(&children, &occupied, config, &mut warnings);

    let mut folder_ops: Vec<(usize, RenameOperation)> = Vec::new();
    for folder in snapshot.folders() {
        let Some(assigned) = final_names.get(&folder.relative) else {
            continue;
        };
        if *assigned == folder.name() {
            continue;
        }
        folder_ops.push((
            folder.depth,
            RenameOperation {
                kind: EntryKind::Folder,
                source_path: folder.path.clone(),
                resolved_parent: root.join(folder.parent_relative()),
                target_name: assigned.clone(),
                sequence_index: None,
            },
        ));
    }
    folder_ops.sort_by(|(da, a), (db, b)| {
        Reverse(*da)
            .cmp(&Reverse(*db))
            .then_with(|| a.source_path.cmp(&b.source_path))
    });
    let folder_ops: Vec<RenameOperation> = folder_ops.into_iter().map(|(_, op)| op).collect();

    let has_subfolders: HashSet<&Path> = snapshot
        .folders()
        .map(|f| f.parent_relative())
        .collect();

    let mut file_ops = Vec::new();
    let mut skipped = Vec::new();
    for (parent, siblings) in &children {
        let files: Vec<&TreeEntry> = siblings
            .iter()
            .copied()
            .filter(|e| e.kind == EntryKind::File)
            .collect();
        if files.is_empty() {
            continue;
        }

        let folder_reason = if parent.as_os_str().is_empty() {
            Some(SkipReason::AtRootLevel)
        } else if has_subfolders.contains(parent) {
            Some(SkipReason::NotInLeafFolder)
        } else {
            None
        };
        if let Some(reason) = folder_reason {
            skipped.extend(files.iter().map(|f| SkippedFile {
                path: f.path.clone(),
                reason,
            }));
            continue;
        }

        let (mut accepted, rejected): (Vec<&TreeEntry>, Vec<&TreeEntry>) = files
            .into_iter()
            .partition(|f| f.extension.as_deref().is_some_and(is_allowed_extension));
        skipped.extend(rejected.iter().map(|f| SkippedFile {
            path: f.path.clone(),
            reason: SkipReason::UnsupportedExtension,
        }));
        if accepted.is_empty() {
            continue;
        }
        match config.file_order {
            FileOrder::Lexical => accepted.sort_by_key(|f| f.name()),
            FileOrder::Natural => accepted.sort_by(|a, b| natural_cmp(&a.name(), &b.name())),
        }

        let context = NamingContext::from_nearest_first(&ancestor_names(parent, &final_names));
        let resolved_parent = root.join(resolve_relative(parent, &final_names));

        for (i, file) in accepted.iter().enumerate() {
            let sequence = (i + 1) as u32;
            let target_name = context.file_name(sequence, file.extension.as_deref());
            if target_name == file.name() {
                skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason: SkipReason::AlreadyNamed,
                });
                continue;
            }
            file_ops.push(RenameOperation {
                kind: EntryKind::File,
                source_path: file.path.clone(),
                resolved_parent: resolved_parent.clone(),
                target_name,
                sequence_index: Some(sequence),
            });
        }
    }

    let plan = RenamePlan {
        root,
        folder_ops,
        file_ops,
        skipped,
        warnings,
    };
    for op in plan.operations() {
        guard_root(op, &plan.root)?;
    }

    debug!(
        "Planned {} folder and {} file renames, {} skipped, {} warnings",
        plan.folder_ops.len(),
        plan.file_ops.len(),
        plan.skipped.len(),
        plan.warnings.len()
    );
    Ok(plan)
}

fn canonical_name(name: &str, config: &AppConfig) -> String {
    let normalized = normalize(name, EntryKind::Folder);
    if config.tidy_separators {
        tidy_separators(&normalized)
    } else {
        normalized
    }
}

/// Final name of every folder, keyed by its snapshot-relative path.
///
/// Within one parent, folders already in canonical form keep their names;
/// the rest claim names in lexical order, falling back to `_dup<N>` suffixes
/// and the placeholder for names that normalize to nothing.
fn assign_folder_names(
    children: &BTreeMap<&Path, Vec<&TreeEntry>>,
    occupied: &HashMap<&Path, Vec<String>>,
    config: &AppConfig,
    warnings: &mut Vec<PlanWarning>,
) -> HashMap<PathBuf, String> {
    let mut final_names = HashMap::new();

    for (parent, siblings) in children {
        let mut taken: BTreeSet<String> = siblings
            .iter()
            .filter(|e| e.kind == EntryKind::File)
            .map(|e| e.name())
            .collect();
        if let Some(names) = occupied.get(parent) {
            taken.extend(names.iter().cloned());
        }

        let mut folders: Vec<(&TreeEntry, String)> = siblings
            .iter()
            .filter(|e| e.kind == EntryKind::Folder)
            .map(|e| (*e, e.name()))
            .collect();
        folders.sort_by(|a, b| a.1.cmp(&b.1));

        let mut pending = Vec::new();
        for (folder, current) in folders {
            let canonical = canonical_name(&current, config);
            if canonical == current && !taken.contains(&current) {
                taken.insert(current.clone());
                final_names.insert(folder.relative.clone(), current);
            } else {
                pending.push((folder, canonical));
            }
        }

        for (folder, canonical) in pending {
            let empty = canonical.is_empty();
            let wanted = if empty {
                PLACEHOLDER.to_string()
            } else {
                canonical
            };
            let assigned = unique_name(&wanted, &taken);
            if empty {
                warnings.push(PlanWarning::EmptyName {
                    path: folder.path.clone(),
                    assigned: assigned.clone(),
                });
            } else if assigned != wanted {
                warnings.push(PlanWarning::Collision {
                    path: folder.path.clone(),
                    wanted,
                    assigned: assigned.clone(),
                });
            }
            taken.insert(assigned.clone());
            final_names.insert(folder.relative.clone(), assigned);
        }
    }

    final_names
}

fn unique_name(wanted: &str, taken: &BTreeSet<String>) -> String {
    if !taken.contains(wanted) {
        return wanted.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}_dup{}", wanted, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Final names of `folder` and its ancestors, nearest first, root excluded.
fn ancestor_names(folder: &Path, final_names: &HashMap<PathBuf, String>) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = Some(folder);
    while let Some(path) = current {
        if path.as_os_str().is_empty() {
            break;
        }
        let name = final_names.get(path).cloned().unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        names.push(name);
        current = path.parent();
    }
    names
}

/// The relative path of `folder` once every folder on it has been renamed.
fn resolve_relative(folder: &Path, final_names: &HashMap<PathBuf, String>) -> PathBuf {
    let mut prefix = PathBuf::new();
    let mut resolved = PathBuf::new();
    for component in folder.components() {
        prefix.push(component);
        match final_names.get(&prefix) {
            Some(name) => resolved.push(name),
            None => resolved.push(component),
        }
    }
    resolved
}

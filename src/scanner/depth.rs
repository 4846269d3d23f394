use super::walk::TreeSnapshot;
use crate::error::Error;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Result of checking every file's containing-folder depth against a limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthReport {
    pub limit: usize,
    pub max_found: usize,
    /// Every file deeper than `limit`, in snapshot order.
    pub violations: Vec<PathBuf>,
}

impl DepthReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A snapshot that passed depth validation. Only [`validate_tree`] makes one.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedTree<'a> {
    snapshot: &'a TreeSnapshot,
    max_found: usize,
}

impl<'a> ValidatedTree<'a> {
    pub fn snapshot(&self) -> &'a TreeSnapshot {
        self.snapshot
    }

    pub fn max_depth(&self) -> usize {
        self.max_found
    }
}

pub fn validate(snapshot: &TreeSnapshot, limit: usize) -> DepthReport {
    let mut max_found = 0;
    let mut violations = Vec::new();

    for file in snapshot.files() {
        let depth = file.folder_depth();
        max_found = max_found.max(depth);
        if depth > limit {
            debug!("{} sits at depth {}", file.path.display(), depth);
            violations.push(file.path.clone());
        }
    }

    DepthReport {
        limit,
        max_found,
        violations,
    }
}

/// Validate and, on success, hand back the tree the planner is allowed to use.
pub fn validate_tree(snapshot: &TreeSnapshot, limit: usize) -> Result<ValidatedTree<'_>, Error> {
    let report = validate(snapshot, limit);
    if !report.is_ok() {
        warn!(
            "Found relative depth {} > allowed {} in {} files",
            report.max_found,
            report.limit,
            report.violations.len()
        );
        return Err(Error::DepthExceeded {
            limit: report.limit,
            found: report.max_found,
            violations: report.violations,
        });
    }
    Ok(ValidatedTree {
        snapshot,
        max_found: report.max_found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, MAX_RELATIVE_DEPTH};
    use crate::scanner::RootSelection;
    use std::fs;
    use tempfile::tempdir;

    fn snapshot_with_file_at(segments: &[&str]) -> (tempfile::TempDir, TreeSnapshot) {
        let tmp = tempdir().unwrap();
        let mut dir = tmp.path().to_path_buf();
        for segment in segments {
            dir.push(segment);
        }
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("page.tif"), "img").unwrap();
        let root = RootSelection::new(tmp.path()).unwrap();
        let snapshot = TreeSnapshot::capture(&root, &AppConfig::default()).unwrap();
        (tmp, snapshot)
    }

    #[test]
    fn test_depth_four_accepted() {
        let (_tmp, snapshot) = snapshot_with_file_at(&["a", "b", "c", "d"]);
        let report = validate(&snapshot, MAX_RELATIVE_DEPTH);
        assert!(report.is_ok());
        assert_eq!(report.max_found, 4);
        assert!(validate_tree(&snapshot, MAX_RELATIVE_DEPTH).is_ok());
    }

    #[test]
    fn test_depth_five_rejected() {
        let (_tmp, snapshot) = snapshot_with_file_at(&["a", "b", "c", "d", "e"]);
        let report = validate(&snapshot, MAX_RELATIVE_DEPTH);
        assert!(!report.is_ok());
        assert_eq!(report.max_found, 5);
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].ends_with("page.tif"));

        match validate_tree(&snapshot, MAX_RELATIVE_DEPTH) {
            Err(Error::DepthExceeded { found, limit, .. }) => {
                assert_eq!(found, 5);
                assert_eq!(limit, 4);
            }
            other => panic!("expected depth error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_deep_empty_folders_do_not_count() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("a/b/c/d/e/f")).unwrap();
        let root = RootSelection::new(tmp.path()).unwrap();
        let snapshot = TreeSnapshot::capture(&root, &AppConfig::default()).unwrap();
        assert!(validate(&snapshot, MAX_RELATIVE_DEPTH).is_ok());
    }
}

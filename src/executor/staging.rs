use super::backend::FsBackend;
use crate::config::STAGING_PREFIX;
use std::io;
use std::path::{Path, PathBuf};

const MAX_NAME_ATTEMPTS: usize = 100;

/// Default staging directory name for this process.
pub fn staging_name() -> String {
    format!("{}{}", STAGING_PREFIX, std::process::id())
}

/// A scratch directory inside the folder being worked on. Entries pass
/// through it so no rename ever lands directly on a sibling's name.
#[derive(Debug)]
pub struct StagingArea {
    path: PathBuf,
}

impl StagingArea {
    /// Create `<parent>/<name>`, or `<name>_<n>` if that is already taken.
    pub fn create<B: FsBackend + ?Sized>(backend: &B, parent: &Path, name: &str) -> io::Result<Self> {
        let mut candidate = parent.join(name);
        let mut attempt = 1;
        loop {
            match backend.create_dir(&candidate) {
                Ok(()) => return Ok(Self { path: candidate }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    candidate = parent.join(format!("{}_{}", name, attempt));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn slot(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Fails if anything is still inside.
    pub fn remove<B: FsBackend + ?Sized>(&self, backend: &B) -> io::Result<()> {
        backend.remove_dir(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::backend::StdFs;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_staging_name_collision_gets_suffix() {
        let tmp = tempdir().unwrap();
        let name = staging_name();
        fs::create_dir(tmp.path().join(&name)).unwrap();

        let staging = StagingArea::create(&StdFs, tmp.path(), &name).unwrap();
        assert_eq!(staging.path(), tmp.path().join(format!("{}_1", name)));
        assert!(staging.path().is_dir());

        staging.remove(&StdFs).unwrap();
        assert!(!staging.path().exists());
    }

    #[test]
    fn test_non_empty_staging_is_not_removed() {
        let tmp = tempdir().unwrap();
        let staging = StagingArea::create(&StdFs, tmp.path(), &staging_name()).unwrap();
        fs::write(staging.slot("left.tif"), "img").unwrap();
        assert!(staging.remove(&StdFs).is_err());
        assert!(staging.path().is_dir());
    }
}

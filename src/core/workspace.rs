//! Working directory lifecycle.
//!
//! Every directory the orchestrator creates is held by a [`ScopedDir`]; when
//! cleaning is requested it is removed when the guard is dropped, so early
//! returns and `?` never leave it behind.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

#[derive(Debug)]
pub struct ScopedDir {
    path: PathBuf,
    clean: bool,
}

impl ScopedDir {
    /// Create `path` (and parents). With `clean` unset the directory outlives the guard.
    pub fn create(path: impl Into<PathBuf>, clean: bool) -> io::Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(ScopedDir { path, clean })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, child: impl AsRef<Path>) -> PathBuf {
        self.path.join(child)
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if !self.clean {
            return;
        }
        if let Err(e) = remove_tree(&self.path) {
            warn!("Failed to remove {:?}: {}", self.path, e);
        }
    }
}

fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("Removed {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_stage(dir: &ScopedDir) -> io::Result<()> {
        fs::write(dir.join("partial.tif"), b"x")?;
        Err(io::Error::other("engine crashed"))
    }

    #[test]
    fn removed_on_error_paths() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("unit/input");
        let result = {
            let dir = ScopedDir::create(&path, true).unwrap();
            failing_stage(&dir)
        };
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn kept_without_clean() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("s1process");
        {
            let dir = ScopedDir::create(&path, false).unwrap();
            fs::write(dir.join("out.tif"), b"x").unwrap();
        }
        assert!(path.join("out.tif").exists());
    }

    #[test]
    fn already_removed_is_fine() {
        let root = tempfile::tempdir().unwrap();
        let dir = ScopedDir::create(root.path().join("gone"), true).unwrap();
        fs::remove_dir_all(dir.path()).unwrap();
        drop(dir);
        assert!(!root.path().join("gone").exists());
    }
}

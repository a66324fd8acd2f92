//! Scoped scratch directories handed out to queue elements.
//!
//! Every download and intermediate file produced while an element is being
//! fetched or processed lives under its own numbered directory beneath a
//! single root. The root is wiped once at process start so a crashed prior
//! run never leaks partial files into a fresh one.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A single claimed scratch directory.
///
/// `open` until [`Resource::close`] is called. Closing is explicit, not
/// `Drop`-based: the element lifecycle closes a resource exactly once, and
/// an implicit close-on-drop would silently swallow a double-close bug
/// instead of surfacing it as a panic.
#[derive(Debug)]
pub struct Resource {
    id: u64,
    path: PathBuf,
    open: bool,
}

impl Resource {
    fn new(id: u64, path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(Self { id, path, open: true })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Delete the resource's directory tree. Calling this twice is a bug.
    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::Worker(format!(
                "resource {} closed twice",
                self.id
            )));
        }
        self.open = false;
        if self.path.exists() {
            std::fs::remove_dir_all(&self.path)?;
        }
        Ok(())
    }
}

/// Owns the resource root and hands out uniquely-numbered [`Resource`]s.
pub struct ResourceHandler {
    root: PathBuf,
    next_id: std::sync::atomic::AtomicU64,
}

impl ResourceHandler {
    /// Wipe and recreate `root`, then start handing out resources from it.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.exists() {
            std::fs::remove_dir_all(&root)?;
        }
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            next_id: std::sync::atomic::AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Claim a new, uniquely-numbered resource directory.
    pub fn claim(&self) -> Result<Resource> {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Resource::new(id, self.root.join(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_creates_unique_numbered_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ResourceHandler::new(dir.path().join("resources")).unwrap();

        let r0 = handler.claim().unwrap();
        let r1 = handler.claim().unwrap();

        assert_eq!(r0.id(), 0);
        assert_eq!(r1.id(), 1);
        assert_ne!(r0.path(), r1.path());
        assert!(r0.path().exists());
        assert!(r1.path().exists());
    }

    #[test]
    fn test_close_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ResourceHandler::new(dir.path().join("resources")).unwrap();
        let mut resource = handler.claim().unwrap();
        let path = resource.path().to_path_buf();

        assert!(path.exists());
        resource.close().unwrap();
        assert!(!path.exists());
        assert!(!resource.is_open());
    }

    #[test]
    fn test_double_close_errors() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ResourceHandler::new(dir.path().join("resources")).unwrap();
        let mut resource = handler.claim().unwrap();

        resource.close().unwrap();
        assert!(resource.close().is_err());
    }

    #[test]
    fn test_new_wipes_existing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("resources");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("stale.txt"), b"leftover").unwrap();

        let handler = ResourceHandler::new(&root).unwrap();
        assert!(!root.join("stale.txt").exists());
        assert_eq!(handler.root(), root);
    }
}

//! Per-repository working directories.
//!
//! Every migration gets `root/<destination name>` to itself. The root keeps a
//! set of claimed paths; a [`Workspace`] lease releases its claim on drop.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::errors::WorkspaceError;

type Claims = Arc<Mutex<HashSet<PathBuf>>>;

fn lock(claims: &Claims) -> MutexGuard<'_, HashSet<PathBuf>> {
    // A panic while holding the lock cannot leave the set inconsistent.
    claims.lock().unwrap_or_else(|e| e.into_inner())
}

fn io_error(path: &Path, source: std::io::Error) -> WorkspaceError {
    WorkspaceError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Root directory under which working directories are handed out.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
    claims: Claims,
}

impl WorkspaceRoot {
    /// Relative roots are resolved against the current directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| io_error(root, e))?
                .join(root)
        };
        debug!(root = %root.display(), "workspace root");
        Ok(Self {
            root,
            claims: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Take exclusive ownership of `root/<name>`.
    pub fn claim(&self, name: &str) -> Result<Workspace, WorkspaceError> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(WorkspaceError::InvalidName(name.to_string()));
        }
        let path = self.root.join(name);
        if !lock(&self.claims).insert(path.clone()) {
            return Err(WorkspaceError::InUse(path.display().to_string()));
        }
        debug!(path = %path.display(), "claimed working directory");
        Ok(Workspace {
            path,
            claims: Arc::clone(&self.claims),
        })
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        lock(&self.claims).contains(&self.root.join(name))
    }
}

/// An exclusively owned working directory. Dropping the lease releases the
/// claim but leaves the directory on disk.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    claims: Claims,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete leftovers from an earlier attempt and make sure the parent
    /// exists. The directory itself is left absent for `git clone`.
    pub async fn reset(&self) -> Result<(), WorkspaceError> {
        if tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?
        {
            info!(path = %self.path.display(), "removing leftover working directory");
            tokio::fs::remove_dir_all(&self.path)
                .await
                .map_err(|e| io_error(&self.path, e))?;
        }
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        Ok(())
    }

    /// Delete the directory after a successful migration.
    pub async fn remove(&self) -> Result<(), WorkspaceError> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed working directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&self.path, e)),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        lock(&self.claims).remove(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_root_made_absolute() {
        let root = WorkspaceRoot::new("tmp_data").unwrap();
        assert!(root.root().is_absolute());
        assert!(root.root().ends_with("tmp_data"));
    }

    #[test]
    fn test_double_claim_rejected_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(dir.path()).unwrap();

        let lease = root.claim("bb_tool").unwrap();
        assert!(root.is_claimed("bb_tool"));
        assert!(matches!(
            root.claim("bb_tool"),
            Err(WorkspaceError::InUse(_))
        ));
        // Other names are independent.
        let _other = root.claim("bb_other").unwrap();

        drop(lease);
        assert!(!root.is_claimed("bb_tool"));
        root.claim("bb_tool").unwrap();
    }

    #[test]
    fn test_escaping_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(dir.path()).unwrap();
        for name in ["", ".", "..", "a/b", "..\\x"] {
            assert!(matches!(
                root.claim(name),
                Err(WorkspaceError::InvalidName(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_reset_clears_leftovers_and_remove_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(dir.path().join("nested")).unwrap();
        let lease = root.claim("bb_tool").unwrap();

        std::fs::create_dir_all(lease.path().join("objects")).unwrap();
        std::fs::write(lease.path().join("HEAD"), "stale").unwrap();

        lease.reset().await.unwrap();
        assert!(!lease.path().exists());
        assert!(root.root().is_dir());

        std::fs::create_dir_all(lease.path()).unwrap();
        lease.remove().await.unwrap();
        assert!(!lease.path().exists());
        // Removing again is fine.
        lease.remove().await.unwrap();
    }
}

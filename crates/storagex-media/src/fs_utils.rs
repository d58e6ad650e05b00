//! Per-job scratch directories.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::MediaResult;

/// Scratch directory removed when dropped.
///
/// Call [`ScratchDir::remove`] on the normal path to surface cleanup errors;
/// the drop fallback covers early returns and panics.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    /// Create (or recreate empty) `root/name`.
    pub async fn create(root: &Path, name: &str) -> MediaResult<Self> {
        let path = root.join(name);
        if path.exists() {
            tokio::fs::remove_dir_all(&path).await?;
        }
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory now.
    pub async fn remove(mut self) -> MediaResult<()> {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove scratch dir {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Remove every entry under `root`, left behind by a crashed process.
///
/// Returns how many entries were removed. A missing root is created.
pub async fn sweep_scratch(root: &Path) -> MediaResult<usize> {
    tokio::fs::create_dir_all(root).await?;

    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let result = if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match result {
            Ok(()) => {
                debug!("Swept {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to sweep {}: {}", path.display(), e),
        }
    }

    if removed > 0 {
        info!("Swept {} leftover scratch entries from {}", removed, root.display());
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scratch_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::create(root.path(), "j1").await.unwrap();
            tokio::fs::write(scratch.join("input"), b"x").await.unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_explicit_remove() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path(), "j1").await.unwrap();
        let path = scratch.path().to_path_buf();
        scratch.remove().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sweep_removes_leftovers() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("crashed-job")).unwrap();
        std::fs::write(root.path().join("crashed-job/input"), b"x").unwrap();
        std::fs::write(root.path().join("stray.tmp"), b"x").unwrap();

        assert_eq!(sweep_scratch(root.path()).await.unwrap(), 2);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}

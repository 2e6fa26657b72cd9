//! Per-attempt scratch directories.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use zyeute_models::JobId;

/// Scratch directory owned by one job attempt.
///
/// Removed by [`JobWorkspace::cleanup`] or, failing that, on drop.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
}

impl JobWorkspace {
    pub async fn create(root: &Path, job_id: &JobId, attempt: u32) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let prefix = format!("job-{}-{}-", job_id, attempt);
        let root = root.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(&root)
        })
        .await
        .map_err(io::Error::other)??;

        debug!(path = %dir.path().display(), "Created job workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory and everything in it.
    pub async fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        let result = tokio::task::spawn_blocking(move || self.dir.close()).await;
        match result {
            Ok(Ok(())) => debug!(path = %path.display(), "Removed job workspace"),
            Ok(Err(e)) => warn!(path = %path.display(), "Failed to remove job workspace: {}", e),
            Err(e) => warn!(path = %path.display(), "Workspace cleanup task failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_removes_contents() {
        let root = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(root.path(), &JobId::from("j1"), 1)
            .await
            .unwrap();
        tokio::fs::write(ws.join("source"), b"bytes").await.unwrap();
        tokio::fs::create_dir(ws.join("renditions")).await.unwrap();
        tokio::fs::write(ws.join("renditions/high.mp4"), b"video").await.unwrap();

        ws.cleanup().await;
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        {
            let ws = JobWorkspace::create(root.path(), &JobId::from("j2"), 3)
                .await
                .unwrap();
            assert!(ws.path().starts_with(root.path()));
            assert!(ws
                .path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("job-j2-3-"));
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;
use tracing::{info, warn};

const STAGING_DIR: &str = ".staging";
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const STAGING_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Staging-then-commit file store. Bytes land in a staging area first; the
/// final rename happens only after the matching database rows are committed.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn stage(&self, name: &str, body: Bytes) -> anyhow::Result<()>;
    async fn commit(&self, name: &str) -> anyhow::Result<()>;
    async fn discard(&self, name: &str) -> anyhow::Result<()>;
    async fn sweep_staging(&self, older_than: Duration) -> anyhow::Result<usize>;
}

#[derive(Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(self.root.join(STAGING_DIR))
            .await
            .with_context(|| format!("create uploads dir {}", self.root.display()))?;
        Ok(())
    }

    fn staging_path(&self, name: &str) -> PathBuf {
        self.root.join(STAGING_DIR).join(name)
    }

    fn final_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl FileStore for LocalStore {
    async fn stage(&self, name: &str, body: Bytes) -> anyhow::Result<()> {
        let path = self.staging_path(name);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("stage file {}", path.display()))?;
        Ok(())
    }

    async fn commit(&self, name: &str) -> anyhow::Result<()> {
        // Same filesystem, so the rename is atomic.
        let from = self.staging_path(name);
        let to = self.final_path(name);
        tokio::fs::rename(&from, &to)
            .await
            .with_context(|| format!("commit file {}", to.display()))?;
        Ok(())
    }

    async fn discard(&self, name: &str) -> anyhow::Result<()> {
        let path = self.staging_path(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("discard file {}", path.display())),
        }
    }

    async fn sweep_staging(&self, older_than: Duration) -> anyhow::Result<usize> {
        let staging = self.root.join(STAGING_DIR);
        let mut entries = tokio::fs::read_dir(&staging)
            .await
            .with_context(|| format!("read staging dir {}", staging.display()))?;

        let now = std::time::SystemTime::now();
        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let stale = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| now.duration_since(t).ok())
                .map(|age| age >= older_than)
                .unwrap_or(false);
            if stale {
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    warn!(path = %entry.path().display(), error = %e, "failed to sweep staged file");
                } else {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

pub fn spawn_staging_sweep(files: Arc<dyn FileStore>) {
    tokio::spawn(async move {
        loop {
            match files.sweep_staging(STAGING_MAX_AGE).await {
                Ok(0) => {}
                Ok(n) => info!(removed = n, "swept orphaned staging files"),
                Err(e) => warn!(error = %e, "staging sweep failed"),
            }
            tokio::time::sleep(SWEEP_INTERVAL).await;
        }
    });
}

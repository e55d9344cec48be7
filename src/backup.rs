//! Daily snapshot of the persisted series.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use tokio::fs;

use crate::clock::{Clock, SystemClock};

/// Where the data to back up lives and which collections to include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTarget {
    pub source_dir: PathBuf,
    pub collections: Vec<String>,
}

impl BackupTarget {
    pub fn new(source_dir: PathBuf, collections: Vec<String>) -> Self {
        Self {
            source_dir,
            collections,
        }
    }
}

/// Performs a storage snapshot. Invoked from the scheduler on its own task;
/// ingestion never waits for it.
#[async_trait::async_trait]
pub trait BackupTrigger: Send + Sync {
    async fn backup(&self, target: &BackupTarget) -> Result<()>;
}

/// Copies each collection directory into `<dest>/<YYYY-MM-DD>/<collection>/`,
/// dated in local time.
pub struct SnapshotBackup {
    dest_dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl SnapshotBackup {
    pub fn new(dest_dir: impl AsRef<Path>) -> Self {
        Self {
            dest_dir: dest_dir.as_ref().to_path_buf(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        let date = self.clock.now().with_timezone(&Local).date_naive();
        self.dest_dir.join(date.format("%Y-%m-%d").to_string())
    }

    async fn copy_collection(&self, from: &Path, to: &Path) -> Result<usize> {
        let mut entries = match fs::read_dir(from).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", from.display()))
            }
        };

        fs::create_dir_all(to)
            .await
            .with_context(|| format!("Failed to create {}", to.display()))?;

        let mut copied = 0;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let dest = to.join(entry.file_name());
            fs::copy(entry.path(), &dest)
                .await
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
            copied += 1;
        }
        Ok(copied)
    }
}

#[async_trait::async_trait]
impl BackupTrigger for SnapshotBackup {
    async fn backup(&self, target: &BackupTarget) -> Result<()> {
        let snapshot = self.snapshot_dir();
        for collection in &target.collections {
            let copied = self
                .copy_collection(
                    &target.source_dir.join(collection),
                    &snapshot.join(collection),
                )
                .await?;
            tracing::info!(
                collection = %collection,
                files = copied,
                dest = %snapshot.display(),
                "Backed up collection"
            );
        }
        Ok(())
    }
}

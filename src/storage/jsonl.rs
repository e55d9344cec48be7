//! JSONL-backed series store.
//!
//! Directory structure:
//! ```text
//! data/
//!   series/
//!     BTC.jsonl
//!     ETH.jsonl
//! ```
//!
//! Each file is one series; each line is one [`Sample`]. A series exists once
//! its file exists, so the first append creates it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{Context, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::backup::BackupTarget;
use crate::models::{CurrencyCode, Sample, Series};

use super::{check_order, SeriesStore};

/// Name of the directory (collection) holding the series files.
pub const COLLECTION: &str = "series";

#[derive(Debug, Default)]
struct KeyState {
    loaded: bool,
    last_time: Option<i64>,
    /// The file ends in a torn line left by an interrupted write.
    needs_newline: bool,
}

pub struct JsonlSeriesStore {
    base_path: PathBuf,
    keys: StdMutex<HashMap<CurrencyCode, Arc<Mutex<KeyState>>>>,
}

impl JsonlSeriesStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            keys: StdMutex::new(HashMap::new()),
        }
    }

    /// Create the store and verify the series directory is writable.
    pub async fn open(base_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self::new(base_path);
        let dir = store.series_dir();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create series directory {}", dir.display()))?;

        let probe = dir.join(".write-probe");
        fs::write(&probe, b"")
            .await
            .with_context(|| format!("Series directory {} is not writable", dir.display()))?;
        fs::remove_file(&probe)
            .await
            .with_context(|| format!("Failed to remove {}", probe.display()))?;

        Ok(store)
    }

    pub fn series_dir(&self) -> PathBuf {
        self.base_path.join(COLLECTION)
    }

    fn series_file(&self, currency: &CurrencyCode) -> PathBuf {
        self.series_dir().join(format!("{currency}.jsonl"))
    }

    /// What a backup of this store needs to copy.
    pub fn backup_target(&self) -> BackupTarget {
        BackupTarget::new(self.base_path.clone(), vec![COLLECTION.to_string()])
    }

    fn key_state(&self, currency: &CurrencyCode) -> Arc<Mutex<KeyState>> {
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        keys.entry(currency.clone()).or_default().clone()
    }

    async fn read_raw(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn parse_samples(path: &Path, content: &str) -> Vec<Sample> {
        let mut samples = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Sample>(line) {
                Ok(sample) => samples.push(sample),
                Err(err) => tracing::warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %err,
                    "Skipping unreadable series line"
                ),
            }
        }
        samples
    }

    async fn load_state(&self, path: &Path, state: &mut KeyState) -> Result<()> {
        if let Some(content) = self.read_raw(path).await? {
            state.last_time = Self::parse_samples(path, &content)
                .last()
                .map(|s| s.time);
            state.needs_newline = !content.is_empty() && !content.ends_with('\n');
        }
        state.loaded = true;
        Ok(())
    }

    /// Append `line` as a single write; on failure the file is cut back to
    /// its previous length so no partial record survives.
    async fn append_line(&self, path: &Path, line: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create directory")?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open {} for append", path.display()))?;
        let original_len = file.metadata().await?.len();

        let written = async {
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;

        if let Err(err) = written {
            if let Err(truncate_err) = file.set_len(original_len).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %truncate_err,
                    "Failed to roll back partial series write"
                );
            }
            return Err(err).with_context(|| format!("Failed to append to {}", path.display()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SeriesStore for JsonlSeriesStore {
    async fn append(&self, currency: &CurrencyCode, sample: &Sample) -> Result<()> {
        let path = self.series_file(currency);
        let key = self.key_state(currency);
        let mut state = key.lock().await;

        if !state.loaded {
            self.load_state(&path, &mut state).await?;
        }
        check_order(currency, state.last_time, sample)?;

        let mut line = String::new();
        if state.needs_newline {
            line.push('\n');
        }
        line.push_str(&serde_json::to_string(sample).context("Failed to serialize sample")?);
        line.push('\n');

        self.append_line(&path, &line).await?;
        state.last_time = Some(sample.time);
        state.needs_newline = false;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<CurrencyCode>> {
        let dir = self.series_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to read series directory"),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match CurrencyCode::new(stem) {
                Ok(code) if code.as_str() == stem => ids.push(code),
                _ => tracing::warn!(path = %path.display(), "Skipping file with invalid series id"),
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn get_one(&self, currency: &CurrencyCode) -> Result<Option<Series>> {
        let path = self.series_file(currency);
        // Held so a concurrent append is never observed half written.
        let key = self.key_state(currency);
        let _state = key.lock().await;
        let Some(content) = self.read_raw(&path).await? else {
            return Ok(None);
        };
        Ok(Some(Series {
            id: currency.clone(),
            values: Self::parse_samples(&path, &content),
        }))
    }
}

//! Memory store abstraction and the file-backed implementation.
//!
//! Each record lives in its own `<id>.json` file inside a flat directory and
//! is written through a `.tmp` sibling renamed into place, so readers never
//! observe a partially written record.
//! Enumeration is best effort: entries that cannot be read or parsed are
//! skipped so one corrupt file never hides the rest of the store.

use crate::error::MemoryError;
use crate::model::{MemoryRecord, MemoryStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// File extension for persisted records.
const RECORD_EXTENSION: &str = "json";

#[async_trait]
/// Durable storage for memory records.
pub trait MemoryStore: Send + Sync {
    /// Ensure the backing location exists. Idempotent.
    async fn initialize(&self) -> Result<(), MemoryError>;

    /// Persist a record, assigning an id when it has none.
    async fn store_memory(&self, record: MemoryRecord) -> Result<MemoryRecord, MemoryError>;

    /// Enumerate every readable record.
    async fn load_all(&self) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Delete records older than the retention period, returning the count.
    async fn cleanup_expired(&self) -> Result<usize, MemoryError>;

    /// Aggregate statistics computed from the current contents.
    async fn stats(&self) -> Result<MemoryStats, MemoryError>;
}

/// File-backed store writing one JSON document per record.
#[derive(Debug, Clone)]
pub struct FileMemoryStore {
    /// Directory holding record files.
    root: PathBuf,
    /// Maximum record age before the sweep deletes it.
    retention: Duration,
}

impl FileMemoryStore {
    /// Create a store rooted at `root`. Call `initialize` before writing.
    pub fn new(root: impl AsRef<Path>, retention: Duration) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            retention,
        }
    }

    /// Directory holding the record files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configured retention period.
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Path of the file holding the record with `id`.
    fn record_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    /// Staging file a record is written to before being renamed into place.
    fn temp_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.{RECORD_EXTENSION}.tmp"))
    }

    /// Paths of every file following the record naming convention.
    fn record_files(&self) -> Result<Vec<PathBuf>, MemoryError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(MemoryError::Io(err)),
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION)
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Load every record, skipping entries that fail to parse.
    fn load_records(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        let files = self.record_files()?;
        Ok(parse_entries(files.into_iter().map(|path| {
            let contents = fs::read_to_string(&path);
            (path, contents)
        }))
        .collect())
    }

    /// Delete records with a timestamp strictly before `now - retention`.
    pub fn cleanup_expired_before(&self, now: DateTime<Utc>) -> Result<usize, MemoryError> {
        let retention = chrono::Duration::from_std(self.retention)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(retention).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut expired = 0;
        for record in self.load_records()? {
            if record.timestamp >= cutoff {
                continue;
            }
            let path = self.record_path(record.id);
            match fs::remove_file(&path) {
                Ok(()) => expired += 1,
                Err(err) => warn!(
                    "failed to delete expired memory (path={}, err={})",
                    path.display(),
                    err
                ),
            }
        }
        if expired > 0 {
            info!(
                "expired memories removed (count={}, cutoff={})",
                expired,
                cutoff.to_rfc3339()
            );
        }
        Ok(expired)
    }

    /// Sum of the sizes of all record files.
    fn storage_size(&self) -> Result<u64, MemoryError> {
        Ok(self
            .record_files()?
            .iter()
            .filter_map(|path| fs::metadata(path).ok())
            .map(|meta| meta.len())
            .sum())
    }
}

#[async_trait]
impl MemoryStore for FileMemoryStore {
    async fn initialize(&self) -> Result<(), MemoryError> {
        fs::create_dir_all(&self.root).map_err(|source| MemoryError::Storage {
            path: self.root.clone(),
            source,
        })?;
        info!(
            "initialized file memory store (root={}, retention_secs={})",
            self.root.display(),
            self.retention.as_secs()
        );
        Ok(())
    }

    async fn store_memory(&self, mut record: MemoryRecord) -> Result<MemoryRecord, MemoryError> {
        if record.id.is_nil() {
            record.id = Uuid::new_v4();
        }
        let path = self.record_path(record.id);
        let temp_path = self.temp_path(record.id);
        let data = serde_json::to_vec_pretty(&record)?;
        fs::write(&temp_path, data).map_err(|source| MemoryError::Storage {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            MemoryError::Storage {
                path: path.clone(),
                source,
            }
        })?;
        debug!(
            "stored memory record (id={}, sender={}, content_len={})",
            record.id,
            record.sender,
            record.content.len()
        );
        Ok(record)
    }

    async fn load_all(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        self.load_records()
    }

    async fn cleanup_expired(&self) -> Result<usize, MemoryError> {
        self.cleanup_expired_before(Utc::now())
    }

    async fn stats(&self) -> Result<MemoryStats, MemoryError> {
        let records = self.load_records()?;
        if records.is_empty() {
            return Ok(MemoryStats {
                retention_period: self.retention,
                ..MemoryStats::default()
            });
        }
        let oldest = records.iter().map(|record| record.timestamp).min();
        let newest = records.iter().map(|record| record.timestamp).max();
        Ok(MemoryStats {
            total_memories: records.len(),
            oldest_memory: oldest,
            newest_memory: newest,
            storage_size_bytes: self.storage_size()?,
            retention_period: self.retention,
        })
    }
}

/// Parse raw entries lazily, dropping any that cannot be read or decoded.
pub fn parse_entries<I>(entries: I) -> impl Iterator<Item = MemoryRecord>
where
    I: IntoIterator<Item = (PathBuf, std::io::Result<String>)>,
{
    entries
        .into_iter()
        .filter_map(|(path, contents)| match contents {
            Ok(contents) => match serde_json::from_str::<MemoryRecord>(&contents) {
                Ok(record) => Some(record),
                Err(err) => {
                    debug!(
                        "skipping unparseable memory (path={}, err={})",
                        path.display(),
                        err
                    );
                    None
                }
            },
            Err(err) => {
                debug!(
                    "skipping unreadable memory (path={}, err={})",
                    path.display(),
                    err
                );
                None
            }
        })
}

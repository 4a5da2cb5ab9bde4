//! The relay node's durable store.
//!
//! Records are kept as one pretty-printed JSON array in a single file. Every
//! mutation holds the log's write lock for its whole read-modify-write and
//! lands through a temp file plus rename, so readers never see a torn file and
//! an `/upload` append can never be clobbered by a concurrent `/forward` clear.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use rollcall_shared::{AttendanceEntry, StoreRecord};

use crate::error::{Result, StoreError};

#[derive(Debug)]
pub struct RecordLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RecordLog {
    /// Open the store at `path`, creating an empty array if the file does
    /// not exist yet. Fails if the existing file is not a record array.
    pub async fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let log = Self {
            path,
            write_lock: Mutex::new(()),
        };

        if fs::try_exists(&log.path).await? {
            let _guard = log.write_lock.lock().await;
            let missing = log.count_missing_ids().await?;
            let records = log.read_records().await?;
            if missing > 0 {
                // ids are filled in on read; persist them so later reads agree
                log.write_records(&records).await?;
                info!(missing, "Assigned ids to stored records");
            }
            info!(path = %log.path.display(), records = records.len(), "Record store opened");
        } else {
            log.write_records(&[]).await?;
            info!(path = %log.path.display(), "Record store created");
        }

        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append `entry`, stamped with the current time.
    pub async fn append(&self, entry: AttendanceEntry) -> Result<StoreRecord> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_records().await?;
        let record = StoreRecord::new(entry, Utc::now());
        records.push(record.clone());
        self.write_records(&records).await?;

        debug!(id = %record.id, stored = records.len(), "Record appended");
        Ok(record)
    }

    /// Current contents in append order.
    pub async fn snapshot(&self) -> Result<Vec<StoreRecord>> {
        let _guard = self.write_lock.lock().await;
        self.read_records().await
    }

    /// The store file's bytes as they are on disk.
    pub async fn raw(&self) -> Result<Vec<u8>> {
        let _guard = self.write_lock.lock().await;
        Ok(fs::read(&self.path).await?)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.snapshot().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove the records whose ids are in `ids`. Records appended after the
    /// caller took its snapshot are untouched. The file is not rewritten when
    /// nothing matches. Returns how many records were removed.
    pub async fn remove(&self, ids: &HashSet<Uuid>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let records = self.read_records().await?;
        let before = records.len();
        let kept: Vec<StoreRecord> = records
            .into_iter()
            .filter(|r| !ids.contains(&r.id))
            .collect();

        if kept.len() != before {
            self.write_records(&kept).await?;
            debug!(removed = before - kept.len(), remaining = kept.len(), "Records cleared");
        }
        Ok(before - kept.len())
    }

    /// Number of stored objects without an `id` field.
    async fn count_missing_ids(&self) -> Result<usize> {
        let raw = fs::read_to_string(&self.path).await?;
        if raw.trim().is_empty() {
            return Ok(0);
        }
        let values: Vec<serde_json::Value> = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(values.iter().filter(|v| v.get("id").is_none()).count())
    }

    async fn read_records(&self) -> Result<Vec<StoreRecord>> {
        let raw = fs::read_to_string(&self.path).await?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    async fn write_records(&self, records: &[StoreRecord]) -> Result<()> {
        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

//! The client's local retry queue.
//!
//! Undelivered entries live as a single JSON array under
//! [`PENDING_KEY`](rollcall_shared::constants::PENDING_KEY). The queue grows by
//! appending and shrinks only when a sync pass rewrites it. Both mutations run
//! inside an immediate SQLite transaction, so a second process sharing the
//! file cannot interleave its own read-modify-write.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, warn};

use rollcall_shared::constants::PENDING_KEY;
use rollcall_shared::AttendanceEntry;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::local_storage::{get_item, set_item};

pub struct PendingQueue {
    db: Mutex<Database>,
}

impl PendingQueue {
    /// Wrap an open database. A queue value that no longer parses is moved
    /// aside under a timestamped key and replaced by an empty queue.
    pub fn new(db: Database) -> Result<Self> {
        quarantine_if_corrupt(db.conn())?;
        Ok(Self { db: Mutex::new(db) })
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Self::new(Database::open_at(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Database::open_in_memory()?)
    }

    /// Every queued entry in stored order.
    pub fn load(&self) -> Result<Vec<AttendanceEntry>> {
        let db = self.lock()?;
        read_queue(db.conn())
    }

    /// The stored text exactly as persisted, `None` if nothing was ever queued.
    pub fn raw(&self) -> Result<Option<String>> {
        let db = self.lock()?;
        get_item(db.conn(), PENDING_KEY)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Append `entry` and rewrite the stored array. Returns the new length.
    pub fn enqueue(&self, entry: &AttendanceEntry) -> Result<usize> {
        let mut db = self.lock()?;
        let tx = db
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut queue = read_queue(&tx)?;
        queue.push(entry.clone());
        write_queue(&tx, &queue)?;
        tx.commit()?;

        debug!(name = entry.name(), queued = queue.len(), "Saved pending entry");
        Ok(queue.len())
    }

    /// Drop the entries confirmed delivered by a sync pass and rewrite the
    /// array with what is left, in stored order. Each delivered entry removes
    /// one matching occurrence, so duplicates queued after the pass began are
    /// kept. Returns the remaining entries.
    pub fn remove_delivered(&self, delivered: &[AttendanceEntry]) -> Result<Vec<AttendanceEntry>> {
        let mut db = self.lock()?;
        let tx = db
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut remaining = read_queue(&tx)?;
        for done in delivered {
            if let Some(pos) = remaining.iter().position(|e| e == done) {
                remaining.remove(pos);
            }
        }
        write_queue(&tx, &remaining)?;
        tx.commit()?;

        Ok(remaining)
    }

    /// Overwrite the stored array with exactly `entries`.
    pub fn replace(&self, entries: &[AttendanceEntry]) -> Result<()> {
        let mut db = self.lock()?;
        let tx = db
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        write_queue(&tx, entries)?;
        tx.commit()?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn read_queue(conn: &Connection) -> Result<Vec<AttendanceEntry>> {
    match get_item(conn, PENDING_KEY)? {
        Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
        _ => Ok(Vec::new()),
    }
}

fn write_queue(conn: &Connection, entries: &[AttendanceEntry]) -> Result<()> {
    let raw = serde_json::to_string(entries)?;
    set_item(conn, PENDING_KEY, &raw)
}

fn quarantine_if_corrupt(conn: &Connection) -> Result<()> {
    let Some(raw) = get_item(conn, PENDING_KEY)? else {
        return Ok(());
    };
    if raw.trim().is_empty() || serde_json::from_str::<Vec<AttendanceEntry>>(&raw).is_ok() {
        return Ok(());
    }

    let aside = format!("{PENDING_KEY}.corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S"));
    warn!(key = %aside, "Pending queue is unreadable, moving it aside");
    set_item(conn, &aside, &raw)?;
    set_item(conn, PENDING_KEY, "[]")
}

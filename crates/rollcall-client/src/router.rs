//! Two-tier delivery with a local fallback.
//!
//! An entry is tried against the relay named in its code, then written
//! straight to the central datastore when the device is online, and finally
//! kept in the [`PendingQueue`]. It is never dropped: if even the local write
//! fails, the error is returned to the caller.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use rollcall_net::{CentralDatastore, Channel, Connectivity, RelayTransport};
use rollcall_shared::constants::ATTENDANCE_COLLECTION;
use rollcall_shared::AttendanceEntry;
use rollcall_store::{PendingQueue, StoreError};

/// Where a fresh submission ended up. The caller turns this into the
/// user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the relay device.
    Relay,
    /// Written directly to the central datastore.
    Datastore,
    /// Kept in the local queue for a later retry.
    SavedLocally,
}

impl DeliveryOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            DeliveryOutcome::Relay => "Attendance sent to representative successfully.",
            DeliveryOutcome::Datastore => "Attendance uploaded to server.",
            DeliveryOutcome::SavedLocally => "Attendance saved locally and will be retried automatically.",
        }
    }
}

/// Result of one pass over the pending queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub delivered: usize,
    pub remaining: usize,
}

pub struct DeliveryRouter {
    relay: Arc<dyn RelayTransport>,
    datastore: Option<Arc<dyn CentralDatastore>>,
    connectivity: Arc<dyn Connectivity>,
    queue: Arc<PendingQueue>,
    // one sync pass at a time
    sync_gate: Mutex<()>,
}

impl DeliveryRouter {
    pub fn new(
        relay: Arc<dyn RelayTransport>,
        datastore: Option<Arc<dyn CentralDatastore>>,
        connectivity: Arc<dyn Connectivity>,
        queue: Arc<PendingQueue>,
    ) -> Self {
        Self {
            relay,
            datastore,
            connectivity,
            queue,
            sync_gate: Mutex::new(()),
        }
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    /// Try the relay, then the datastore. Returns the channel that accepted
    /// the entry, or `None` if both failed or were unavailable.
    pub async fn try_channels(&self, entry: &AttendanceEntry) -> Option<Channel> {
        if let Some(url) = entry.rep_url() {
            match self.relay.post_entry(url, entry).await {
                Ok(()) => return Some(Channel::Relay),
                Err(e) => warn!(url, error = %e, "Failed to send to rep"),
            }
        }

        let Some(ref datastore) = self.datastore else {
            debug!("No datastore configured, skipping direct upload");
            return None;
        };
        if !self.connectivity.is_online() {
            debug!("Device offline, skipping direct upload");
            return None;
        }

        let record = match serde_json::to_value(entry) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Could not encode entry for datastore");
                return None;
            }
        };
        match datastore.push(ATTENDANCE_COLLECTION, &record).await {
            Ok(key) => {
                debug!(key = %key, "Entry written to datastore");
                Some(Channel::Datastore)
            }
            Err(e) => {
                warn!(error = %e, "Datastore direct upload failed");
                None
            }
        }
    }

    /// Deliver a fresh submission, falling back to the pending queue.
    pub async fn deliver(&self, entry: &AttendanceEntry) -> Result<DeliveryOutcome, StoreError> {
        match self.try_channels(entry).await {
            Some(Channel::Relay) => Ok(DeliveryOutcome::Relay),
            Some(Channel::Datastore) => Ok(DeliveryOutcome::Datastore),
            None => {
                let queued = self.queue.enqueue(entry)?;
                info!(name = entry.name(), queued, "Attendance saved locally");
                Ok(DeliveryOutcome::SavedLocally)
            }
        }
    }

    /// Retry every queued entry in stored order. Entries that still fail
    /// both channels stay queued in their relative order; the rest are
    /// removed. Concurrent callers wait for the running pass and then run
    /// their own against the fresh queue.
    pub async fn sync_pending(&self) -> Result<SyncReport, StoreError> {
        let _gate = self.sync_gate.lock().await;

        let pending = self.queue.load()?;
        if pending.is_empty() {
            return Ok(SyncReport::default());
        }

        info!(count = pending.len(), "Attempting to sync pending entries");

        let mut delivered = Vec::new();
        for entry in &pending {
            if self.try_channels(entry).await.is_some() {
                delivered.push(entry.clone());
            }
        }

        let remaining = if delivered.is_empty() {
            self.queue.len()?
        } else {
            self.queue.remove_delivered(&delivered)?.len()
        };

        info!(delivered = delivered.len(), remaining, "Sync complete");
        Ok(SyncReport {
            attempted: pending.len(),
            delivered: delivered.len(),
            remaining,
        })
    }
}

//! One submitting device's context: roster, scanner and router together.
//!
//! Everything a submission touches is owned here and passed explicitly, so
//! two sessions (two users on a shared tablet, or a test) never share hidden
//! state.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use rollcall_net::NetworkMonitor;
use rollcall_shared::{AttendanceEntry, WifiCredentials};
use rollcall_store::StoreError;

use crate::error::SubmitError;
use crate::roster::Roster;
use crate::router::{DeliveryOutcome, DeliveryRouter, SyncReport};
use crate::scanner::{ScanHandle, Scanner};

/// Shown to the submitter when a code advertises the relay's hotspot, before
/// delivery is attempted. Platforms cannot join networks on their own, so the
/// prompt should return once the user has had a chance to connect.
#[async_trait]
pub trait HotspotPrompt: Send + Sync {
    async fn join(&self, wifi: &WifiCredentials);
}

#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub entry: AttendanceEntry,
    pub outcome: DeliveryOutcome,
    pub hotspot: Option<WifiCredentials>,
    /// Set when the submission fell back to the queue and a resync ran.
    pub sync: Option<SyncReport>,
}

pub struct AttendanceSession {
    roster: Roster,
    scanner: Scanner,
    router: Arc<DeliveryRouter>,
    hotspot_prompt: Option<Arc<dyn HotspotPrompt>>,
}

impl AttendanceSession {
    pub fn new(roster: Roster, scanner: Scanner, router: Arc<DeliveryRouter>) -> Self {
        Self {
            roster,
            scanner,
            router,
            hotspot_prompt: None,
        }
    }

    pub fn with_hotspot_prompt(mut self, prompt: Arc<dyn HotspotPrompt>) -> Self {
        self.hotspot_prompt = Some(prompt);
        self
    }

    pub fn router(&self) -> &Arc<DeliveryRouter> {
        &self.router
    }

    /// Stop signal for the scan in progress, if any.
    pub fn scan_handle(&self) -> ScanHandle {
        self.scanner.handle()
    }

    /// Drain whatever earlier runs left in the queue.
    pub async fn on_startup(&self) -> Result<SyncReport, StoreError> {
        self.router.sync_pending().await
    }

    /// Check the name, scan a code, and deliver the resulting entry.
    pub async fn submit(&mut self, name: &str) -> Result<SubmitReceipt, SubmitError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SubmitError::EmptyName);
        }
        if !self.roster.contains(name) {
            return Err(SubmitError::UnknownName);
        }

        let raw_qr = self.scanner.start_scan().await?;
        let (entry, payload) = AttendanceEntry::from_scan(name, &raw_qr, Utc::now());

        if let Some(ref wifi) = payload.wifi {
            info!(ssid = %wifi.ssid, "Code advertises a relay hotspot");
            if let Some(ref prompt) = self.hotspot_prompt {
                prompt.join(wifi).await;
            }
        }

        let outcome = self.router.deliver(&entry).await?;

        let sync = if outcome == DeliveryOutcome::SavedLocally {
            match self.router.sync_pending().await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "Resync after local save failed");
                    None
                }
            }
        } else {
            None
        };

        info!(name, outcome = ?outcome, "Attendance submitted");
        Ok(SubmitReceipt {
            entry,
            outcome,
            hotspot: payload.wifi,
            sync,
        })
    }

    /// Resync the queue every time the device comes back online. The task
    /// ends when the monitor is dropped.
    pub fn spawn_resync(&self, monitor: &NetworkMonitor) -> JoinHandle<()> {
        let router = self.router.clone();
        let mut rx = monitor.subscribe();

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                if !online {
                    continue;
                }
                match router.sync_pending().await {
                    Ok(report) => info!(
                        delivered = report.delivered,
                        remaining = report.remaining,
                        "Resync after reconnect"
                    ),
                    Err(e) => warn!(error = %e, "Resync after reconnect failed"),
                }
            }
        })
    }
}

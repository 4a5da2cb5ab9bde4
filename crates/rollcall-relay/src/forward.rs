//! Forwarding stored records to the central datastore.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use rollcall_net::{CentralDatastore, Channel, NetError};
use rollcall_shared::constants::ATTENDANCE_COLLECTION;
use rollcall_shared::{ForwardReport, ForwardResult, StoreRecord};
use rollcall_store::RecordLog;

use crate::error::ServerError;

pub struct Forwarder {
    datastore: Option<Arc<dyn CentralDatastore>>,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(datastore: Option<Arc<dyn CentralDatastore>>, timeout: Duration) -> Self {
        Self { datastore, timeout }
    }

    pub fn is_configured(&self) -> bool {
        self.datastore.is_some()
    }

    /// Push one record, bounded by the forward timeout. Returns the push key.
    pub async fn forward_record(&self, record: &StoreRecord) -> Result<String, NetError> {
        let datastore = self.datastore.as_ref().ok_or(NetError::NotConfigured)?;
        let payload = record.forward_payload();

        match tokio::time::timeout(self.timeout, datastore.push(ATTENDANCE_COLLECTION, &payload)).await {
            Ok(result) => result,
            Err(_) => Err(NetError::Timeout {
                channel: Channel::Datastore,
            }),
        }
    }

    /// Detached forward of a freshly ingested record. The outcome is only
    /// logged; the record stays in the store either way.
    pub fn spawn_forward(self: &Arc<Self>, record: StoreRecord) {
        if !self.is_configured() {
            debug!(id = %record.id, "No datastore configured, record kept for later forward");
            return;
        }

        let forwarder = Arc::clone(self);
        tokio::spawn(async move {
            match forwarder.forward_record(&record).await {
                Ok(key) => info!(id = %record.id, key = %key, "Record forwarded on ingest"),
                Err(e) => warn!(id = %record.id, error = %e, "Forward on ingest failed"),
            }
        });
    }

    /// Forward every stored record in order. The forwarded records are
    /// cleared only if all of them went through; otherwise the store is left
    /// exactly as it was.
    pub async fn reconcile(&self, records: &RecordLog) -> Result<ForwardReport, ServerError> {
        if !self.is_configured() {
            return Err(ServerError::NotConfigured);
        }

        let snapshot = records.snapshot().await?;
        let mut results = Vec::with_capacity(snapshot.len());

        for record in &snapshot {
            match self.forward_record(record).await {
                Ok(_) => results.push(ForwardResult::success()),
                Err(e) => {
                    warn!(id = %record.id, error = %e, "Forward failed");
                    results.push(ForwardResult::failure(e.to_string()));
                }
            }
        }

        let all_ok = results.iter().all(|r| r.ok);
        let mut cleared = false;
        if all_ok && !snapshot.is_empty() {
            let ids: HashSet<Uuid> = snapshot.iter().map(|r| r.id).collect();
            let removed = records.remove(&ids).await?;
            cleared = removed == ids.len();
            if cleared {
                info!(forwarded = snapshot.len(), "Store cleared after forward");
            } else {
                warn!(removed, expected = ids.len(), "Forwarded records not all found in store");
            }
        } else if !all_ok {
            let failed = results.iter().filter(|r| !r.ok).count();
            warn!(failed, total = results.len(), "Forward incomplete, store kept");
        }

        Ok(ForwardReport {
            ok: true,
            forwarded: results.len(),
            cleared,
            results,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rollcall_shared::AttendanceEntry;
    use serde_json::Value;

    /// Fails the pushes whose 0-based call index is listed in `fail_on`.
    #[derive(Default)]
    pub(crate) struct FakeDatastore {
        pub fail_on: Vec<usize>,
        pub hang: bool,
        /// Signalled on each push; the push then waits for `release`.
        pub entered: Option<Arc<tokio::sync::Notify>>,
        pub release: Option<Arc<tokio::sync::Notify>>,
        pub calls: AtomicUsize,
        pub pushed: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl CentralDatastore for FakeDatastore {
        async fn push(&self, _collection: &str, record: &Value) -> Result<String, NetError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if let (Some(entered), Some(release)) = (&self.entered, &self.release) {
                entered.notify_one();
                release.notified().await;
            }
            if self.fail_on.contains(&n) {
                return Err(NetError::Rejected {
                    channel: Channel::Datastore,
                    status: 503,
                });
            }
            self.pushed.lock().unwrap().push(record.clone());
            Ok(format!("-key{n}"))
        }
    }

    pub(crate) fn entry(name: &str) -> AttendanceEntry {
        AttendanceEntry::new(name, "2024-03-01T09:00:00Z").with_session_id(Some("s-1".into()))
    }

    async fn log_with(dir: &tempfile::TempDir, names: &[&str]) -> RecordLog {
        let log = RecordLog::open(dir.path().join("store.json")).await.unwrap();
        for name in names {
            log.append(entry(name)).await.unwrap();
        }
        log
    }

    fn forwarder(datastore: FakeDatastore) -> (Forwarder, Arc<FakeDatastore>) {
        let datastore = Arc::new(datastore);
        (
            Forwarder::new(Some(datastore.clone()), Duration::from_secs(10)),
            datastore,
        )
    }

    #[tokio::test]
    async fn test_all_ok_clears_store() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_with(&dir, &["Alice", "Bob"]).await;
        let (forwarder, datastore) = forwarder(FakeDatastore::default());

        let report = forwarder.reconcile(&log).await.unwrap();

        assert!(report.ok && report.cleared);
        assert_eq!(report.forwarded, 2);
        assert!(log.is_empty().await.unwrap());

        let pushed = datastore.pushed.lock().unwrap();
        assert_eq!(pushed[0]["name"], "Alice");
        assert_eq!(pushed[1]["name"], "Bob");
        assert!(pushed[0]["receivedAt"].is_string());
        assert!(pushed[0]["relayRecordId"].is_string());
    }

    #[tokio::test]
    async fn test_partial_failure_leaves_store_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_with(&dir, &["Alice", "Bob", "Carol"]).await;
        let before = log.raw().await.unwrap();
        let (forwarder, _) = forwarder(FakeDatastore {
            fail_on: vec![1],
            ..Default::default()
        });

        let report = forwarder.reconcile(&log).await.unwrap();

        assert!(report.ok);
        assert!(!report.cleared);
        assert_eq!(report.forwarded, 3);
        let oks: Vec<bool> = report.results.iter().map(|r| r.ok).collect();
        assert_eq!(oks, vec![true, false, true]);
        assert!(report.results[1].error.is_some());
        assert_eq!(log.raw().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_upload_during_forward_survives_clear() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(log_with(&dir, &["Alice", "Bob"]).await);
        let entered = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let (forwarder, _) = forwarder(FakeDatastore {
            entered: Some(entered.clone()),
            release: Some(release.clone()),
            ..Default::default()
        });

        let pass = {
            let log = log.clone();
            tokio::spawn(async move { forwarder.reconcile(&log).await })
        };

        // first push is in flight; an upload lands now
        entered.notified().await;
        log.append(entry("Late")).await.unwrap();
        release.notify_one();
        entered.notified().await;
        release.notify_one();

        let report = pass.await.unwrap().unwrap();
        assert!(report.cleared);
        assert_eq!(report.forwarded, 2);

        let left = log.snapshot().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].entry.name(), "Late");
    }

    #[tokio::test]
    async fn test_legacy_store_is_emptied_by_forward() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let legacy = r#"[{"receivedAt":"2024-03-01T09:00:00.000Z","entry":{"name":"Alice","time":"2024-03-01T09:00:00Z"}}]"#;
        tokio::fs::write(&path, legacy).await.unwrap();
        let log = RecordLog::open(path).await.unwrap();
        let (forwarder, datastore) = forwarder(FakeDatastore::default());

        let report = forwarder.reconcile(&log).await.unwrap();
        assert!(report.cleared);
        assert!(log.is_empty().await.unwrap());

        let again = forwarder.reconcile(&log).await.unwrap();
        assert_eq!(again.forwarded, 0);
        assert_eq!(datastore.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_reconcile() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_with(&dir, &["Alice"]).await;
        let forwarder = Forwarder::new(None, Duration::from_secs(10));

        let err = forwarder.reconcile(&log).await.unwrap_err();
        assert!(matches!(err, ServerError::NotConfigured));
        assert_eq!(log.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_with(&dir, &[]).await;
        let (forwarder, datastore) = forwarder(FakeDatastore::default());

        let report = forwarder.reconcile(&log).await.unwrap();

        assert_eq!(report.forwarded, 0);
        assert!(!report.cleared);
        assert_eq!(datastore.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_times_out() {
        let (forwarder, _) = forwarder(FakeDatastore {
            hang: true,
            ..Default::default()
        });
        let record = StoreRecord::new(entry("Alice"), chrono::Utc::now());

        let err = forwarder.forward_record(&record).await.unwrap_err();
        assert!(matches!(
            err,
            NetError::Timeout {
                channel: Channel::Datastore
            }
        ));
    }
}

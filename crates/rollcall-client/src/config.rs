//! Client configuration loaded from environment variables.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rollcall_net::{CentralDatastore, Connectivity, DatastoreConfig, HttpRelayTransport, RealtimeDatabase};
use rollcall_shared::constants::{DEFAULT_HTTP_TIMEOUT_SECS, SCAN_TIMEOUT_SECS};
use rollcall_store::{Database, PendingQueue};

use crate::error::SetupError;
use crate::router::DeliveryRouter;
use crate::scanner::ScanConfig;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Central datastore, if direct uploads are possible at all.
    /// Env: `ROLLCALL_DATASTORE_URL`, `ROLLCALL_DATASTORE_AUTH`
    pub datastore: Option<DatastoreConfig>,

    /// Timeout for POSTs to a relay endpoint.
    /// Env: `ROLLCALL_RELAY_TIMEOUT_SECS`
    pub relay_timeout: Duration,

    /// Env: `ROLLCALL_SCAN_TIMEOUT_SECS`
    pub scan: ScanConfig,

    /// Local database holding the pending queue. `None` uses the platform
    /// data directory.
    /// Env: `ROLLCALL_DB_PATH`
    pub db_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            datastore: None,
            relay_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            scan: ScanConfig::default(),
            db_path: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("ROLLCALL_DATASTORE_URL") {
            if !url.trim().is_empty() {
                config.datastore = Some(
                    DatastoreConfig::new(url.trim())
                        .with_auth_token(std::env::var("ROLLCALL_DATASTORE_AUTH").ok()),
                );
            }
        }

        if let Some(secs) = env_secs("ROLLCALL_RELAY_TIMEOUT_SECS") {
            config.relay_timeout = Duration::from_secs(secs);
        }

        config.scan.timeout = Duration::from_secs(env_secs("ROLLCALL_SCAN_TIMEOUT_SECS").unwrap_or(SCAN_TIMEOUT_SECS));

        if let Ok(path) = std::env::var("ROLLCALL_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        config
    }

    /// Open the pending queue and build a router with HTTP transports.
    pub fn build_router(&self, connectivity: Arc<dyn Connectivity>) -> Result<DeliveryRouter, SetupError> {
        let db = match self.db_path {
            Some(ref path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        let queue = Arc::new(PendingQueue::new(db)?);

        let relay = Arc::new(HttpRelayTransport::new(self.relay_timeout)?);
        let datastore = match self.datastore {
            Some(ref cfg) => Some(Arc::new(RealtimeDatabase::new(cfg.clone())?) as Arc<dyn CentralDatastore>),
            None => None,
        };

        Ok(DeliveryRouter::new(relay, datastore, connectivity, queue))
    }
}

fn env_secs(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            tracing::warn!(key, value = %raw, "Invalid duration, using default");
            None
        }
    }
}

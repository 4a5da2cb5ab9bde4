use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use rollcall_net::{CentralDatastore, RealtimeDatabase};
use rollcall_relay::{serve, AppState, Forwarder, RelayConfig};
use rollcall_store::RecordLog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rollcall_relay=debug")),
        )
        .init();

    info!("Starting Rollcall relay v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = RelayConfig::from_env();
    info!(
        instance = %config.instance_name,
        addr = %config.http_addr,
        store = %config.store_path.display(),
        forwarding = config.datastore_url.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Durable store (creates the file if missing, refuses a corrupt one)
    let records = Arc::new(RecordLog::open(config.store_path.clone()).await?);

    let datastore = match config.datastore() {
        Some(ds) => Some(Arc::new(RealtimeDatabase::new(ds)?) as Arc<dyn CentralDatastore>),
        None => {
            info!("DATASTORE_URL not set, running store-only");
            None
        }
    };
    let forwarder = Arc::new(Forwarder::new(datastore, config.forward_timeout));

    let http_addr = config.http_addr;
    let app_state = AppState {
        records,
        forwarder,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

//! # rollcall-client
//!
//! The submitting side of the attendance pipeline: scan a code, build the
//! entry, deliver it through the relay or the central datastore, and keep it
//! in the local pending queue when neither is reachable.

pub mod config;
pub mod error;
pub mod roster;
pub mod router;
pub mod scanner;
pub mod session;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use error::{ScanError, SetupError, SubmitError};
pub use roster::Roster;
pub use router::{DeliveryOutcome, DeliveryRouter, SyncReport};
pub use scanner::{CaptureDevice, CaptureError, CodeDecoder, DecodeError, Frame, ScanConfig, ScanHandle, ScanState, Scanner};
pub use session::{AttendanceSession, HotspotPrompt, SubmitReceipt};

/// Install a `fmt` subscriber for applications embedding the client.
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rollcall_client=debug,rollcall_net=info,rollcall_store=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}

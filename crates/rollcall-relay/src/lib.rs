//! # rollcall-relay
//!
//! Store-and-forward relay for a local network segment.
//!
//! - **Ingest** (`POST /upload`): every submission is appended to the durable
//!   record store before anything else, acknowledged at once, and then handed
//!   to a detached forward attempt.
//! - **Reconcile** (`POST /forward`): replays the stored snapshot against the
//!   central datastore and clears it only when every record went through.
//! - **Inspect** (`GET /list`, `GET /info`, `GET /health`, `GET /`).

pub mod api;
pub mod config;
pub mod error;
pub mod forward;

pub use api::{build_router, serve, serve_on, AppState};
pub use config::RelayConfig;
pub use error::ServerError;
pub use forward::Forwarder;

//! # rollcall-store
//!
//! Durable local storage for both ends of the attendance pipeline.
//!
//! - On the client, a SQLite-backed key/value [`Database`] plays the role of
//!   browser local storage, and [`PendingQueue`] keeps undelivered entries as
//!   one JSON array under a fixed key.
//! - On the relay node, [`RecordLog`] is an append-only JSON-array file of
//!   [`StoreRecord`](rollcall_shared::StoreRecord)s with a single writer.

pub mod database;
pub mod local_storage;
pub mod migrations;
pub mod pending;
pub mod record_log;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use pending::PendingQueue;
pub use record_log::RecordLog;

//! # rollcall-shared
//!
//! Data model shared by the attendance client and the relay node: the
//! [`AttendanceEntry`] unit of record, the relay's [`StoreRecord`] wrapper,
//! the structured payload carried by a scanned code, and the JSON bodies
//! exchanged over HTTP.

pub mod constants;
pub mod error;
pub mod payload;
pub mod types;

pub use error::EntryError;
pub use payload::{DecodedPayload, WifiCredentials};
pub use types::*;

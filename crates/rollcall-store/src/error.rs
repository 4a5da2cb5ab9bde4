use std::path::PathBuf;

use thiserror::Error;

/// Persistence failures on either the client queue or the relay store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (creating directories, reading or replacing files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be encoded or decoded as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The relay store file exists but does not hold a JSON array of records.
    /// The file is left as-is so an operator can recover it.
    #[error("Store file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The in-process lock guarding the database was poisoned by a panic.
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

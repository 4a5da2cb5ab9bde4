use thiserror::Error;

use rollcall_net::NetError;
use rollcall_store::StoreError;

/// Why a scan produced no code. There is no fallback for these, so they are
/// reported to the submitter as-is.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("QR scan timed out")]
    ScanTimeout,

    #[error("QR scan stopped")]
    ScanAborted,

    #[error("Capture device failed: {0}")]
    Device(String),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Please enter your name")]
    EmptyName,

    #[error("Name not found in the students list")]
    UnknownName,

    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The entry could not even be kept locally.
    #[error("Could not save attendance locally: {0}")]
    Persistence(#[from] StoreError),
}

/// Failures while wiring the client together from configuration.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Local storage: {0}")]
    Store(#[from] StoreError),

    #[error("Network client: {0}")]
    Net(#[from] NetError),
}

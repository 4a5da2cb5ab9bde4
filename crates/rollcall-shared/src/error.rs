use thiserror::Error;

/// Reasons an incoming [`AttendanceEntry`](crate::AttendanceEntry) is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("Entry has no submitter name")]
    MissingName,

    #[error("Entry has no timestamp")]
    MissingTime,
}

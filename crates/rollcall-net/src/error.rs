use std::fmt;

use thiserror::Error;

/// The two delivery channels an entry can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Relay,
    Datastore,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Relay => write!(f, "relay"),
            Channel::Datastore => write!(f, "datastore"),
        }
    }
}

/// Failures of a single delivery attempt. None of these are fatal to the
/// pipeline: callers fall through to the next channel or the local queue.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("{channel} unreachable: {reason}")]
    ChannelUnreachable { channel: Channel, reason: String },

    #[error("{channel} rejected the request with HTTP {status}")]
    Rejected { channel: Channel, status: u16 },

    #[error("{channel} did not answer in time")]
    Timeout { channel: Channel },

    #[error("{channel} answered with an unexpected body: {reason}")]
    InvalidResponse { channel: Channel, reason: String },

    #[error("Central datastore is not configured")]
    NotConfigured,
}

impl NetError {
    pub(crate) fn from_reqwest(channel: Channel, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetError::Timeout { channel }
        } else if let Some(status) = err.status() {
            NetError::Rejected {
                channel,
                status: status.as_u16(),
            }
        } else {
            NetError::ChannelUnreachable {
                channel,
                reason: err.to_string(),
            }
        }
    }

    pub fn channel(&self) -> Option<Channel> {
        match self {
            NetError::ChannelUnreachable { channel, .. }
            | NetError::Rejected { channel, .. }
            | NetError::Timeout { channel }
            | NetError::InvalidResponse { channel, .. } => Some(*channel),
            NetError::NotConfigured => None,
        }
    }
}

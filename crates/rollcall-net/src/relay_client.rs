use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use rollcall_shared::constants::DEFAULT_HTTP_TIMEOUT_SECS;
use rollcall_shared::AttendanceEntry;

use crate::error::{Channel, NetError};

/// Sends an entry to the relay endpoint named in its scanned code.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn post_entry(&self, url: &str, entry: &AttendanceEntry) -> Result<(), NetError>;
}

/// [`RelayTransport`] over HTTP. Any non-2xx answer counts as a failure.
#[derive(Debug, Clone)]
pub struct HttpRelayTransport {
    client: reqwest::Client,
}

impl HttpRelayTransport {
    pub fn new(timeout: Duration) -> Result<Self, NetError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetError::from_reqwest(Channel::Relay, e))?;
        Ok(Self { client })
    }
}

impl Default for HttpRelayTransport {
    fn default() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn post_entry(&self, url: &str, entry: &AttendanceEntry) -> Result<(), NetError> {
        let response = self
            .client
            .post(url)
            .json(entry)
            .send()
            .await
            .map_err(|e| NetError::from_reqwest(Channel::Relay, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetError::Rejected {
                channel: Channel::Relay,
                status: status.as_u16(),
            });
        }

        debug!(url, "Entry accepted by relay");
        Ok(())
    }
}

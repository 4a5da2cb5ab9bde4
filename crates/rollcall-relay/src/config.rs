//! Relay configuration loaded from environment variables.
//!
//! All settings have defaults so a relay can start with zero configuration;
//! without `DATASTORE_URL` it runs in store-only mode and `/forward` answers
//! "not configured".

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use rollcall_net::DatastoreConfig;
use rollcall_shared::constants::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_RELAY_PORT, DEFAULT_STORE_FILE};

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address for the HTTP API.
    /// Env: `HTTP_ADDR`, or `PORT` alone to keep the default interface.
    /// Default: `0.0.0.0:3000`
    pub http_addr: SocketAddr,

    /// File holding the durable record store.
    /// Env: `STORE_PATH`
    /// Default: `./received_attendance.json`
    pub store_path: PathBuf,

    /// Central datastore base URL. Forwarding is disabled when unset.
    /// Env: `DATASTORE_URL`
    pub datastore_url: Option<String>,

    /// Access token for the central datastore.
    /// Env: `DATASTORE_AUTH`
    pub datastore_auth: Option<String>,

    /// Upper bound on each outbound forward call.
    /// Env: `FORWARD_TIMEOUT_SECS`
    /// Default: 10 s
    pub forward_timeout: Duration,

    /// Human-readable name shown on the status endpoints.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Largest accepted request body.
    /// Env: `MAX_BODY_BYTES`
    /// Default: 64 KiB
    pub max_body_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_RELAY_PORT).into(),
            store_path: PathBuf::from(format!("./{DEFAULT_STORE_FILE}")),
            datastore_url: None,
            datastore_auth: None,
            forward_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            instance_name: "Rollcall Relay".to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = var("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => config.http_addr.set_port(port),
                Err(_) => tracing::warn!(value = %port, "Invalid PORT, using default"),
            }
        }

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = var("STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }

        config.datastore_url = var("DATASTORE_URL").filter(|v| !v.trim().is_empty());
        config.datastore_auth = var("DATASTORE_AUTH").filter(|v| !v.is_empty());

        if let Some(val) = var("FORWARD_TIMEOUT_SECS") {
            match val.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.forward_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid FORWARD_TIMEOUT_SECS, using default"),
            }
        }

        if let Some(name) = var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(val) = var("MAX_BODY_BYTES") {
            if let Ok(n) = val.parse::<usize>() {
                config.max_body_bytes = n;
            }
        }

        config
    }

    /// Datastore settings, if this relay can forward at all.
    pub fn datastore(&self) -> Option<DatastoreConfig> {
        self.datastore_url.as_ref().map(|url| {
            DatastoreConfig::new(url.trim())
                .with_auth_token(self.datastore_auth.clone())
                .with_timeout(self.forward_timeout)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> RelayConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RelayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 3000).into());
        assert!(config.datastore().is_none());
        assert_eq!(config.forward_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_port_only_keeps_interface() {
        let config = from_pairs(&[("PORT", "8081")]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8081).into());
    }

    #[test]
    fn test_datastore_settings() {
        let config = from_pairs(&[
            ("DATASTORE_URL", "https://db.example"),
            ("DATASTORE_AUTH", "secret"),
            ("FORWARD_TIMEOUT_SECS", "3"),
        ]);
        let ds = config.datastore().unwrap();
        assert_eq!(ds.base_url, "https://db.example");
        assert_eq!(ds.auth_token.as_deref(), Some("secret"));
        assert_eq!(ds.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[("HTTP_ADDR", "nope"), ("FORWARD_TIMEOUT_SECS", "0")]);
        assert_eq!(config.http_addr, RelayConfig::default().http_addr);
        assert_eq!(config.forward_timeout, Duration::from_secs(10));
    }
}

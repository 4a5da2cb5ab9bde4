//! Client for the central datastore.
//!
//! The datastore speaks the Realtime-Database REST dialect: pushing a record
//! is `POST {base}/{collection}.json`, answered with `{"name": "<push key>"}`.
//! An optional access token is passed as the `auth` query parameter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use rollcall_shared::constants::DEFAULT_HTTP_TIMEOUT_SECS;

use crate::error::{Channel, NetError};

/// Where the central datastore lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct DatastoreConfig {
    /// Base URL, e.g. `https://example-rtdb.firebasedatabase.app`.
    pub base_url: String,
    /// Access token, sent as `?auth=`.
    pub auth_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl DatastoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Write side of the central datastore.
#[async_trait]
pub trait CentralDatastore: Send + Sync {
    /// Push `record` as a new child of `collection`. Returns the push key.
    async fn push(&self, collection: &str, record: &Value) -> Result<String, NetError>;
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

/// [`CentralDatastore`] over HTTP.
#[derive(Debug, Clone)]
pub struct RealtimeDatabase {
    client: reqwest::Client,
    config: DatastoreConfig,
}

impl RealtimeDatabase {
    pub fn new(config: DatastoreConfig) -> Result<Self, NetError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NetError::from_reqwest(Channel::Datastore, e))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DatastoreConfig {
        &self.config
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/{}.json",
            self.config.base_url.trim_end_matches('/'),
            collection.trim_matches('/')
        )
    }
}

#[async_trait]
impl CentralDatastore for RealtimeDatabase {
    async fn push(&self, collection: &str, record: &Value) -> Result<String, NetError> {
        let mut request = self.client.post(self.collection_url(collection)).json(record);
        if let Some(ref token) = self.config.auth_token {
            request = request.query(&[("auth", token)]);
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| NetError::from_reqwest(Channel::Datastore, e))?;

        let body: PushResponse = response.json().await.map_err(|e| NetError::InvalidResponse {
            channel: Channel::Datastore,
            reason: e.to_string(),
        })?;

        debug!(collection, key = %body.name, "Record pushed to datastore");
        Ok(body.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    type Seen = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

    async fn fake_rtdb(status: StatusCode) -> (String, Seen) {
        let seen: Seen = Arc::default();

        async fn handler(
            State((seen, status)): State<(Seen, StatusCode)>,
            Path(file): Path<String>,
            Query(query): Query<HashMap<String, String>>,
            Json(body): Json<Value>,
        ) -> (StatusCode, Json<Value>) {
            seen.lock().unwrap().push((file, query.get("auth").cloned(), body));
            (status, Json(serde_json::json!({ "name": "-Nxyz" })))
        }

        let app = Router::new()
            .route("/:file", post(handler))
            .with_state((seen.clone(), status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (format!("http://{addr}"), seen)
    }

    #[tokio::test]
    async fn test_push_posts_to_collection_with_auth() {
        let (base, seen) = fake_rtdb(StatusCode::OK).await;
        let db = RealtimeDatabase::new(
            DatastoreConfig::new(format!("{base}/")).with_auth_token(Some("tok".into())),
        )
        .unwrap();

        let key = db
            .push("attendance", &serde_json::json!({ "name": "Alice" }))
            .await
            .unwrap();

        assert_eq!(key, "-Nxyz");
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "attendance.json");
        assert_eq!(seen[0].1.as_deref(), Some("tok"));
        assert_eq!(seen[0].2["name"], "Alice");
    }

    #[tokio::test]
    async fn test_push_maps_error_status() {
        let (base, _seen) = fake_rtdb(StatusCode::UNAUTHORIZED).await;
        let db = RealtimeDatabase::new(DatastoreConfig::new(base)).unwrap();

        let err = db.push("attendance", &serde_json::json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            NetError::Rejected {
                channel: Channel::Datastore,
                status: 401
            }
        ));
    }

    #[tokio::test]
    async fn test_push_to_dead_host_is_unreachable() {
        let db = RealtimeDatabase::new(
            DatastoreConfig::new("http://127.0.0.1:1").with_timeout(Duration::from_secs(2)),
        )
        .unwrap();

        let err = db.push("attendance", &serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.channel(), Some(Channel::Datastore));
    }
}

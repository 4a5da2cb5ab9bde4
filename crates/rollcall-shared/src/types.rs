use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::constants::{RECEIVED_AT_FIELD, RELAY_RECORD_ID_FIELD};
use crate::error::EntryError;

// ---------------------------------------------------------------------------
// AttendanceEntry
// ---------------------------------------------------------------------------

/// One attendance submission.
///
/// Fields are read-only once the entry exists. Delivery code only ever holds
/// `&AttendanceEntry`; server-side metadata is added by wrapping the entry
/// (see [`StoreRecord`]) or by building a separate JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    name: String,
    time: String,
    #[serde(default)]
    rep_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    rep_url: Option<String>,
    #[serde(default)]
    raw_qr: String,
}

impl AttendanceEntry {
    /// Start an entry for `name` captured at `time`. The optional routing
    /// fields are filled with the `with_*` methods before the entry is handed
    /// to delivery.
    pub fn new(name: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time: time.into(),
            rep_id: None,
            session_id: None,
            rep_url: None,
            raw_qr: String::new(),
        }
    }

    pub fn with_rep_id(mut self, rep_id: Option<String>) -> Self {
        self.rep_id = rep_id;
        self
    }

    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_rep_url(mut self, rep_url: Option<String>) -> Self {
        self.rep_url = rep_url;
        self
    }

    pub fn with_raw_qr(mut self, raw_qr: impl Into<String>) -> Self {
        self.raw_qr = raw_qr.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn rep_id(&self) -> Option<&str> {
        self.rep_id.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Relay endpoint to try before the central datastore.
    pub fn rep_url(&self) -> Option<&str> {
        self.rep_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    pub fn raw_qr(&self) -> &str {
        &self.raw_qr
    }

    /// Reject entries that cannot be attributed to anyone.
    pub fn validate(&self) -> Result<(), EntryError> {
        if self.name.trim().is_empty() {
            return Err(EntryError::MissingName);
        }
        if self.time.trim().is_empty() {
            return Err(EntryError::MissingTime);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StoreRecord
// ---------------------------------------------------------------------------

/// An entry as held in the relay's durable store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoreRecord {
    /// Assigned at ingest; forwarded as `relayRecordId`. Stored records
    /// without one get an id when the store is opened.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub entry: AttendanceEntry,
}

impl StoreRecord {
    pub fn new(entry: AttendanceEntry, received_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at,
            entry,
        }
    }

    /// The JSON object pushed to the central datastore: the entry's fields
    /// plus `receivedAt` and `relayRecordId`.
    pub fn forward_payload(&self) -> Value {
        let mut payload = serde_json::to_value(&self.entry).unwrap_or_else(|_| Value::Null);
        if let Value::Object(ref mut map) = payload {
            map.insert(
                RECEIVED_AT_FIELD.to_string(),
                Value::String(self.received_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
            map.insert(
                RELAY_RECORD_ID_FIELD.to_string(),
                Value::String(self.id.to_string()),
            );
        }
        payload
    }
}

// ---------------------------------------------------------------------------
// Relay wire bodies
// ---------------------------------------------------------------------------

/// Body returned by `POST /upload` once the entry is durably stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadAck {
    pub ok: bool,
}

/// Per-record result of a forward pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwardResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ForwardResult {
    pub fn success() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Body returned by `POST /forward`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwardReport {
    pub ok: bool,
    /// Number of records attempted in this pass.
    pub forwarded: usize,
    /// Whether the snapshot was removed from the store.
    pub cleared: bool,
    pub results: Vec<ForwardResult>,
}

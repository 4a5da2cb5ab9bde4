//! Structured content embedded in a scanned code.
//!
//! A code may carry a JSON object such as
//! `{"timestamp":"...","repId":"r1","sessionId":"s1","repUrl":"http://10.0.0.1:3000/upload","wifi":{"ssid":"rep","password":"pw"}}`.
//! Anything else is still accepted: the raw text ends up in `rawQr` and every
//! routing field falls back to its default.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::types::AttendanceEntry;

/// Hotspot credentials advertised by a relay so the submitter can join its
/// network segment by hand.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

/// Fields recovered from a scanned code. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedPayload {
    pub timestamp: Option<String>,
    pub rep_id: Option<String>,
    pub session_id: Option<String>,
    pub rep_url: Option<String>,
    pub wifi: Option<WifiCredentials>,
}

impl DecodedPayload {
    /// Parse the decoded text. Returns an empty payload when the text is not a
    /// JSON object.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Self::from_map(&map),
            _ => Self::default(),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let wifi = map.get("wifi").and_then(Value::as_object).map(|w| WifiCredentials {
            ssid: scalar(w.get("ssid")).unwrap_or_default(),
            password: scalar(w.get("password")).unwrap_or_default(),
        });

        Self {
            timestamp: scalar(map.get("timestamp")),
            rep_id: scalar(map.get("repId")),
            session_id: scalar(map.get("sessionId")),
            rep_url: scalar(map.get("repUrl")),
            wifi,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Strings are taken verbatim and numbers rendered; empty strings, `null`,
/// booleans and nested values count as absent.
fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl AttendanceEntry {
    /// Build the entry for `name` from a decoded code. `captured_at` is used
    /// when the code carries no timestamp of its own.
    pub fn from_scan(name: &str, raw_qr: &str, captured_at: DateTime<Utc>) -> (Self, DecodedPayload) {
        let payload = DecodedPayload::parse(raw_qr);
        let time = payload
            .timestamp
            .clone()
            .unwrap_or_else(|| captured_at.to_rfc3339_opts(SecondsFormat::Millis, true));

        let entry = AttendanceEntry::new(name, time)
            .with_rep_id(payload.rep_id.clone())
            .with_session_id(payload.session_id.clone())
            .with_rep_url(payload.rep_url.clone())
            .with_raw_qr(raw_qr);

        (entry, payload)
    }
}

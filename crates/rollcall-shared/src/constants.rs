/// Application name
pub const APP_NAME: &str = "Rollcall";

/// Local storage key holding the client's pending queue (a JSON array)
pub const PENDING_KEY: &str = "pendingAttendance";

/// Central datastore collection receiving attendance records
pub const ATTENDANCE_COLLECTION: &str = "attendance";

/// Central datastore collection holding the student roster (read-only)
pub const STUDENTS_COLLECTION: &str = "students";

/// Wall-clock limit for a single scan, in seconds
pub const SCAN_TIMEOUT_SECS: u64 = 30;

/// Interval between capture ticks while scanning (roughly one display frame)
pub const SCAN_FRAME_INTERVAL_MS: u64 = 16;

/// Default timeout for outbound HTTP calls (relay POST, datastore write)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP port of the relay node
pub const DEFAULT_RELAY_PORT: u16 = 3000;

/// Default file name of the relay's durable store
pub const DEFAULT_STORE_FILE: &str = "received_attendance.json";

/// Field added to every forwarded record so the datastore can spot replays
pub const RELAY_RECORD_ID_FIELD: &str = "relayRecordId";

/// Field holding the server-side receipt time on forwarded records
pub const RECEIVED_AT_FIELD: &str = "receivedAt";

//! Shared timestamp/event helpers for audit events and response envelopes.

use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Response envelope used by the `rpc` surface.
pub fn response_envelope(request_id: &str, status: u16, body: JsonValue) -> JsonValue {
    serde_json::json!({
        "envelope_version": "1.0.0",
        "id": request_id,
        "ts": now_epoch_z(),
        "status": status,
        "body": body
    })
}

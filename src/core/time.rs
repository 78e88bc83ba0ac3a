//! Shared timestamp/event helpers for ledger documents and command envelopes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use ulid::Ulid;

pub const ENVELOPE_VERSION: &str = "1.0.0";

/// Renders an instant as RFC 3339 UTC with millisecond precision (e.g. `2026-10-18T09:14:03.512Z`).
pub fn format_iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_iso() -> String {
    format_iso(Utc::now())
}

/// Parses a ledger timestamp. Anything that is not RFC 3339 yields `None`.
pub fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// JSON printed by every ledger command: envelope header fields first, then
/// the keys of `payload` (an object) merged in.
pub fn command_envelope(cmd: &str, status: &str, payload: JsonValue) -> JsonValue {
    let mut envelope = serde_json::Map::new();
    envelope.insert("envelope_version".into(), ENVELOPE_VERSION.into());
    envelope.insert("ts".into(), now_iso().into());
    envelope.insert("event_id".into(), new_event_id().into());
    envelope.insert("cmd".into(), cmd.into());
    envelope.insert("status".into(), status.into());
    if let JsonValue::Object(fields) = payload {
        envelope.extend(fields);
    }
    JsonValue::Object(envelope)
}

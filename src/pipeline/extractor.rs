//! Transcript extractor — normalizes webhook payload shapes.
//!
//! Producers nest the same data at different paths depending on version.
//! Each field is resolved by probing an ordered list of JSON pointers; the
//! first present value wins. Extraction never fails: a payload with no
//! recognizable transcript is serialized whole so the summarizer still gets
//! something to read.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::pipeline::types::ExtractedCall;

const TRANSCRIPT_PATHS: &[&str] = &["/transcript", "/message/transcript", "/call/transcript"];

const MESSAGE_ARRAY_PATHS: &[&str] = &[
    "/messages",
    "/message/messages",
    "/message/artifact/messages",
];

const NESTED_TRANSCRIPT_PATHS: &[&str] = &[
    "/message/call/transcript",
    "/message/artifact/transcript",
];

const STARTED_AT_PATHS: &[&str] = &[
    "/message/call/startedAt",
    "/call/startedAt",
    "/message/startedAt",
    "/startedAt",
    "/message/timestamp",
    "/timestamp",
];

const PHONE_PATHS: &[&str] = &[
    "/message/call/customer/number",
    "/message/customer/number",
    "/call/customer/number",
    "/customer/number",
    "/message/call/phoneNumber",
    "/call/phoneNumber",
    "/phoneNumber",
    "/message/call/from",
    "/call/from",
];

const RECORDING_URL_PATHS: &[&str] = &[
    "/message/recordingUrl",
    "/message/artifact/recordingUrl",
    "/message/call/recordingUrl",
    "/recordingUrl",
    "/call/recordingUrl",
];

const CALL_ID_PATHS: &[&str] = &["/message/call/id", "/call/id"];

/// Event type discriminator, read from `message.type` then `type`.
pub fn event_type(event: &Value) -> Option<&str> {
    event
        .pointer("/message/type")
        .or_else(|| event.get("type"))
        .and_then(Value::as_str)
}

/// Normalize a raw call event into transcript plus metadata.
pub fn extract(event: &Value) -> ExtractedCall {
    let call_id = first_text(event, CALL_ID_PATHS).unwrap_or_else(|| Uuid::new_v4().to_string());

    let transcript = extract_transcript(event).unwrap_or_else(|| {
        debug!(call_id = %call_id, "No transcript field found, using full payload");
        serde_json::to_string_pretty(event).unwrap_or_else(|_| event.to_string())
    });

    ExtractedCall {
        call_id,
        transcript,
        started_at: extract_started_at(event),
        caller_phone: first_text(event, PHONE_PATHS),
        recording_url: first_text(event, RECORDING_URL_PATHS),
    }
}

/// Resolve the transcript in priority order, or `None` if no candidate holds one.
pub fn extract_transcript(event: &Value) -> Option<String> {
    first_text(event, TRANSCRIPT_PATHS)
        .or_else(|| {
            MESSAGE_ARRAY_PATHS
                .iter()
                .find_map(|path| event.pointer(path).and_then(render_messages))
        })
        .or_else(|| first_text(event, NESTED_TRANSCRIPT_PATHS))
}

/// First parseable call-start timestamp.
pub fn extract_started_at(event: &Value) -> Option<DateTime<Utc>> {
    STARTED_AT_PATHS
        .iter()
        .filter_map(|path| event.pointer(path))
        .find_map(parse_timestamp)
}

/// Render a message array as `"{role}: {content}"` lines.
fn render_messages(value: &Value) -> Option<String> {
    let entries = value.as_array()?;
    let lines: Vec<String> = entries
        .iter()
        .filter_map(|entry| {
            let content = entry
                .get("content")
                .or_else(|| entry.get("message"))
                .and_then(as_text)?;
            let role = entry.get("role").and_then(as_text).unwrap_or_else(|| "unknown".into());
            Some(format!("{role}: {content}"))
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn first_text(event: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| event.pointer(path))
        .find_map(as_text)
}

/// Scalar value as non-empty text. Objects, arrays and null are absent.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accepts RFC 3339 strings, naive ISO strings (assumed UTC), and epoch
/// seconds or milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(naive.and_utc());
            }
            s.parse::<i64>().ok().and_then(from_epoch)
        }
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        _ => None,
    }
}

fn from_epoch(raw: i64) -> Option<DateTime<Utc>> {
    // Values beyond ~5138 AD in seconds are taken as milliseconds.
    if raw.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    }
}

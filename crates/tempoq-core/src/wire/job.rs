//! Job messages — the five-field tuple carried by `SCHEDULE`/`UNSCHEDULE`,
//! its header tokens, and the schedule hash.
//!
//! A job message serializes as a JSON **array** so the value written to the
//! backing store is byte-for-byte the message as received:
//! `[queue, headers, interval_secs, payload, cron_expr]`.

use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// `run_count` value meaning "dispatch forever".
pub const INFINITE_RUN_COUNT: i64 = -1;

// ─────────────────────────────────────────────
// JobMessage
// ─────────────────────────────────────────────

/// A scheduled-job request as received from a client.
///
/// `interval_secs >= 0` selects an interval schedule; `-1` selects a cron
/// schedule, in which case `cron_expr` must hold a five-field expression.
/// `payload` stays opaque here: it is forwarded verbatim to the broker and
/// only parsed for identity hashing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobMessage {
    pub queue: String,
    pub headers: String,
    pub interval_secs: i64,
    pub payload: String,
    pub cron_expr: String,
}

impl JobMessage {
    /// Remaining dispatches allowed by the headers (default: infinite).
    pub fn run_count(&self) -> i64 {
        run_count_from_headers(&self.headers)
    }

    /// Whether the headers suppress the immediate haste dispatch.
    pub fn has_nohaste(&self) -> bool {
        has_nohaste(&self.headers)
    }

    /// Whether this message selects an interval schedule.
    pub fn is_interval(&self) -> bool {
        self.interval_secs >= 0
    }

    /// Wire body frames, in field order.
    pub fn to_frames(&self) -> Vec<String> {
        vec![
            self.queue.clone(),
            self.headers.clone(),
            self.interval_secs.to_string(),
            self.payload.clone(),
            self.cron_expr.clone(),
        ]
    }

    /// Parse the body frames of a `SCHEDULE`/`UNSCHEDULE` message.
    pub fn from_frames(frames: &[String]) -> Result<Self> {
        if frames.len() < 5 {
            return Err(Error::Malformed(format!(
                "expected 5 fields, got {}",
                frames.len()
            )));
        }
        let interval_secs = frames[2]
            .parse::<i64>()
            .map_err(|e| Error::Malformed(format!("interval {:?}: {}", frames[2], e)))?;
        Ok(Self {
            queue: frames[0].clone(),
            headers: frames[1].clone(),
            interval_secs,
            payload: frames[3].clone(),
            cron_expr: frames[4].clone(),
        })
    }
}

impl Serialize for JobMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (
            &self.queue,
            &self.headers,
            self.interval_secs,
            &self.payload,
            &self.cron_expr,
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JobMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (queue, headers, interval_secs, payload, cron_expr) =
            Deserialize::deserialize(deserializer)?;
        Ok(Self {
            queue,
            headers,
            interval_secs,
            payload,
            cron_expr,
        })
    }
}

// ─────────────────────────────────────────────
// Headers
// ─────────────────────────────────────────────

/// Extract `run_count:<n>` from a comma-separated header string.
///
/// Unknown tokens are ignored; a missing or unparsable count means
/// infinite.
pub fn run_count_from_headers(headers: &str) -> i64 {
    let mut run_count = INFINITE_RUN_COUNT;
    for header in headers.split(',') {
        if let Some(value) = header.trim().strip_prefix("run_count:") {
            if let Ok(n) = value.parse::<i64>() {
                run_count = n;
            }
        }
    }
    run_count
}

/// Whether the bare `nohaste` token is present.
pub fn has_nohaste(headers: &str) -> bool {
    headers.split(',').any(|h| h.trim() == "nohaste")
}

/// Rewrite the `run_count:*` token in place, leaving other tokens as-is.
pub fn rewrite_run_count(headers: &str, new_count: i64) -> String {
    headers
        .split(',')
        .map(|header| {
            if header.trim().starts_with("run_count:") {
                format!("run_count:{}", new_count)
            } else {
                header.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

// ─────────────────────────────────────────────
// Schedule hash
// ─────────────────────────────────────────────

/// Identity fields hashed out of the payload, in canonical (sorted) order.
const IDENTITY_FIELDS: [&str; 6] = [
    "args",
    "callable",
    "class_args",
    "class_kwargs",
    "kwargs",
    "path",
];

/// Compute the canonical identity of a job message.
///
/// The payload is a JSON array whose second element describes the callable;
/// the hash covers `{args, kwargs, class_args, class_kwargs, path,
/// callable}` serialized with sorted keys, so two messages naming the same
/// callable with the same arguments share identity regardless of queue,
/// headers, or cadence.
pub fn schedule_hash(message: &JobMessage) -> Result<String> {
    let parsed: serde_json::Value = serde_json::from_str(&message.payload)
        .map_err(|e| Error::Malformed(format!("payload is not JSON: {}", e)))?;

    let job = parsed
        .get(1)
        .and_then(|v| v.as_object())
        .ok_or_else(|| Error::Malformed("payload[1] is not an object".to_string()))?;

    let mut identity = BTreeMap::new();
    for field in IDENTITY_FIELDS {
        identity.insert(field, job.get(field).cloned().unwrap_or(serde_json::Value::Null));
    }

    let canonical = serde_json::to_string(&identity)?;
    let digest = Sha1::digest(canonical.as_bytes());
    Ok(hex::encode(digest))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(job: serde_json::Value) -> String {
        serde_json::json!(["run", job]).to_string()
    }

    fn message(payload: &str) -> JobMessage {
        JobMessage {
            queue: "default".to_string(),
            headers: String::new(),
            interval_secs: 60,
            payload: payload.to_string(),
            cron_expr: String::new(),
        }
    }

    #[test]
    fn test_serializes_as_array() {
        let msg = JobMessage {
            queue: "q1".to_string(),
            headers: "run_count:3".to_string(),
            interval_secs: 60,
            payload: "[]".to_string(),
            cron_expr: String::new(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"["q1","run_count:3",60,"[]",""]"#);
    }

    #[test]
    fn test_array_round_trip() {
        let msg = JobMessage {
            queue: "q1".to_string(),
            headers: "nohaste".to_string(),
            interval_secs: -1,
            payload: "[\"run\", {}]".to_string(),
            cron_expr: "* * * * *".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: JobMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_from_frames() {
        let frames: Vec<String> = ["q2", "run_count:5", "30", "[]", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let msg = JobMessage::from_frames(&frames).unwrap();
        assert_eq!(msg.queue, "q2");
        assert_eq!(msg.interval_secs, 30);
        assert_eq!(msg.run_count(), 5);
    }

    #[test]
    fn test_from_frames_short() {
        let frames = vec!["q".to_string(), "h".to_string()];
        assert!(JobMessage::from_frames(&frames).is_err());
    }

    #[test]
    fn test_from_frames_bad_interval() {
        let frames: Vec<String> = ["q", "", "soon", "[]", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(JobMessage::from_frames(&frames).is_err());
    }

    #[test]
    fn test_frames_round_trip() {
        let msg = message(&payload(serde_json::json!({"path": "a", "callable": "b"})));
        assert_eq!(JobMessage::from_frames(&msg.to_frames()).unwrap(), msg);
    }

    // ── Headers ──

    #[test]
    fn test_run_count_default_infinite() {
        assert_eq!(run_count_from_headers(""), INFINITE_RUN_COUNT);
        assert_eq!(run_count_from_headers("guarantee"), INFINITE_RUN_COUNT);
    }

    #[test]
    fn test_run_count_parsed() {
        assert_eq!(run_count_from_headers("run_count:3"), 3);
        assert_eq!(run_count_from_headers("nohaste,run_count:12"), 12);
        assert_eq!(run_count_from_headers("run_count:-1"), -1);
    }

    #[test]
    fn test_run_count_unparsable_ignored() {
        assert_eq!(run_count_from_headers("run_count:lots"), INFINITE_RUN_COUNT);
    }

    #[test]
    fn test_nohaste_detection() {
        assert!(has_nohaste("nohaste"));
        assert!(has_nohaste("run_count:2,nohaste"));
        assert!(!has_nohaste(""));
        assert!(!has_nohaste("nohaste_extra"));
    }

    #[test]
    fn test_rewrite_run_count() {
        assert_eq!(rewrite_run_count("run_count:3", 2), "run_count:2");
        assert_eq!(
            rewrite_run_count("nohaste,run_count:3", 0),
            "nohaste,run_count:0"
        );
        // No token: untouched
        assert_eq!(rewrite_run_count("nohaste", 7), "nohaste");
    }

    // ── Schedule hash ──

    #[test]
    fn test_hash_is_hex_sha1() {
        let msg = message(&payload(serde_json::json!({
            "args": [1, 2], "kwargs": {}, "class_args": [],
            "class_kwargs": {}, "path": "jobs.email", "callable": "send"
        })));
        let hash = schedule_hash(&msg).unwrap();
        assert_eq!(hash.len(), 40);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_ignores_key_order() {
        let a = message(&payload(serde_json::json!({
            "args": [1], "kwargs": {"x": 1}, "class_args": [],
            "class_kwargs": {}, "path": "jobs", "callable": "run"
        })));
        // Same fields, different textual order in the payload.
        let b = message(
            r#"["run", {"callable": "run", "path": "jobs", "class_kwargs": {},
                "class_args": [], "kwargs": {"x": 1}, "args": [1]}]"#,
        );
        assert_eq!(schedule_hash(&a).unwrap(), schedule_hash(&b).unwrap());
    }

    #[test]
    fn test_hash_ignores_queue_headers_cadence() {
        let base = message(&payload(serde_json::json!({
            "args": [], "kwargs": {}, "class_args": [],
            "class_kwargs": {}, "path": "p", "callable": "c"
        })));
        let mut other = base.clone();
        other.queue = "another".to_string();
        other.headers = "run_count:9".to_string();
        other.interval_secs = -1;
        other.cron_expr = "* * * * *".to_string();
        assert_eq!(schedule_hash(&base).unwrap(), schedule_hash(&other).unwrap());
    }

    #[test]
    fn test_hash_differs_on_args() {
        let a = message(&payload(serde_json::json!({
            "args": [1], "kwargs": {}, "class_args": [],
            "class_kwargs": {}, "path": "p", "callable": "c"
        })));
        let b = message(&payload(serde_json::json!({
            "args": [2], "kwargs": {}, "class_args": [],
            "class_kwargs": {}, "path": "p", "callable": "c"
        })));
        assert_ne!(schedule_hash(&a).unwrap(), schedule_hash(&b).unwrap());
    }

    #[test]
    fn test_hash_missing_fields_are_null() {
        // Absent identity fields hash like explicit nulls.
        let a = message(&payload(serde_json::json!({"path": "p", "callable": "c"})));
        let b = message(&payload(serde_json::json!({
            "path": "p", "callable": "c", "args": null,
            "kwargs": null, "class_args": null, "class_kwargs": null
        })));
        assert_eq!(schedule_hash(&a).unwrap(), schedule_hash(&b).unwrap());
    }

    #[test]
    fn test_hash_rejects_non_json_payload() {
        assert!(schedule_hash(&message("definitely not json")).is_err());
    }

    #[test]
    fn test_hash_rejects_wrong_shape() {
        assert!(schedule_hash(&message("[]")).is_err());
        assert!(schedule_hash(&message("[\"run\", 42]")).is_err());
    }
}

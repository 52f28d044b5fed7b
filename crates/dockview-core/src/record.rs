#![forbid(unsafe_code)]

//! Normalized log records.
//!
//! Two inputs feed the record model:
//!
//! - [`RawEntry`]: a structured entry as returned by the log endpoint
//!   (`{timestamp, message, level?}`).
//! - Raw text lines, which may be JSON objects or free text with an optional
//!   leading timestamp.
//!
//! Normalization never drops a line. A line that looks like JSON but fails to
//! parse is treated as free text.
//!
//! # Record identity
//!
//! [`LogRecord::id`] is `"{timestamp}_{first 50 chars of message}"`. It is a
//! merge and anchor key, not a unique key: repeated identical lines within the
//! same timestamp share an id. Merging only compares ids at the seam between
//! an older page and the buffer head, so repeats elsewhere are kept.

use std::sync::LazyLock;

use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::level::LogLevel;

/// Number of message characters folded into a record id.
pub const ID_MESSAGE_PREFIX_CHARS: usize = 50;

static LEADING_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4}-[0-9]{2}-[0-9]{2}[T ][0-9]{2}:[0-9]{2}:[0-9]{2})")
        .expect("leading timestamp pattern compiles")
});

/// A log entry as delivered by a log source, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl RawEntry {
    /// An entry carrying only a raw line; timestamp and level are derived
    /// from the line during normalization.
    #[must_use]
    pub fn line(line: impl Into<String>) -> Self {
        Self {
            timestamp: String::new(),
            message: line.into(),
            level: None,
        }
    }

    /// A fully structured entry.
    #[must_use]
    pub fn new(
        timestamp: impl Into<String>,
        message: impl Into<String>,
        level: Option<&str>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            message: message.into(),
            level: level.map(str::to_string),
        }
    }
}

/// One normalized log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub id: String,
    pub timestamp: String,
    pub message: String,
    pub level: LogLevel,
    /// Severity label as received, case preserved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_level: Option<String>,
}

/// Build the merge/anchor key for a record.
#[must_use]
pub fn record_id(timestamp: &str, message: &str) -> String {
    let prefix: String = message.chars().take(ID_MESSAGE_PREFIX_CHARS).collect();
    format!("{timestamp}_{prefix}")
}

/// Current time in the fallback timestamp format (`2024-01-01T00:00:00.000Z`).
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl LogRecord {
    /// Create a record with a derived id.
    #[must_use]
    pub fn new(timestamp: impl Into<String>, message: impl Into<String>, level: LogLevel) -> Self {
        let timestamp = timestamp.into();
        let message = message.into();
        Self {
            id: record_id(&timestamp, &message),
            timestamp,
            message,
            level,
            raw_level: None,
        }
    }

    /// Normalize a raw text line, using the wall clock when the line carries
    /// no timestamp.
    #[must_use]
    pub fn parse_line(line: &str) -> Self {
        Self::parse_line_at(line, now_timestamp)
    }

    /// Normalize a raw text line with an explicit fallback clock.
    pub fn parse_line_at(line: &str, now: impl FnOnce() -> String) -> Self {
        if line.trim_start().starts_with('{') {
            match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(fields)) => return Self::from_structured(line, &fields, now),
                Ok(_) => {
                    tracing::trace!(len = line.len(), "json line is not an object, using text");
                }
                Err(err) => {
                    tracing::trace!(error = %err, "malformed json log line, using text");
                }
            }
        }
        Self::from_text(line, now)
    }

    /// Normalize an entry returned by a log source.
    ///
    /// An explicit level wins. Without one, the message is normalized as a
    /// raw line, and a non-empty entry timestamp replaces the extracted one.
    pub fn from_entry_at(entry: RawEntry, now: impl FnOnce() -> String) -> Self {
        let RawEntry {
            timestamp,
            message,
            level,
        } = entry;

        if let Some(label) = level.filter(|l| !l.trim().is_empty()) {
            let timestamp = if timestamp.is_empty() { now() } else { timestamp };
            let mut record = Self::new(timestamp, message, LogLevel::from_label(&label));
            record.raw_level = Some(label);
            return record;
        }

        let mut record = Self::parse_line_at(&message, now);
        if !timestamp.is_empty() && timestamp != record.timestamp {
            record.id = record_id(&timestamp, &record.message);
            record.timestamp = timestamp;
        }
        record
    }

    /// [`from_entry_at`](Self::from_entry_at) with the wall clock.
    #[must_use]
    pub fn from_entry(entry: RawEntry) -> Self {
        Self::from_entry_at(entry, now_timestamp)
    }

    /// Label for display: the received label when present, else the badge.
    #[must_use]
    pub fn level_label(&self) -> &str {
        self.raw_level.as_deref().unwrap_or(self.level.badge())
    }

    fn from_structured(line: &str, fields: &Map<String, Value>, now: impl FnOnce() -> String) -> Self {
        let timestamp = first_field(fields, &["timestamp", "time"]).unwrap_or_else(now);
        let message = first_field(fields, &["message", "msg"]).unwrap_or_else(|| line.to_string());
        let raw_level = first_field(fields, &["level", "severity"]);
        let level = raw_level
            .as_deref()
            .map_or(LogLevel::Undefined, LogLevel::from_label);

        let mut record = Self::new(timestamp, message, level);
        record.raw_level = raw_level;
        record
    }

    fn from_text(line: &str, now: impl FnOnce() -> String) -> Self {
        match LEADING_TIMESTAMP.captures(line).and_then(|c| c.get(1)) {
            Some(ts) => Self::new(ts.as_str(), line, LogLevel::Info),
            None => Self::new(now(), line, LogLevel::Undefined),
        }
    }
}

/// First present, non-empty field among `keys`, stringified.
fn first_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match fields.get(*key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}

//! Record model
//!
//! Defines the polymorphic, immutable log/event record that flows through the
//! rest of the engine. The carrier denormalizes the fields shared by every
//! record kind (`seq`, `level`, `timestamp`, `message`, `source_id`) onto one
//! struct and keeps the per-kind fields in a payload enum, so callers that
//! only care about ordering or severity never need to match on the payload.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Log severity. Unrecognized strings parse to [`Level::Unknown`] rather than
/// failing — this is what lets a malformed or schema-less line still produce
/// a displayable record instead of being dropped outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Unknown,
}

impl Level {
    /// All levels, in the order the scheduler iterates them when a search is
    /// not scoped to a subset of severities.
    pub const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Unknown,
    ];

    pub fn parse(s: &str) -> Level {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Level::Trace,
            "DEBUG" => Level::Debug,
            "INFO" => Level::Info,
            "WARN" | "WARNING" => Level::Warn,
            "ERROR" => Level::Error,
            _ => Level::Unknown,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// Fields specific to a container-runtime log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFields {
    pub thread: Option<String>,
    pub service_name: Option<String>,
    pub service_version: Option<String>,
    pub logger: Option<String>,
    pub correlation_id: Option<String>,
    pub request_id: Option<String>,
    pub error_message: Option<String>,
    pub stacktrace: Option<String>,
}

/// Fields specific to a message-bus record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusFields {
    pub topic: String,
    pub key: Option<String>,
    pub offset: i64,
    pub partition: i32,
    pub headers: HashMap<String, String>,
    pub correlation_id: Option<String>,
    pub request_id: Option<String>,
    pub composite_event_id: Option<String>,
}

/// Per-kind payload for a [`Record`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    Log(LogFields),
    Bus(BusFields),
}

/// A single ingested, parsed log or event record.
///
/// `canonical` is computed once in the constructors below and never mutated
/// afterward. It deliberately excludes `seq`, which the scheduler may
/// reassign after construction, so reassigning it never invalidates the
/// cached string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub seq: u64,
    pub level: Level,
    pub timestamp: i64,
    pub message: String,
    pub source_id: String,
    pub payload: Payload,
    canonical: String,
}

impl Record {
    /// Build a `LogRecord`. `seq` is a placeholder until the scheduler
    /// assigns the authoritative sequence number on ingest.
    #[allow(clippy::too_many_arguments)]
    pub fn new_log(
        seq: u64,
        level: Level,
        timestamp: i64,
        message: String,
        source_id: String,
        fields: LogFields,
    ) -> Record {
        let payload = Payload::Log(fields);
        let canonical = Self::build_canonical(level, timestamp, &message, &source_id, &payload);
        Record {
            seq,
            level,
            timestamp,
            message,
            source_id,
            payload,
            canonical,
        }
    }

    pub fn new_bus(
        seq: u64,
        level: Level,
        timestamp: i64,
        message: String,
        source_id: String,
        fields: BusFields,
    ) -> Record {
        let payload = Payload::Bus(fields);
        let canonical = Self::build_canonical(level, timestamp, &message, &source_id, &payload);
        Record {
            seq,
            level,
            timestamp,
            message,
            source_id,
            payload,
            canonical,
        }
    }

    /// Lowercased, space-joined concatenation of every non-null
    /// string-coerced field. Computed once; see the struct doc comment.
    fn build_canonical(
        level: Level,
        timestamp: i64,
        message: &str,
        source_id: &str,
        payload: &Payload,
    ) -> String {
        let mut parts: Vec<String> = vec![
            level.to_string(),
            timestamp.to_string(),
            message.to_string(),
            source_id.to_string(),
        ];
        match payload {
            Payload::Log(f) => {
                parts.extend(
                    [
                        &f.thread,
                        &f.service_name,
                        &f.service_version,
                        &f.logger,
                        &f.correlation_id,
                        &f.request_id,
                        &f.error_message,
                        &f.stacktrace,
                    ]
                    .into_iter()
                    .filter_map(|o| o.clone()),
                );
            }
            Payload::Bus(f) => {
                parts.push(f.topic.clone());
                parts.extend([&f.key, &f.correlation_id, &f.request_id, &f.composite_event_id]
                    .into_iter()
                    .filter_map(|o| o.clone()));
                parts.push(f.offset.to_string());
                parts.push(f.partition.to_string());
                for (k, v) in &f.headers {
                    parts.push(k.clone());
                    parts.push(v.clone());
                }
            }
        }
        parts.join(" ").to_lowercase()
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// `true` iff every string in `pos` is a (case-insensitive) substring of
    /// the canonical string and no string in `neg` is. An empty `pos` and
    /// `neg` trivially returns `true`.
    pub fn contains(&self, pos: &[String], neg: &[String]) -> bool {
        pos.iter()
            .all(|p| self.canonical.contains(&p.to_lowercase()))
            && neg.iter().all(|n| !self.canonical.contains(&n.to_lowercase()))
    }
}

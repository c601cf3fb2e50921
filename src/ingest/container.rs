//! Container runtime log line parsing.
//!
//! Each line is `<rfc3339-timestamp> <json-or-text-payload>`. The JSON
//! payload, when present, is decoded against a schema that accepts both a
//! flat form (dotted keys like `"log.level"`) and a nested form (`"log":
//! {"level": ...}`), attempting flat first.

use serde_json::Value;

use crate::record::{Level, LogFields, Record};
use crate::telemetry::Logger;

fn field(json: &Value, flat_key: &str, nested_path: &[&str]) -> Option<String> {
    if let Some(v) = json.get(flat_key) {
        return v.as_str().map(|s| s.to_string());
    }
    let mut cur = json;
    for key in nested_path {
        cur = cur.get(key)?;
    }
    cur.as_str().map(|s| s.to_string())
}

fn parse_rfc3339_millis(s: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Parses one log line for `source_id`. Returns `None` when the line should
/// be dropped (unparseable leading timestamp).
pub fn parse_line(source_id: &str, line: &str) -> Option<Record> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (ts_str, rest) = line.split_once(' ').unwrap_or((line, ""));
    let Some(timestamp) = parse_rfc3339_millis(ts_str) else {
        Logger::default().warn(&format!("dropping line from {source_id}: unparseable timestamp {ts_str:?}"));
        return None;
    };

    match serde_json::from_str::<Value>(rest) {
        Ok(json) => {
            let level = field(&json, "log.level", &["log", "level"])
                .map(|s| Level::parse(&s))
                .unwrap_or(Level::Unknown);
            let message = field(&json, "message", &["message"]).unwrap_or_default();
            let fields = LogFields {
                thread: field(&json, "process.thread.name", &["process", "thread", "name"]),
                service_name: field(&json, "service.name", &["service", "name"]),
                service_version: field(&json, "service.version", &["service", "version"]),
                logger: field(&json, "log.logger", &["log", "logger"]),
                correlation_id: field(&json, "correlation.id", &["correlation", "id"]),
                request_id: field(&json, "request.id", &["request", "id"]),
                error_message: field(&json, "error.message", &["error", "message"]),
                stacktrace: field(&json, "error.stack_trace", &["error", "stack_trace"]),
            };
            Some(Record::new_log(0, level, timestamp, message, source_id.to_string(), fields))
        }
        Err(_) => {
            Logger::default().debug(&format!("line from {source_id} is not JSON, falling back to raw text"));
            Some(Record::new_log(
                0,
                Level::Unknown,
                timestamp,
                rest.to_string(),
                source_id.to_string(),
                LogFields {
                    thread: None,
                    service_name: None,
                    service_version: None,
                    logger: None,
                    correlation_id: None,
                    request_id: None,
                    error_message: None,
                    stacktrace: None,
                },
            ))
        }
    }
}

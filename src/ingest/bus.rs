//! Message-bus record construction.
//!
//! Symmetric with the container adapter's flat/nested JSON handling — the
//! same dual-schema lookup is reused here so a correlation/request id
//! embedded in a bus payload is found the same way it would be in a
//! container log line.

use std::collections::HashMap;

use serde_json::Value;

use crate::record::{BusFields, Level, Record};

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

#[allow(clippy::too_many_arguments)]
pub fn build_record(
    source_id: String,
    topic: String,
    key: Option<String>,
    partition: i32,
    offset: i64,
    headers: HashMap<String, String>,
    payload: String,
    timestamp: i64,
) -> Record {
    let parsed = serde_json::from_str::<Value>(&payload).ok();

    let level = parsed
        .as_ref()
        .and_then(|j| field(j, "level", &["level"]))
        .map(|s| Level::parse(&s))
        .unwrap_or(Level::Unknown);

    let correlation_id = parsed.as_ref().and_then(|j| field(j, "correlation.id", &["correlation", "id"]));
    let request_id = parsed.as_ref().and_then(|j| field(j, "request.id", &["request", "id"]));
    let composite_event_id = match (&correlation_id, &request_id) {
        (Some(c), Some(r)) => Some(format!("{c}:{r}")),
        _ => None,
    };

    let fields = BusFields {
        topic,
        key,
        offset,
        partition,
        headers,
        correlation_id,
        request_id,
        composite_event_id,
    };

    Record::new_bus(0, level, timestamp, payload, source_id, fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Payload;

    #[test]
    fn derives_composite_event_id_when_both_ids_present() {
        let r = build_record(
            "orders".into(),
            "orders".into(),
            Some("k1".into()),
            0,
            42,
            HashMap::new(),
            r#"{"correlation.id":"c1","request.id":"r1"}"#.into(),
            1000,
        );
        match r.payload {
            Payload::Bus(f) => assert_eq!(f.composite_event_id.as_deref(), Some("c1:r1")),
            _ => panic!("expected bus payload"),
        }
    }

    #[test]
    fn composite_event_id_absent_when_either_id_missing() {
        let r = build_record(
            "orders".into(),
            "orders".into(),
            None,
            0,
            42,
            HashMap::new(),
            r#"{"correlation.id":"c1"}"#.into(),
            1000,
        );
        match r.payload {
            Payload::Bus(f) => assert_eq!(f.composite_event_id, None),
            _ => panic!("expected bus payload"),
        }
    }

    #[test]
    fn non_json_payload_still_builds_a_record() {
        let r = build_record(
            "orders".into(),
            "orders".into(),
            None,
            1,
            7,
            HashMap::new(),
            "plain text payload".into(),
            1000,
        );
        assert_eq!(r.message, "plain text payload");
        assert_eq!(r.level, Level::Unknown);
    }

    #[test]
    fn carries_topic_partition_offset_headers() {
        let mut headers = HashMap::new();
        headers.insert("trace".into(), "abc".into());
        let r = build_record(
            "orders".into(),
            "orders".into(),
            Some("key1".into()),
            3,
            99,
            headers.clone(),
            "{}".into(),
            1000,
        );
        match r.payload {
            Payload::Bus(f) => {
                assert_eq!(f.topic, "orders");
                assert_eq!(f.partition, 3);
                assert_eq!(f.offset, 99);
                assert_eq!(f.headers, headers);
            }
            _ => panic!("expected bus payload"),
        }
    }
}

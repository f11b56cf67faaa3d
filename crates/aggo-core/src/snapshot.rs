//! JSON document format for persisting a [`RuleTable`](crate::RuleTable)
//! snapshot between runs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use orion_error::StructError;
use serde::{Deserialize, Serialize};

use crate::error::{CoreReason, CoreResult};
use crate::rule::RuleBucket;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDoc {
    version: u32,
    saved_at: DateTime<Utc>,
    buckets: Vec<RuleBucket>,
}

/// Serialize a table snapshot. Buckets are written sorted by rule id so the
/// output is stable.
pub fn encode(buckets: &HashMap<String, RuleBucket>) -> CoreResult<String> {
    let mut list: Vec<RuleBucket> = buckets.values().cloned().collect();
    list.sort_by(|a, b| a.rule.id.cmp(&b.rule.id));
    let doc = SnapshotDoc {
        version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        buckets: list,
    };
    serde_json::to_string_pretty(&doc)
        .map_err(|e| StructError::from(CoreReason::Snapshot).with_detail(e.to_string()))
}

/// Parse a document written by [`encode`] back into the map handed to
/// [`RuleTable::restore`](crate::RuleTable::restore).
pub fn decode(json: &str) -> CoreResult<HashMap<String, RuleBucket>> {
    let doc: SnapshotDoc = serde_json::from_str(json)
        .map_err(|e| StructError::from(CoreReason::Snapshot).with_detail(e.to_string()))?;
    if doc.version != SNAPSHOT_VERSION {
        return Err(StructError::from(CoreReason::Snapshot).with_detail(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            doc.version
        )));
    }
    let mut buckets = HashMap::with_capacity(doc.buckets.len());
    for bucket in doc.buckets {
        bucket.rule.validate()?;
        let id = bucket.rule.id.clone();
        if buckets.insert(id.clone(), bucket).is_some() {
            return Err(StructError::from(CoreReason::Snapshot)
                .with_detail(format!("duplicate rule id {id:?} in snapshot")));
        }
    }
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::rule::Rule;
    use serde_json::json;
    use std::sync::Arc;

    fn sample() -> HashMap<String, RuleBucket> {
        let mut open = RuleBucket::new(Rule::new("r1", ["a", "b"], 50).with_destination("file:///tmp/a"));
        open.events.push(Arc::new(Event::new("a", json!({"n": 1})).with_source("tcp")));
        open.events.push(Arc::new(Event::new("b", json!({"n": 2}))));
        let idle = RuleBucket::new(Rule::new("r2", ["c"], 1_000));
        HashMap::from([("r1".to_string(), open), ("r2".to_string(), idle)])
    }

    #[test]
    fn decode_restores_encoded_buckets() {
        let buckets = sample();
        let json = encode(&buckets).unwrap();
        assert_eq!(decode(&json).unwrap(), buckets);
    }

    #[test]
    fn encode_is_sorted_by_rule_id() {
        let json = encode(&sample()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["version"], 1);
        assert_eq!(doc["buckets"][0]["rule"]["id"], "r1");
        assert_eq!(doc["buckets"][1]["rule"]["id"], "r2");
    }

    #[test]
    fn reject_unknown_version() {
        let json = encode(&sample()).unwrap().replace("\"version\": 1", "\"version\": 9");
        assert!(decode(&json).is_err());
    }

    #[test]
    fn reject_duplicate_ids() {
        let doc = json!({
            "version": 1,
            "saved_at": "2024-01-01T00:00:00Z",
            "buckets": [
                {"rule": {"id": "r1", "event_types": ["a"], "wait_window_ms": 1}},
                {"rule": {"id": "r1", "event_types": ["b"], "wait_window_ms": 1}}
            ]
        });
        assert!(decode(&doc.to_string()).is_err());
    }

    #[test]
    fn reject_garbage() {
        assert!(decode("not json").is_err());
    }
}

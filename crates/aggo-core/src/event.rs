use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A discrete, immutable input to the aggregation engine.
///
/// Once stashed an event is wrapped in an `Arc` and shared by every bucket
/// whose rule matched it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Type tag matched against rule patterns. Never empty.
    pub event_type: String,
    /// Name of the adapter that produced the event (`"site247"`, `"tcp"`, ...).
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            source: String::new(),
            payload,
            time: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_defaults() {
        let ev: Event = serde_json::from_str(r#"{"event_type":"login.fail"}"#).unwrap();
        assert_eq!(ev.event_type, "login.fail");
        assert!(ev.source.is_empty());
        assert!(ev.payload.is_null());
    }

    #[test]
    fn builder_sets_fields() {
        let t = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let ev = Event::new("a", json!({"user": "bob"}))
            .with_source("tcp")
            .at(t);
        assert_eq!(ev.source, "tcp");
        assert_eq!(ev.time, t);
        assert_eq!(ev.payload["user"], "bob");
    }
}

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use orion_error::StructError;
use serde::{Deserialize, Serialize};

use crate::error::{CoreReason, CoreResult};
use crate::event::Event;

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// What to collect and how long to wait before flushing it.
///
/// Rules are immutable once registered; changing one means removing it and
/// adding the replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub event_types: BTreeSet<String>,
    pub wait_window_ms: u64,
    /// Sink descriptor, interpreted by the [`Sink`](crate::sink::Sink).
    #[serde(default)]
    pub destination: String,
}

impl Rule {
    pub fn new<I, S>(id: impl Into<String>, event_types: I, wait_window_ms: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            event_types: event_types.into_iter().map(Into::into).collect(),
            wait_window_ms,
            destination: String::new(),
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn wait_window(&self) -> Duration {
        Duration::from_millis(self.wait_window_ms)
    }

    /// Reject rules that could never match anything.
    pub fn validate(&self) -> CoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(StructError::from(CoreReason::InvalidRule)
                .with_detail("rule id must not be empty".to_string()));
        }
        if self.event_types.is_empty() || self.event_types.iter().any(|p| p.is_empty()) {
            return Err(StructError::from(CoreReason::InvalidRule).with_detail(format!(
                "rule {:?}: event type patterns must be non-empty",
                self.id
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RuleBucket
// ---------------------------------------------------------------------------

/// Accumulation state for one rule: the events of its open window, in
/// arrival order. Empty between windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleBucket {
    pub rule: Rule,
    #[serde(default)]
    pub events: Vec<Arc<Event>>,
}

impl RuleBucket {
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            events: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_are_a_set() {
        let rule = Rule::new("r1", ["b", "a", "b"], 50);
        assert_eq!(rule.event_types.len(), 2);
        assert_eq!(rule.wait_window(), Duration::from_millis(50));
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_id_and_patterns() {
        assert!(Rule::new("", ["a"], 1).validate().is_err());
        assert!(Rule::new("r", Vec::<String>::new(), 1).validate().is_err());
        assert!(Rule::new("r", [""], 1).validate().is_err());
    }

    #[test]
    fn bucket_starts_empty() {
        let bucket = RuleBucket::new(Rule::new("r1", ["a"], 0).with_destination("file:///tmp/x"));
        assert!(bucket.events.is_empty());
        assert_eq!(bucket.rule.destination, "file:///tmp/x");
    }
}

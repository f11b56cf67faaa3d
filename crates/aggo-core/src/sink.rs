use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::Event;
use crate::rule::Rule;

/// Delivery target for flushed windows.
///
/// `post` runs without the rule table lock held and may be slow. An error is
/// logged together with the batch and the batch is dropped; retrying, if
/// wanted, is the implementation's business.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn post(&self, rule: &Rule, events: &[Arc<Event>]) -> anyhow::Result<()>;
}

/// Wire shape of one flushed window, shared by the built-in sinks and the
/// delivery-failure log.
#[derive(Debug, Serialize)]
pub struct FlushedWindow<'a> {
    pub rule: &'a Rule,
    pub event_count: usize,
    pub events: &'a [Arc<Event>],
    pub flushed_at: DateTime<Utc>,
}

impl<'a> FlushedWindow<'a> {
    pub fn new(rule: &'a Rule, events: &'a [Arc<Event>]) -> Self {
        Self {
            rule,
            event_count: events.len(),
            events,
            flushed_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

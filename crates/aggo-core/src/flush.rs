use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;

use crate::event::Event;
use crate::rule::Rule;
use crate::sink::{FlushedWindow, Sink};
use crate::table::RuleTable;

/// How a closed window's post went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Delivered,
    Failed,
}

/// Published once per closed window, after the sink returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClosed {
    pub rule_id: String,
    pub generation: u64,
    pub events: usize,
    pub outcome: FlushOutcome,
}

/// Events taken out of a bucket under the table lock, ready to post.
#[derive(Debug)]
pub(crate) struct DetachedWindow {
    pub rule: Rule,
    pub generation: u64,
    pub events: Vec<Arc<Event>>,
}

/// Detaches a window's events under the lock and posts them outside it.
pub(crate) struct FlushCoordinator {
    sink: Arc<dyn Sink>,
    notices: broadcast::Sender<WindowClosed>,
    /// One token per timer flush between detach and notice.
    in_flight: TaskTracker,
}

impl FlushCoordinator {
    pub fn new(sink: Arc<dyn Sink>, notice_capacity: usize) -> Self {
        let (notices, _) = broadcast::channel(notice_capacity.max(1));
        Self {
            sink,
            notices,
            in_flight: TaskTracker::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WindowClosed> {
        self.notices.subscribe()
    }

    /// Timer entry point. A window whose rule was removed (or replaced) in
    /// the meantime is dropped without a notice.
    pub async fn flush(&self, table: &RuleTable, rule_id: &str, generation: u64) {
        // Taken before detach so `settle` never misses a detached window.
        let _in_flight = self.in_flight.token();
        let Some(window) = table.detach(rule_id, generation) else {
            ag_info!(pipe, rule = rule_id, generation, "window fired for removed rule, nothing to flush");
            return;
        };
        self.deliver(window).await;
    }

    /// Wait until every window a timer has detached is posted and notified.
    pub async fn settle(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }

    /// Post a detached window and publish its notice.
    pub async fn deliver(&self, window: DetachedWindow) {
        let DetachedWindow {
            rule,
            generation,
            events,
        } = window;

        let outcome = match self.sink.post(&rule, &events).await {
            Ok(()) => {
                ag_debug!(pipe, rule = %rule.id, events = events.len(), "window flushed");
                FlushOutcome::Delivered
            }
            Err(e) => {
                let payload = FlushedWindow::new(&rule, &events)
                    .to_json()
                    .unwrap_or_else(|se| format!("<unserializable: {se}>"));
                ag_error!(
                    pipe,
                    rule = %rule.id,
                    destination = %rule.destination,
                    error = %e,
                    payload = %payload,
                    "post of flushed window failed, dropping it"
                );
                FlushOutcome::Failed
            }
        };

        // No subscribers is not an error.
        let _ = self.notices.send(WindowClosed {
            rule_id: rule.id,
            generation,
            events: events.len(),
            outcome,
        });
    }
}

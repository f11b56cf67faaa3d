use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::Instrument;

use crate::table::RuleTable;

/// Bookkeeping for one pending window timer, stored in the table next to (not
/// inside) the bucket it will flush.
#[derive(Debug)]
pub(crate) struct OpenWindow {
    pub generation: u64,
    pub abort: AbortHandle,
}

/// Spawns one timer task per opened window.
///
/// A timer carries only the rule id, the window generation and a weak handle
/// to the table. When it fires it re-resolves all three, so a removed rule, a
/// re-added rule with the same id, or a dropped table all turn into a no-op
/// instead of a stale reference.
pub(crate) struct WindowScheduler {
    handle: Handle,
}

impl WindowScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Start the timer for `(rule_id, generation)`. Safe to call from any
    /// thread, including with the table lock held.
    pub fn open(
        &self,
        table: Weak<RuleTable>,
        rule_id: String,
        generation: u64,
        wait: Duration,
    ) -> OpenWindow {
        ag_trace!(pipe, rule = %rule_id, generation, wait_ms = wait.as_millis() as u64, "window opened");
        let span = tracing::debug_span!("window", rule = %rule_id, generation);
        let task = self.handle.spawn(
            async move {
                tokio::time::sleep(wait).await;
                let Some(table) = table.upgrade() else {
                    ag_debug!(res, "rule table dropped before window closed");
                    return;
                };
                table.flusher().flush(&table, &rule_id, generation).await;
            }
            .instrument(span),
        );
        OpenWindow {
            generation,
            abort: task.abort_handle(),
        }
    }
}

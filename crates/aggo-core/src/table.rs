use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use orion_error::StructError;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::error::{CoreReason, CoreResult};
use crate::event::Event;
use crate::flush::{DetachedWindow, FlushCoordinator, WindowClosed};
use crate::matcher::Matcher;
use crate::rule::{Rule, RuleBucket};
use crate::sink::Sink;
use crate::window::{OpenWindow, WindowScheduler};


// ---------------------------------------------------------------------------
// TableState
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TableState {
    buckets: HashMap<String, RuleBucket>,
    /// rule id → pending timer. Non-empty bucket ⇔ entry present.
    windows: HashMap<String, OpenWindow>,
    next_generation: u64,
}

impl TableState {
    fn open_window(&mut self, table: &RuleTable, rule_id: &str) {
        let Some(bucket) = self.buckets.get(rule_id) else {
            return;
        };
        self.next_generation += 1;
        let window = table.scheduler.open(
            table.this.clone(),
            rule_id.to_string(),
            self.next_generation,
            bucket.rule.wait_window(),
        );
        self.windows.insert(rule_id.to_string(), window);
    }
}

// ---------------------------------------------------------------------------
// RuleTable
// ---------------------------------------------------------------------------

/// The authoritative rule id → bucket map.
///
/// Every read or write of a bucket happens under one mutex, held only for map
/// lookups, appends and detach-and-clear. Sink posts run after the lock is
/// released, so a slow destination never stalls other rules.
///
/// The table is created once per process (or per test) and handed to its
/// collaborators as an `Arc`; window timers only hold a `Weak` to it.
pub struct RuleTable {
    state: Mutex<TableState>,
    matcher: Arc<dyn Matcher>,
    scheduler: WindowScheduler,
    flusher: FlushCoordinator,
    this: Weak<RuleTable>,
}

impl RuleTable {
    /// Build a table whose window timers run on the current tokio runtime.
    pub fn new(
        matcher: Arc<dyn Matcher>,
        sink: Arc<dyn Sink>,
        notice_capacity: usize,
    ) -> CoreResult<Arc<Self>> {
        let handle = Handle::try_current().map_err(|e| {
            StructError::from(CoreReason::Runtime).with_detail(format!("rule table: {e}"))
        })?;
        Ok(Self::with_handle(handle, matcher, sink, notice_capacity))
    }

    /// Build a table whose window timers run on `handle`.
    pub fn with_handle(
        handle: Handle,
        matcher: Arc<dyn Matcher>,
        sink: Arc<dyn Sink>,
        notice_capacity: usize,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            state: Mutex::new(TableState::default()),
            matcher,
            scheduler: WindowScheduler::new(handle),
            flusher: FlushCoordinator::new(sink, notice_capacity),
            this: this.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn flusher(&self) -> &FlushCoordinator {
        &self.flusher
    }

    // -- administration -----------------------------------------------------

    /// Register `rule` with an empty bucket. Returns `false` if the id is
    /// already taken; the existing bucket is left untouched.
    pub fn add_rule(&self, rule: Rule) -> bool {
        let mut state = self.lock();
        if state.buckets.contains_key(&rule.id) {
            ag_debug!(conf, rule = %rule.id, "duplicate rule id rejected");
            return false;
        }
        ag_debug!(conf, rule = %rule.id, wait_ms = rule.wait_window_ms, "rule added");
        state.buckets.insert(rule.id.clone(), RuleBucket::new(rule));
        true
    }

    /// Remove a rule and its bucket. A timer already pending for it is not
    /// cancelled; it finds nothing when it fires.
    pub fn remove_rule(&self, id: &str) -> bool {
        let mut state = self.lock();
        let Some(bucket) = state.buckets.remove(id) else {
            return false;
        };
        state.windows.remove(id);
        ag_debug!(conf, rule = id, dropped_events = bucket.events.len(), "rule removed");
        true
    }

    pub fn get_rule(&self, id: &str) -> Option<Rule> {
        self.lock().buckets.get(id).map(|b| b.rule.clone())
    }

    /// All registered rules, in no particular order.
    pub fn list_rules(&self) -> Vec<Rule> {
        self.lock().buckets.values().map(|b| b.rule.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buckets.is_empty()
    }

    // -- ingest -------------------------------------------------------------

    /// Append `event` to every bucket whose rule matches its type, opening a
    /// window for each bucket that has none.
    ///
    /// The window check and the timer start happen under the same lock, so
    /// racing producers can never open two windows for one rule.
    pub fn stash(&self, event: Event) {
        self.stash_shared(Arc::new(event));
    }

    pub fn stash_shared(&self, event: Arc<Event>) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut opened = Vec::new();
        for (id, bucket) in state.buckets.iter_mut() {
            if !self.rule_matches(&bucket.rule, &event.event_type) {
                continue;
            }
            bucket.events.push(Arc::clone(&event));
            // Keyed on the window index, not on the bucket having been empty,
            // so events kept by `suspend_and_snapshot` get a window again.
            if !state.windows.contains_key(id) {
                opened.push(id.clone());
            }
        }
        for id in opened {
            state.open_window(self, &id);
        }
    }

    /// A rule matches if one of its patterns does. If the matcher fails on
    /// any pattern the rule is skipped, whatever the others say.
    fn rule_matches(&self, rule: &Rule, event_type: &str) -> bool {
        let mut matched = false;
        for pattern in &rule.event_types {
            match self.matcher.matches(event_type, pattern) {
                Ok(hit) => matched |= hit,
                Err(e) => {
                    ag_warn!(pipe, rule = %rule.id, pattern = %pattern, event_type, error = %e, "matcher failed, event skips rule");
                    return false;
                }
            }
        }
        matched
    }

    // -- windows ------------------------------------------------------------

    /// Subscribe to window-closed notices. Only notices published after the
    /// call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<WindowClosed> {
        self.flusher.subscribe()
    }

    pub fn is_window_open(&self, id: &str) -> bool {
        self.lock().windows.contains_key(id)
    }

    pub fn open_windows(&self) -> usize {
        self.lock().windows.len()
    }

    /// Take the events of window `(rule_id, generation)` and close it. `None`
    /// if the rule is gone or the window was superseded.
    pub(crate) fn detach(&self, rule_id: &str, generation: u64) -> Option<DetachedWindow> {
        let mut state = self.lock();
        match state.windows.get(rule_id) {
            Some(w) if w.generation == generation => {}
            _ => return None,
        }
        state.windows.remove(rule_id);
        let bucket = state.buckets.get_mut(rule_id)?;
        Some(DetachedWindow {
            rule: bucket.rule.clone(),
            generation,
            events: std::mem::take(&mut bucket.events),
        })
    }

    /// Close every open window now: cancel the timers and post the pending
    /// events. Windows a timer already detached are left to it, but `drain`
    /// returns only once those posts are done too. Returns the number of
    /// windows posted here. Ingest should have stopped.
    pub async fn drain(&self) -> usize {
        let windows: Vec<DetachedWindow> = {
            let mut state = self.lock();
            let open = std::mem::take(&mut state.windows);
            open.into_iter()
                .filter_map(|(id, window)| {
                    window.abort.abort();
                    let bucket = state.buckets.get_mut(&id)?;
                    Some(DetachedWindow {
                        rule: bucket.rule.clone(),
                        generation: window.generation,
                        events: std::mem::take(&mut bucket.events),
                    })
                })
                .collect()
        };
        let count = windows.len();
        for window in windows {
            self.flusher.deliver(window).await;
        }
        self.flusher.settle().await;
        count
    }

    /// Wait for posts of windows whose timer already fired.
    pub async fn settle(&self) {
        self.flusher.settle().await;
    }

    /// Cancel every pending timer and copy the table with the events of the
    /// open windows still in their buckets. A later matching stash opens a
    /// fresh window for such a bucket, carrying the kept events along.
    pub fn suspend_and_snapshot(&self) -> HashMap<String, RuleBucket> {
        let mut state = self.lock();
        let suspended = state.windows.len();
        for (_, window) in state.windows.drain() {
            window.abort.abort();
        }
        ag_debug!(res, suspended, "open windows suspended");
        state.buckets.clone()
    }

    // -- persistence handoff ------------------------------------------------

    /// Shallow copy of the whole table. Events are shared, not cloned.
    pub fn snapshot(&self) -> HashMap<String, RuleBucket> {
        self.lock().buckets.clone()
    }

    /// Replace the whole table. Pending timers are cancelled and every
    /// non-empty restored bucket gets a fresh window of its rule's full wait.
    /// Must not race live traffic.
    pub fn restore(&self, buckets: HashMap<String, RuleBucket>) {
        let mut state = self.lock();
        for (_, window) in state.windows.drain() {
            window.abort.abort();
        }
        state.buckets = buckets;
        let pending: Vec<String> = state
            .buckets
            .iter()
            .filter(|(_, b)| !b.events.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &pending {
            state.open_window(self, id);
        }
        ag_info!(res, rules = state.buckets.len(), reopened = pending.len(), "rule table restored");
    }
}

impl Drop for RuleTable {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, window) in state.windows.drain() {
            window.abort.abort();
        }
    }
}

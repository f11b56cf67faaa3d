use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aggo_config::{AggoConfig, MatcherKind, RuleDef, load_rule_defs};
use aggo_core::{ExactMatcher, GlobMatcher, Matcher, RegexMatcher, Rule, RuleBucket, RuleTable};
use orion_error::compat_prelude::*;
use orion_error::prelude::*;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::persist::load_snapshot;
use crate::sink::DestinationSink;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Load and validate every rule matched by `[runtime] rules`.
///
/// A rule without a destination is only accepted when a default destination
/// is configured.
pub fn load_rules(config: &AggoConfig, base_dir: &Path) -> RuntimeResult<Vec<Rule>> {
    let defs = load_rule_defs(&config.runtime.rules, base_dir).owe_conf()?;
    if defs.is_empty() {
        ag_warn!(conf, pattern = %config.runtime.rules, "no rules loaded");
    }
    let has_default = config.runtime.default_destination.is_some();
    defs.into_iter()
        .map(|def| {
            let rule = rule_from_def(def)?;
            if rule.destination.is_empty() && !has_default {
                return Err(StructError::from(RuntimeReason::Bootstrap).with_detail(format!(
                    "rule {:?} has no destination and [runtime] default_destination is not set",
                    rule.id
                )));
            }
            Ok(rule)
        })
        .collect()
}

fn rule_from_def(def: RuleDef) -> RuntimeResult<Rule> {
    let wait_ms = def.resolved_wait_ms().owe_conf()?;
    let rule = Rule::new(def.id, def.event_types, wait_ms)
        .with_destination(def.destination.unwrap_or_default());
    rule.validate().err_conv()?;
    Ok(rule)
}

fn build_matcher(kind: MatcherKind) -> Arc<dyn Matcher> {
    match kind {
        MatcherKind::Exact => Arc::new(ExactMatcher),
        MatcherKind::Glob => Arc::new(GlobMatcher),
        MatcherKind::Regex => Arc::new(RegexMatcher::new()),
    }
}

pub(super) fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Build the sink and the rule table, then seed it with the configured rules
/// and, if present, the events of a previous run's snapshot.
pub(super) fn build_table(
    config: &AggoConfig,
    base_dir: &Path,
    snapshot: Option<&Path>,
) -> RuntimeResult<Arc<RuleTable>> {
    let rules = load_rules(config, base_dir)?;

    let sink = DestinationSink::new(
        base_dir,
        config.runtime.default_destination.clone(),
        config.sink.http_timeout.as_duration(),
    )
    .owe(RuntimeReason::Bootstrap)?;

    let table = RuleTable::new(
        build_matcher(config.runtime.matcher),
        Arc::new(sink),
        config.runtime.notice_capacity,
    )
    .err_conv()?;

    let saved = match snapshot {
        Some(path) => load_snapshot(path)?,
        None => None,
    };
    match saved {
        Some(saved) => table.restore(merge_snapshot(rules, saved)),
        None => {
            for rule in rules {
                table.add_rule(rule);
            }
        }
    }
    Ok(table)
}

/// Configured rules win over saved ones; a saved bucket only contributes its
/// pending events, and only if its rule id is still configured.
fn merge_snapshot(
    rules: Vec<Rule>,
    mut saved: HashMap<String, RuleBucket>,
) -> HashMap<String, RuleBucket> {
    let mut buckets = HashMap::with_capacity(rules.len());
    for rule in rules {
        let mut bucket = RuleBucket::new(rule);
        if let Some(old) = saved.remove(&bucket.rule.id) {
            if old.rule != bucket.rule {
                ag_info!(conf, rule = %bucket.rule.id, "rule changed since snapshot, keeping its pending events");
            }
            bucket.events = old.events;
        }
        buckets.insert(bucket.rule.id.clone(), bucket);
    }
    for (id, orphan) in saved {
        if !orphan.events.is_empty() {
            ag_warn!(conf, rule = %id, dropped_events = orphan.events.len(), "snapshot rule no longer configured, dropping its events");
        }
    }
    buckets
}

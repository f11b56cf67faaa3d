use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use orion_error::StructError;
use regex::Regex;
use wildmatch::WildMatch;

use crate::error::{CoreReason, CoreResult};

/// Decides whether an event type satisfies one rule pattern.
///
/// Implementations are called with the rule table locked, so they must be
/// cheap and must not call back into the table. An `Err` makes the event skip
/// that rule; it never aborts the stash.
pub trait Matcher: Send + Sync {
    fn matches(&self, event_type: &str, pattern: &str) -> CoreResult<bool>;
}

/// Byte-for-byte equality. The default strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactMatcher;

impl Matcher for ExactMatcher {
    fn matches(&self, event_type: &str, pattern: &str) -> CoreResult<bool> {
        Ok(event_type == pattern)
    }
}

/// Shell-style wildcards: `*` matches any run, `?` one character.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobMatcher;

impl Matcher for GlobMatcher {
    fn matches(&self, event_type: &str, pattern: &str) -> CoreResult<bool> {
        Ok(WildMatch::new(pattern).matches(event_type))
    }
}

/// Anchored regular expressions. Compiled patterns are cached; a pattern that
/// fails to compile is reported on every call.
#[derive(Debug, Default)]
pub struct RegexMatcher {
    cache: Mutex<HashMap<String, Regex>>,
}

impl RegexMatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Matcher for RegexMatcher {
    fn matches(&self, event_type: &str, pattern: &str) -> CoreResult<bool> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(re) = cache.get(pattern) {
            return Ok(re.is_match(event_type));
        }
        let re = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            StructError::from(CoreReason::Matcher)
                .with_detail(format!("invalid pattern {pattern:?}: {e}"))
        })?;
        let hit = re.is_match(event_type);
        cache.insert(pattern.to_string(), re);
        Ok(hit)
    }
}

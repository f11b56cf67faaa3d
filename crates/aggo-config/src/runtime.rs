use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Rule file glob (`*.toml`), resolved against the config directory.
    pub rules: String,
    /// Event-type matching strategy.
    #[serde(default)]
    pub matcher: MatcherKind,
    /// Capacity of the window-closed notification channel.
    #[serde(default = "default_notice_capacity")]
    pub notice_capacity: usize,
    /// Destination used by rules that do not name one.
    #[serde(default)]
    pub default_destination: Option<String>,
}

fn default_notice_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    #[default]
    Exact,
    Glob,
    Regex,
}

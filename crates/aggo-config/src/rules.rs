use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::sink::parse_sink_uri;
use crate::types::HumanDuration;

// ---------------------------------------------------------------------------
// RuleDef
// ---------------------------------------------------------------------------

/// A rule as written in a rule file.
///
/// ```toml
/// [[rule]]
/// id = "login_failures"
/// event_types = ["login.fail", "login.locked"]
/// wait_window = "30s"
/// destination = "https://hooks.example.com/security"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDef {
    pub id: String,
    pub event_types: Vec<String>,
    #[serde(default)]
    pub wait_window: Option<HumanDuration>,
    #[serde(default)]
    pub wait_window_ms: Option<u64>,
    #[serde(default)]
    pub destination: Option<String>,
}

impl RuleDef {
    /// The wait window in milliseconds; exactly one of `wait_window` /
    /// `wait_window_ms` must be set.
    pub fn resolved_wait_ms(&self) -> anyhow::Result<u64> {
        match (self.wait_window, self.wait_window_ms) {
            (Some(d), None) => Ok(d.as_millis()),
            (None, Some(ms)) => Ok(ms),
            (Some(_), Some(_)) => anyhow::bail!(
                "rule {:?}: set either wait_window or wait_window_ms, not both",
                self.id
            ),
            (None, None) => anyhow::bail!(
                "rule {:?}: missing wait_window (or wait_window_ms)",
                self.id
            ),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("rule id must not be empty");
        }
        if self.event_types.is_empty() {
            anyhow::bail!("rule {:?}: event_types must not be empty", self.id);
        }
        if self.event_types.iter().any(|t| t.is_empty()) {
            anyhow::bail!("rule {:?}: event_types contains an empty pattern", self.id);
        }
        self.resolved_wait_ms()?;
        if let Some(dest) = &self.destination {
            parse_sink_uri(dest).map_err(|e| anyhow::anyhow!("rule {:?}: {e}", self.id))?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rule: Vec<RuleDef>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Expand `pattern` relative to `base_dir` and return the matching files in
/// sorted order.
pub fn resolve_glob(pattern: &str, base_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let full = if Path::new(pattern).is_relative() {
        base_dir.join(pattern)
    } else {
        PathBuf::from(pattern)
    };
    let full = full.to_string_lossy().into_owned();
    let mut paths = Vec::new();
    for entry in glob::glob(&full).map_err(|e| anyhow::anyhow!("bad glob {full:?}: {e}"))? {
        paths.push(entry?);
    }
    paths.sort();
    Ok(paths)
}

/// Parse rule definitions from a TOML string.
pub fn parse_rule_defs(toml_str: &str) -> anyhow::Result<Vec<RuleDef>> {
    let file: RuleFile = toml::from_str(toml_str)?;
    for def in &file.rule {
        def.validate()?;
    }
    Ok(file.rule)
}

/// Load every rule file matched by `pattern`. Rule ids must be unique across
/// all files.
pub fn load_rule_defs(pattern: &str, base_dir: &Path) -> anyhow::Result<Vec<RuleDef>> {
    let mut defs = Vec::new();
    let mut seen = HashSet::new();
    for path in resolve_glob(pattern, base_dir)? {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        let parsed = parse_rule_defs(&content)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        for def in parsed {
            if !seen.insert(def.id.clone()) {
                anyhow::bail!("{}: duplicate rule id {:?}", path.display(), def.id);
            }
            defs.push(def);
        }
    }
    Ok(defs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

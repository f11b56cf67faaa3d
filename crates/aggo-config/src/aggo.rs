use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::logging::LoggingConfig;
use crate::persist::PersistConfig;
use crate::runtime::RuntimeConfig;
use crate::server::ServerConfig;
use crate::sink::SinkConfig;
use crate::validate;

// ---------------------------------------------------------------------------
// AggoConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AggoConfig {
    pub server: ServerConfig,
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub persist: PersistConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AggoConfig {
    /// Read and parse an `aggo.toml` file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for AggoConfig {
    type Err = anyhow::Error;

    /// Parse a TOML string into a validated [`AggoConfig`].
    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let config: AggoConfig = toml::from_str(toml_str)?;
        validate::validate(&config)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use crate::runtime::MatcherKind;
    use std::time::Duration;

    const FULL_TOML: &str = r#"
[server]
listen = "tcp://127.0.0.1:9900"

[runtime]
rules = "rules/*.toml"
matcher = "glob"
notice_capacity = 256
default_destination = "file://out/windows.jsonl"

[sink]
http_timeout = "5s"

[persist]
snapshot = "state/snapshot.json"

[logging]
level = "debug"
format = "json"
"#;

    #[test]
    fn load_full_toml() {
        let cfg: AggoConfig = FULL_TOML.parse().unwrap();

        assert_eq!(cfg.server.listen, "tcp://127.0.0.1:9900");
        assert_eq!(cfg.runtime.rules, "rules/*.toml");
        assert_eq!(cfg.runtime.matcher, MatcherKind::Glob);
        assert_eq!(cfg.runtime.notice_capacity, 256);
        assert_eq!(
            cfg.runtime.default_destination.as_deref(),
            Some("file://out/windows.jsonl")
        );
        assert_eq!(cfg.sink.http_timeout.as_duration(), Duration::from_secs(5));
        assert_eq!(
            cfg.persist.snapshot.as_deref(),
            Some(Path::new("state/snapshot.json"))
        );
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn defaults_for_optional_sections() {
        let toml = r#"
[server]
listen = "tcp://127.0.0.1:0"

[runtime]
rules = "*.toml"
"#;
        let cfg: AggoConfig = toml.parse().unwrap();
        assert_eq!(cfg.runtime.matcher, MatcherKind::Exact);
        assert_eq!(cfg.runtime.notice_capacity, 1024);
        assert!(cfg.runtime.default_destination.is_none());
        assert_eq!(cfg.sink.http_timeout.as_duration(), Duration::from_secs(10));
        assert!(cfg.persist.snapshot.is_none());
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, LogFormat::Plain);
    }

    #[test]
    fn missing_server_fails() {
        let toml = r#"
[runtime]
rules = "*.toml"
"#;
        assert!(toml.parse::<AggoConfig>().is_err());
    }

    #[test]
    fn unknown_matcher_fails() {
        let toml = FULL_TOML.replace("matcher = \"glob\"", "matcher = \"fuzzy\"");
        assert!(toml.parse::<AggoConfig>().is_err());
    }
}

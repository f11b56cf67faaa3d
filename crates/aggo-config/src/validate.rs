use crate::aggo::AggoConfig;

/// Internal validation, called automatically during `AggoConfig::from_str` / `load`.
pub(crate) fn validate(config: &AggoConfig) -> anyhow::Result<()> {
    // server.listen must start with tcp://
    if !config.server.listen.starts_with("tcp://") {
        anyhow::bail!(
            "server.listen must start with \"tcp://\", got {:?}",
            config.server.listen,
        );
    }

    if config.runtime.rules.trim().is_empty() {
        anyhow::bail!("runtime.rules must name a rule file glob");
    }

    // broadcast::channel panics on zero capacity
    if config.runtime.notice_capacity == 0 {
        anyhow::bail!("runtime.notice_capacity must be > 0");
    }

    if let Some(dest) = &config.runtime.default_destination {
        crate::sink::parse_sink_uri(dest)
            .map_err(|e| anyhow::anyhow!("runtime.default_destination: {e}"))?;
    }

    if config.sink.http_timeout.as_millis() == 0 {
        anyhow::bail!("sink.http_timeout must be > 0");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::HumanDuration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Request timeout for `http://` / `https://` destinations.
    pub http_timeout: HumanDuration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            http_timeout: std::time::Duration::from_secs(10).into(),
        }
    }
}

/// A parsed rule destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkUri {
    /// Append flushed windows as JSON lines to a file.
    File { path: PathBuf },
    /// POST flushed windows as JSON to a webhook.
    Http { url: String },
}

/// Parse a destination string such as `"file:///var/log/aggo.jsonl"` or
/// `"https://hooks.example.com/aggo"`.
pub fn parse_sink_uri(uri: &str) -> anyhow::Result<SinkUri> {
    let uri = uri.trim();
    if let Some(path) = uri.strip_prefix("file://") {
        if path.is_empty() {
            anyhow::bail!("file sink URI has an empty path: {uri:?}");
        }
        return Ok(SinkUri::File {
            path: PathBuf::from(path),
        });
    }
    if let Some(rest) = uri
        .strip_prefix("http://")
        .or_else(|| uri.strip_prefix("https://"))
    {
        if rest.is_empty() {
            anyhow::bail!("http sink URI has no host: {uri:?}");
        }
        return Ok(SinkUri::Http {
            url: uri.to_string(),
        });
    }
    anyhow::bail!("unsupported sink URI {uri:?} (expected file://, http:// or https://)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_file_uri() {
        let uri = parse_sink_uri("file:///tmp/out.jsonl").unwrap();
        assert_eq!(
            uri,
            SinkUri::File {
                path: PathBuf::from("/tmp/out.jsonl")
            }
        );
    }

    #[test]
    fn parse_relative_file_uri() {
        let uri = parse_sink_uri("file://out/windows.jsonl").unwrap();
        assert_eq!(
            uri,
            SinkUri::File {
                path: PathBuf::from("out/windows.jsonl")
            }
        );
    }

    #[test]
    fn parse_http_uris() {
        assert_eq!(
            parse_sink_uri("https://hooks.example.com/a").unwrap(),
            SinkUri::Http {
                url: "https://hooks.example.com/a".into()
            }
        );
        assert!(matches!(
            parse_sink_uri("http://127.0.0.1:8080").unwrap(),
            SinkUri::Http { .. }
        ));
    }

    #[test]
    fn reject_bad_uris() {
        assert!(parse_sink_uri("file://").is_err());
        assert!(parse_sink_uri("https://").is_err());
        let err = parse_sink_uri("kafka://broker").unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }
}

//! Built-in delivery targets and the router that picks one per rule.

mod file;
mod webhook;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use aggo_config::{SinkUri, parse_sink_uri};
use aggo_core::{Event, Rule, Sink};
use async_trait::async_trait;

pub use file::FileSink;
pub use webhook::WebhookSink;

// ---------------------------------------------------------------------------
// DestinationSink
// ---------------------------------------------------------------------------

/// Routes each flushed window by its rule's `destination` URI.
///
/// Rules without a destination fall back to the configured default. Concrete
/// sinks are built on first use and cached per destination string, so rules
/// sharing a file share its writer. Relative `file://` paths resolve against
/// `base_dir`.
pub struct DestinationSink {
    base_dir: PathBuf,
    default_destination: Option<String>,
    client: reqwest::Client,
    cache: Mutex<HashMap<String, Arc<dyn Sink>>>,
}

impl DestinationSink {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        default_destination: Option<String>,
        http_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            base_dir: base_dir.into(),
            default_destination,
            client,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn resolve<'a>(&'a self, rule: &'a Rule) -> anyhow::Result<&'a str> {
        if !rule.destination.is_empty() {
            return Ok(&rule.destination);
        }
        self.default_destination
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("rule {:?} has no destination and no default is configured", rule.id))
    }

    fn sink_for(&self, destination: &str) -> anyhow::Result<Arc<dyn Sink>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = cache.get(destination) {
            return Ok(Arc::clone(sink));
        }
        let sink: Arc<dyn Sink> = match parse_sink_uri(destination)? {
            SinkUri::File { path } => Arc::new(FileSink::new(resolve_path(&self.base_dir, &path))),
            SinkUri::Http { url } => Arc::new(WebhookSink::new(url, self.client.clone())),
        };
        ag_debug!(res, destination, "sink created");
        cache.insert(destination.to_string(), Arc::clone(&sink));
        Ok(sink)
    }

    /// Number of distinct destinations built so far.
    pub fn cached(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Sink for DestinationSink {
    async fn post(&self, rule: &Rule, events: &[Arc<Event>]) -> anyhow::Result<()> {
        let destination = self.resolve(rule)?;
        let sink = self.sink_for(destination)?;
        sink.post(rule, events).await
    }
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sink(dir: &Path, default: Option<&str>) -> DestinationSink {
        DestinationSink::new(dir, default.map(str::to_string), Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn routes_relative_file_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path(), None);
        let a = Rule::new("a", ["x"], 1).with_destination("file://out/a.jsonl");
        let b = Rule::new("b", ["x"], 1).with_destination("file://out/a.jsonl");
        let ev = [Arc::new(Event::new("x", json!(null)))];

        sink.post(&a, &ev).await.unwrap();
        sink.post(&b, &ev).await.unwrap();

        assert_eq!(sink.cached(), 1);
        let content = std::fs::read_to_string(dir.path().join("out/a.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn falls_back_to_default_destination() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path(), Some("file://default.jsonl"));
        let rule = Rule::new("a", ["x"], 1);

        sink.post(&rule, &[]).await.unwrap();
        assert!(dir.path().join("default.jsonl").exists());
    }

    #[tokio::test]
    async fn missing_destination_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path(), None);
        let err = sink.post(&Rule::new("a", ["x"], 1), &[]).await.unwrap_err();
        assert!(err.to_string().contains("no destination"), "{err}");
    }

    #[tokio::test]
    async fn bad_destination_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path(), None);
        let rule = Rule::new("a", ["x"], 1).with_destination("smtp://mail");
        assert!(sink.post(&rule, &[]).await.is_err());
        assert_eq!(sink.cached(), 0);
    }
}

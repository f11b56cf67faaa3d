use std::sync::Arc;

use aggo_core::{Event, FlushedWindow, Rule, Sink};
use async_trait::async_trait;

/// POSTs each flushed window as a JSON body. Any non-2xx answer counts as a
/// failed delivery.
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl Sink for WebhookSink {
    async fn post(&self, rule: &Rule, events: &[Arc<Event>]) -> anyhow::Result<()> {
        let body = FlushedWindow::new(rule, events);
        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} answered HTTP {status}: {text}", self.url);
        }
        ag_trace!(pipe, rule = %rule.id, url = %self.url, status = status.as_u16(), "webhook delivered");
        Ok(())
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aggo_core::{Event, FlushedWindow, Rule, Sink};
use anyhow::Context;
use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

/// Appends one JSON line per flushed window to a file.
///
/// The file (and its parent directory) is created on the first post, so a
/// destination that never fires leaves nothing behind.
pub struct FileSink {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> anyhow::Result<BufWriter<File>> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        Ok(BufWriter::new(file))
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn post(&self, rule: &Rule, events: &[Arc<Event>]) -> anyhow::Result<()> {
        let mut line = FlushedWindow::new(rule, events).to_json()?;
        line.push('\n');

        let mut guard = self.writer.lock().await;
        if guard.is_none() {
            *guard = Some(self.open().await?);
        }
        let Some(writer) = guard.as_mut() else {
            anyhow::bail!("file sink {} not open", self.path.display());
        };
        if let Err(e) = write_line(writer, &line).await {
            // Reopen on the next post.
            *guard = None;
            return Err(e).with_context(|| format!("write to {}", self.path.display()));
        }
        Ok(())
    }
}

async fn write_line(writer: &mut BufWriter<File>, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

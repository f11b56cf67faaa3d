use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use aggo_core::{RuleTable, SourceRecord};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// TCP receiver for newline-delimited JSON.
///
/// Every line is one [`SourceRecord`]: a plain event or a wrapped adapter
/// payload. Decoded events are stashed straight into the [`RuleTable`];
/// malformed lines are logged and skipped without closing the connection.
pub struct Receiver {
    listener: TcpListener,
    table: Arc<RuleTable>,
    cancel: CancellationToken,
}

impl Receiver {
    /// Parse `"tcp://host:port"` and bind a TCP listener.
    pub async fn bind(listen: &str, table: Arc<RuleTable>) -> io::Result<Self> {
        let addr = listen.strip_prefix("tcp://").unwrap_or(listen);
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            table,
            cancel: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Accept until cancelled, then wait for open connections to stop, so
    /// that every line read before the cancel has been stashed on return.
    #[tracing::instrument(name = "receiver", skip_all)]
    pub async fn run(self) -> anyhow::Result<()> {
        let connections = TaskTracker::new();
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = result?;
                    ag_debug!(conn, peer = %peer, "accepted connection");
                    connections.spawn(handle_connection(
                        stream,
                        Arc::clone(&self.table),
                        self.cancel.child_token(),
                        peer,
                    ));
                }
                _ = self.cancel.cancelled() => break,
            }
        }
        connections.close();
        connections.wait().await;
        Ok(())
    }
}

/// Longest accepted line. Longer lines are dropped whole.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[tracing::instrument(skip_all, fields(peer = %peer))]
async fn handle_connection(
    stream: TcpStream,
    table: Arc<RuleTable>,
    cancel: CancellationToken,
    peer: SocketAddr,
) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    let mut accepted = 0u64;
    loop {
        tokio::select! {
            result = read_frame(&mut reader, &mut line, MAX_LINE_BYTES) => match result {
                Ok(Frame::Line) => {
                    if ingest_line(&table, &line) {
                        accepted += 1;
                    }
                }
                Ok(Frame::TooLong(dropped)) => {
                    ag_warn!(conn, dropped_bytes = dropped, limit = MAX_LINE_BYTES, "oversized line skipped");
                }
                Ok(Frame::Eof) => break,
                Err(e) => {
                    ag_warn!(conn, error = %e, "connection read error");
                    break;
                }
            },
            _ = cancel.cancelled() => break,
        }
    }
    ag_debug!(conn, peer = %peer, events = accepted, "connection closed");
}

/// Result of [`read_frame`].
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// `buf` holds one line, without its newline.
    Line,
    /// The line exceeded the limit and was discarded up to its newline.
    TooLong(usize),
    Eof,
}

/// Read one `\n`-terminated line into `buf` without assuming any encoding.
/// Bytes beyond `max` are consumed but not buffered. A final line without a
/// newline is still returned before `Eof`.
async fn read_frame(
    reader: &mut (impl AsyncBufRead + Unpin),
    buf: &mut Vec<u8>,
    max: usize,
) -> io::Result<Frame> {
    buf.clear();
    let mut dropped = 0usize;
    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(match (dropped, buf.is_empty()) {
                    (0, true) => Frame::Eof,
                    (0, false) => Frame::Line,
                    (n, _) => Frame::TooLong(n),
                });
            }
            let (end, done) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i, true),
                None => (available.len(), false),
            };
            if dropped == 0 && buf.len() + end <= max {
                buf.extend_from_slice(&available[..end]);
            } else {
                dropped += buf.len() + end;
                buf.clear();
            }
            (if done { end + 1 } else { end }, done)
        };
        reader.consume(used);
        if done {
            return Ok(if dropped == 0 {
                Frame::Line
            } else {
                Frame::TooLong(dropped)
            });
        }
    }
}

/// Decode one line and stash it. Returns whether an event was stashed.
fn ingest_line(table: &RuleTable, line: &[u8]) -> bool {
    let line = line.trim_ascii();
    if line.is_empty() {
        return false;
    }
    let event = match serde_json::from_slice::<SourceRecord>(line) {
        Ok(record) => record.into_event(),
        Err(e) => {
            ag_warn!(conn, error = %e, "undecodable line skipped");
            return false;
        }
    };
    if event.event_type.is_empty() {
        ag_warn!(conn, "event without type skipped");
        return false;
    }
    ag_trace!(pipe, event_type = %event.event_type, source = %event.source, "event received");
    table.stash(event);
    true
}

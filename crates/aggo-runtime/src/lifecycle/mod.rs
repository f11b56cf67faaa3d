mod bootstrap;
mod signal;
mod types;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aggo_config::AggoConfig;
use aggo_core::RuleTable;
use orion_error::op_context;
use orion_error::compat_prelude::*;
use orion_error::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeResult;
use crate::notice_task::run_notice_logger;
use crate::persist::save_snapshot;
use crate::receiver::Receiver;

pub use bootstrap::load_rules;
pub use signal::wait_for_signal;

use bootstrap::{build_table, resolve_path};
use types::TaskGroup;

// ---------------------------------------------------------------------------
// Reactor
// ---------------------------------------------------------------------------

/// Owns a running aggregation service: the rule table, the TCP receiver and
/// the notice logger.
///
/// Task groups are joined in reverse start order during
/// [`wait`](Self::wait). Once the receiver has stopped, the table is either
/// persisted (when `[persist] snapshot` is set) or drained through the sinks,
/// and only then is the notice logger released.
pub struct Reactor {
    cancel: CancellationToken,
    notice_cancel: CancellationToken,
    groups: Vec<TaskGroup>,
    listen_addr: SocketAddr,
    table: Arc<RuleTable>,
    snapshot_path: Option<PathBuf>,
}

impl Reactor {
    /// Bootstrap from an [`AggoConfig`]. Relative rule globs, file sinks and
    /// the snapshot path resolve against `base_dir`.
    #[tracing::instrument(name = "aggo.start", skip_all, fields(listen = %config.server.listen))]
    pub async fn start(config: AggoConfig, base_dir: &Path) -> RuntimeResult<Self> {
        let mut op = op_context!("aggo-bootstrap").with_auto_log();
        op.record("listen", config.server.listen.as_str());
        op.record("base_dir", base_dir.display().to_string().as_str());

        let cancel = CancellationToken::new();
        let notice_cancel = CancellationToken::new();
        let snapshot_path = config
            .persist
            .snapshot
            .as_deref()
            .map(|p| resolve_path(base_dir, p));

        let table = build_table(&config, base_dir, snapshot_path.as_deref())?;
        ag_info!(
            sys,
            rules = table.len(),
            open_windows = table.open_windows(),
            matcher = ?config.runtime.matcher,
            "rule table ready"
        );

        // Start order: notices → receiver.
        let mut groups = Vec::with_capacity(2);

        let mut notices = TaskGroup::new("notices");
        let rx = table.subscribe();
        let token = notice_cancel.clone();
        notices.push(tokio::spawn(async move {
            run_notice_logger(rx, token).await;
            Ok(())
        }));
        groups.push(notices);

        let receiver = Receiver::bind(&config.server.listen, Arc::clone(&table))
            .await
            .owe_sys()?;
        let listen_addr = receiver.local_addr().owe_sys()?;
        let receiver_cancel = receiver.cancel_token();
        let root = cancel.clone();
        tokio::spawn(async move {
            root.cancelled().await;
            receiver_cancel.cancel();
        });
        let mut receiver_group = TaskGroup::new("receiver");
        receiver_group.push(tokio::spawn(receiver.run()));
        groups.push(receiver_group);

        op.mark_suc();
        Ok(Self {
            cancel,
            notice_cancel,
            groups,
            listen_addr,
            table,
            snapshot_path,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    /// The live rule table, for embedding callers that stash or administer
    /// rules directly.
    pub fn table(&self) -> &Arc<RuleTable> {
        &self.table
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        ag_info!(sys, "initiating graceful shutdown");
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for all task groups after [`shutdown`](Self::shutdown).
    pub async fn wait(mut self) -> RuntimeResult<()> {
        while let Some(group) = self.groups.pop() {
            let name = group.name;
            ag_debug!(sys, task_group = name, "waiting for task group to finish");
            group.wait().await?;
            ag_debug!(sys, task_group = name, "task group finished");

            if name == "receiver" {
                // No more stashes; settle what the table still holds.
                self.finish_table().await?;
                self.notice_cancel.cancel();
            }
        }
        ag_info!(sys, "shutdown complete");
        Ok(())
    }

    async fn finish_table(&self) -> RuntimeResult<()> {
        match &self.snapshot_path {
            Some(path) => {
                let buckets = self.table.suspend_and_snapshot();
                // Windows already fired are not in the snapshot; let them post.
                self.table.settle().await;
                save_snapshot(path, &buckets)
            }
            None => {
                let flushed = self.table.drain().await;
                ag_info!(res, flushed, "open windows drained");
                Ok(())
            }
        }
    }
}

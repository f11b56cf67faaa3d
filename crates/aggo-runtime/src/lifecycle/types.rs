use tokio::task::JoinHandle;

use orion_error::compat_prelude::*;
use orion_error::prelude::*;

use crate::error::{RuntimeReason, RuntimeResult};

/// Named tasks that are joined together during shutdown.
pub(super) struct TaskGroup {
    pub(super) name: &'static str,
    handles: Vec<JoinHandle<anyhow::Result<()>>>,
}

impl TaskGroup {
    pub(super) fn new(name: &'static str) -> Self {
        Self {
            name,
            handles: Vec::new(),
        }
    }

    pub(super) fn push(&mut self, handle: JoinHandle<anyhow::Result<()>>) {
        self.handles.push(handle);
    }

    /// Join all tasks in this group, returning the first error.
    pub(super) async fn wait(self) -> RuntimeResult<()> {
        for handle in self.handles {
            handle
                .await
                .map_err(|e| {
                    StructError::from(RuntimeReason::Shutdown)
                        .with_detail(format!("{} task join error: {e}", self.name))
                })?
                .owe(RuntimeReason::Shutdown)?;
        }
        Ok(())
    }
}

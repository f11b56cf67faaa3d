use aggo_core::{FlushOutcome, WindowClosed};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

/// Log every window-closed notice until cancelled or the table is gone.
pub(crate) async fn run_notice_logger(
    mut rx: broadcast::Receiver<WindowClosed>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            notice = rx.recv() => match notice {
                Ok(notice) => log_notice(&notice),
                Err(RecvError::Lagged(missed)) => {
                    ag_warn!(pipe, missed, "notice logger lagged behind");
                }
                Err(RecvError::Closed) => break,
            },
            _ = cancel.cancelled() => break,
        }
    }
    // Notices published during the final drain.
    while let Ok(notice) = rx.try_recv() {
        log_notice(&notice);
    }
}

fn log_notice(notice: &WindowClosed) {
    match notice.outcome {
        FlushOutcome::Delivered => ag_info!(
            pipe,
            rule = %notice.rule_id,
            generation = notice.generation,
            events = notice.events,
            "window delivered"
        ),
        FlushOutcome::Failed => ag_warn!(
            pipe,
            rule = %notice.rule_id,
            generation = notice.generation,
            events = notice.events,
            "window dropped after failed delivery"
        ),
    }
}

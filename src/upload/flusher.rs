use anyhow::Result;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::queue::UploadQueue;
use super::sink::UploadSink;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const FINAL_FLUSH_TIMEOUT_SECS: u64 = 10;

/// One delivery cycle: snapshot, deliver, then remove only the snapshot.
/// Returns how many events were delivered.
pub async fn flush_once<S: UploadSink>(queue: &UploadQueue, sink: &S) -> Result<usize> {
    let snapshot = queue.snapshot();
    if snapshot.is_empty() {
        return Ok(0);
    }

    log_info!("Uploading {} sessions...", snapshot.len());
    sink.deliver(&snapshot).await?;

    let removed = queue.remove_delivered(&snapshot);
    log_info!("Sent {} sessions ({} still queued)", removed, queue.len());
    Ok(removed)
}

/// Drains the queue every `period` until cancelled, then makes one last
/// attempt. Failed batches simply stay queued for the next cycle.
pub async fn flush_loop<S: UploadSink>(
    queue: UploadQueue,
    sink: S,
    period: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = flush_once(&queue, &sink).await {
                    log_warn!("upload failed, {} sessions kept for retry: {err:#}", queue.len());
                }
            }
            _ = cancel_token.cancelled() => {
                let fut = flush_once(&queue, &sink);
                match tokio::time::timeout(Duration::from_secs(FINAL_FLUSH_TIMEOUT_SECS), fut).await {
                    Ok(Ok(sent)) => log_info!("final flush sent {} sessions", sent),
                    Ok(Err(err)) => log_warn!("final flush failed, {} sessions unsent: {err:#}", queue.len()),
                    Err(_) => log_warn!("final flush timed out (> {}s)", FINAL_FLUSH_TIMEOUT_SECS),
                }
                log_info!("upload flusher shutting down");
                break;
            }
        }
    }
}

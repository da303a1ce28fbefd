use anyhow::{Context, Result};
use chrono::Utc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::Sample;
use crate::segmentation::LiveSegmenter;

use super::source::SampleSource;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Polls `source` every `poll_interval` and feeds the segmenter until cancelled.
/// On cancellation the open block is closed into the upload queue.
pub async fn sensing_loop<S: SampleSource>(
    mut source: S,
    mut segmenter: LiveSegmenter,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match perform_sample(&mut source, &segmenter) {
                    Ok(sample) => {
                        segmenter.observe(&sample);
                    }
                    Err(err) => log_warn!("sample skipped: {err:#}"),
                }
            }
            _ = cancel_token.cancelled() => {
                let closed = segmenter.finish();
                log_info!("sensing loop shutting down ({} open block closed)", closed);
                break;
            }
        }
    }
}

/// Reads one sample. The focused window is only queried when the user is active.
pub fn perform_sample<S: SampleSource>(
    source: &mut S,
    segmenter: &LiveSegmenter,
) -> Result<Sample> {
    let timestamp = Utc::now();
    let idle_seconds = source.idle_seconds().context("idle time unavailable")?;

    let window = if segmenter.is_idle(idle_seconds) {
        None
    } else {
        source.active_window().context("active window unavailable")?
    };

    Ok(Sample {
        timestamp,
        idle_seconds,
        window,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActiveWindow;
    use crate::segmentation::SegmenterConfig;
    use crate::upload::UploadQueue;
    use anyhow::bail;

    struct ScriptedSource {
        idle: f64,
        window: Option<ActiveWindow>,
        fail_idle: bool,
        window_reads: usize,
    }

    impl ScriptedSource {
        fn active(app: &str, title: &str) -> Self {
            Self {
                idle: 0.0,
                window: Some(ActiveWindow::new(app, title)),
                fail_idle: false,
                window_reads: 0,
            }
        }
    }

    impl SampleSource for ScriptedSource {
        fn idle_seconds(&mut self) -> Result<f64> {
            if self.fail_idle {
                bail!("no idle counter");
            }
            Ok(self.idle)
        }

        fn active_window(&mut self) -> Result<Option<ActiveWindow>> {
            self.window_reads += 1;
            Ok(self.window.clone())
        }
    }

    fn segmenter() -> LiveSegmenter {
        LiveSegmenter::new(1, SegmenterConfig::default(), UploadQueue::new())
    }

    #[test]
    fn window_is_not_read_while_idle() {
        let mut source = ScriptedSource::active("code", "lib.rs");
        source.idle = 600.0;

        let sample = perform_sample(&mut source, &segmenter()).unwrap();
        assert!(sample.window.is_none());
        assert_eq!(source.window_reads, 0);
    }

    #[test]
    fn failed_idle_reading_skips_the_tick() {
        let mut source = ScriptedSource::active("code", "lib.rs");
        source.fail_idle = true;
        assert!(perform_sample(&mut source, &segmenter()).is_err());
        assert_eq!(source.window_reads, 0);
    }

    #[tokio::test]
    async fn cancellation_closes_open_block() {
        let queue = UploadQueue::new();
        let segmenter = LiveSegmenter::new(7, SegmenterConfig::default(), queue.clone());
        let token = CancellationToken::new();

        let handle = tokio::spawn(sensing_loop(
            ScriptedSource::active("terminal", "cargo"),
            segmenter,
            Duration::from_millis(10),
            token.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap();

        let queued = queue.snapshot();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].app_name.as_deref(), Some("terminal"));
        assert_eq!(queued[0].user_id, Some(7));
    }
}

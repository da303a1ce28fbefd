use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::segmentation::LiveSegmenter;
use crate::settings::AgentSettings;
use crate::upload::{flush_loop, UploadQueue, UploadSink};

use super::loop_worker::sensing_loop;
use super::source::SampleSource;

struct Worker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl Worker {
    async fn stop(self, name: &str) -> Result<()> {
        self.cancel_token.cancel();
        self.handle
            .await
            .with_context(|| format!("{name} task failed to join"))
    }
}

/// Owns the sensing loop and the upload flusher.
///
/// They stop in order: sensing first, so the last open block reaches the
/// queue, then the flusher, which makes its final delivery attempt.
pub struct AgentController {
    sensing: Option<Worker>,
    flusher: Option<Worker>,
    queue: UploadQueue,
}

impl AgentController {
    pub fn new() -> Self {
        Self {
            sensing: None,
            flusher: None,
            queue: UploadQueue::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.sensing.is_some()
    }

    pub fn start<S, K>(
        &mut self,
        source: S,
        sink: K,
        settings: &AgentSettings,
    ) -> Result<UploadQueue>
    where
        S: SampleSource + 'static,
        K: UploadSink + 'static,
    {
        if self.sensing.is_some() {
            bail!("agent already running");
        }

        info!(
            "Starting agent for user {} (poll {}s, flush {}s)",
            settings.user_id, settings.poll_interval_secs, settings.flush_interval_secs
        );

        let segmenter = LiveSegmenter::new(
            settings.user_id,
            settings.segmenter_config(),
            self.queue.clone(),
        );

        let sensing_token = CancellationToken::new();
        let sensing_handle = tokio::spawn(sensing_loop(
            source,
            segmenter,
            Duration::from_secs(settings.poll_interval_secs.max(1)),
            sensing_token.clone(),
        ));

        let flusher_token = CancellationToken::new();
        let flusher_handle = tokio::spawn(flush_loop(
            self.queue.clone(),
            sink,
            Duration::from_secs(settings.flush_interval_secs.max(1)),
            flusher_token.clone(),
        ));

        self.sensing = Some(Worker {
            handle: sensing_handle,
            cancel_token: sensing_token,
        });
        self.flusher = Some(Worker {
            handle: flusher_handle,
            cancel_token: flusher_token,
        });
        Ok(self.queue.clone())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(sensing) = self.sensing.take() {
            sensing.stop("sensing loop").await?;
        }
        if let Some(flusher) = self.flusher.take() {
            flusher.stop("upload flusher").await?;
        }
        info!("Agent stopped, {} sessions left unsent", self.queue.len());
        Ok(())
    }
}

impl Default for AgentController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActiveWindow, RawEventPayload};
    use crate::sensing::source::{FeedSource, FeedState};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CollectingSink {
        delivered: Arc<Mutex<Vec<RawEventPayload>>>,
    }

    impl UploadSink for CollectingSink {
        async fn deliver(&self, batch: &[RawEventPayload]) -> Result<()> {
            self.delivered.lock().unwrap().extend_from_slice(batch);
            Ok(())
        }
    }

    #[tokio::test]
    async fn stop_delivers_the_open_block() {
        let (tx, source) = FeedSource::new();
        tx.send(FeedState {
            idle_seconds: 0.0,
            window: Some(ActiveWindow::new("code", "controller.rs")),
        })
        .unwrap();

        let sink = CollectingSink::default();
        let settings = AgentSettings {
            user_id: 11,
            poll_interval_secs: 1,
            flush_interval_secs: 3600,
            ..Default::default()
        };

        let mut controller = AgentController::new();
        let queue = controller.start(source, sink.clone(), &settings).unwrap();
        assert!(controller.is_running());
        assert!(controller.start(FeedSource::new().1, sink.clone(), &settings).is_err());

        // first tick fires immediately
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.stop().await.unwrap();

        assert!(queue.is_empty());
        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].user_id, Some(11));
        assert_eq!(delivered[0].window_title.as_deref(), Some("controller.rs"));
    }
}

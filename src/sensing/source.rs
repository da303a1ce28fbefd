use std::io::BufRead;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::watch;

use crate::models::ActiveWindow;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Where the sensing loop gets its per-tick readings from.
///
/// Either reading may fail or report nothing; the loop skips that tick.
pub trait SampleSource: Send {
    fn idle_seconds(&mut self) -> Result<f64>;
    fn active_window(&mut self) -> Result<Option<ActiveWindow>>;
}

/// Last state reported by a feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedState {
    pub idle_seconds: f64,
    pub window: Option<ActiveWindow>,
}

#[derive(Debug, Deserialize)]
struct FeedLine {
    #[serde(default)]
    app_name: Option<String>,
    #[serde(default)]
    window_title: Option<String>,
    #[serde(default)]
    idle_seconds: f64,
}

impl From<FeedLine> for FeedState {
    fn from(line: FeedLine) -> Self {
        let window = match (line.app_name, line.window_title) {
            (None, None) => None,
            (app, title) => Some(ActiveWindow::new(
                app.unwrap_or_default(),
                title.unwrap_or_default(),
            )),
        };
        Self {
            idle_seconds: line.idle_seconds.max(0.0),
            window,
        }
    }
}

/// Parses one JSON feed line. Blank lines yield `None`.
pub fn parse_feed_line(line: &str) -> Result<Option<FeedState>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed: FeedLine = serde_json::from_str(trimmed)?;
    Ok(Some(parsed.into()))
}

/// Latest-value source: whatever the feed last reported is what gets sampled.
pub struct FeedSource {
    rx: watch::Receiver<FeedState>,
}

impl FeedSource {
    pub fn new() -> (watch::Sender<FeedState>, Self) {
        let (tx, rx) = watch::channel(FeedState::default());
        (tx, Self { rx })
    }

    /// Source fed from `reader` on a dedicated thread.
    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Result<(Self, JoinHandle<()>)> {
        let (tx, source) = Self::new();
        let handle = spawn_reader(reader, tx)?;
        Ok((source, handle))
    }
}

impl SampleSource for FeedSource {
    fn idle_seconds(&mut self) -> Result<f64> {
        Ok(self.rx.borrow().idle_seconds)
    }

    fn active_window(&mut self) -> Result<Option<ActiveWindow>> {
        Ok(self.rx.borrow().window.clone())
    }
}

/// Reads JSON lines until EOF, publishing each one. Bad lines are logged and skipped.
///
/// Uses a plain thread: a reader parked on stdin must not hold up runtime shutdown.
pub fn spawn_reader(
    reader: impl BufRead + Send + 'static,
    tx: watch::Sender<FeedState>,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("daytrace-feed".into())
        .spawn(move || {
            let mut lines = 0usize;
            for (n, line) in reader.lines().enumerate() {
                lines = n + 1;
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        log_warn!("feed read failed: {err}");
                        break;
                    }
                };
                match parse_feed_line(&line) {
                    Ok(Some(state)) => {
                        if tx.send(state).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => log_warn!("ignoring feed line {}: {err}", n + 1),
                }
            }
            log_debug!("feed reader reached end of input after {lines} lines");
        })
        .context("failed to spawn feed reader thread")
}

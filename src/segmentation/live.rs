//! Single-pass segmenter for the capturing device.
//!
//! Holds at most one open block. Consecutive samples are coalesced only when
//! app and (truncated) title are byte-for-byte identical; anything fuzzier is
//! left to the retrospective compressor, which can see the whole day.

use chrono::{DateTime, Utc};
use log::info;

use crate::models::{ActiveWindow, RawEvent, Sample};
use crate::segmentation::config::SegmenterConfig;
use crate::segmentation::decision::{ExtendReason, MergeDecision, MergePolicy};
use crate::segmentation::idle::IdleDetector;
use crate::upload::UploadQueue;

pub const IDLE_APP: &str = "Idle";
pub const IDLE_TITLE: &str = "User inactive";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    NoBlock,
    Active,
    Idle,
}

/// What the segmenter sees on one tick once idleness has been decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Focus {
    Idle,
    Window(ActiveWindow),
}

/// The block currently being grown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub app_name: String,
    pub window_title: String,
    pub idle: bool,
}

impl OpenBlock {
    fn open(now: DateTime<Utc>, focus: &Focus) -> Self {
        match focus {
            Focus::Idle => Self {
                start: now,
                end: now,
                app_name: IDLE_APP.to_string(),
                window_title: IDLE_TITLE.to_string(),
                idle: true,
            },
            Focus::Window(window) => Self {
                start: now,
                end: now,
                app_name: window.app_name.clone(),
                window_title: window.window_title.clone(),
                idle: false,
            },
        }
    }
}

/// Exact-match policy: extend on identical focus or continued idleness,
/// break when idleness starts, otherwise start a new block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatchPolicy;

impl MergePolicy for ExactMatchPolicy {
    type Open = OpenBlock;
    type Incoming = Focus;

    fn decide(&self, open: &OpenBlock, incoming: &Focus) -> MergeDecision {
        match incoming {
            Focus::Idle if open.idle => MergeDecision::Extend(ExtendReason::IdleHeartbeat),
            Focus::Idle => MergeDecision::Break,
            Focus::Window(_) if open.idle => MergeDecision::NewBlock,
            Focus::Window(window)
                if window.app_name == open.app_name && window.window_title == open.window_title =>
            {
                MergeDecision::Extend(ExtendReason::IdenticalFocus)
            }
            Focus::Window(_) => MergeDecision::NewBlock,
        }
    }
}

pub struct LiveSegmenter {
    user_id: i64,
    config: SegmenterConfig,
    detector: IdleDetector,
    policy: ExactMatchPolicy,
    queue: UploadQueue,
    current: Option<OpenBlock>,
}

impl LiveSegmenter {
    pub fn new(user_id: i64, config: SegmenterConfig, queue: UploadQueue) -> Self {
        Self {
            user_id,
            detector: IdleDetector::new(config.idle_threshold_secs),
            config,
            policy: ExactMatchPolicy,
            queue,
            current: None,
        }
    }

    pub fn state(&self) -> SegmenterState {
        match &self.current {
            None => SegmenterState::NoBlock,
            Some(block) if block.idle => SegmenterState::Idle,
            Some(_) => SegmenterState::Active,
        }
    }

    pub fn current(&self) -> Option<&OpenBlock> {
        self.current.as_ref()
    }

    pub fn is_idle(&self, idle_seconds: f64) -> bool {
        self.detector.is_idle(idle_seconds)
    }

    /// Applies one sample. Returns how many blocks were closed and queued.
    pub fn observe(&mut self, sample: &Sample) -> usize {
        let now = sample.timestamp;

        if self.detector.is_idle(sample.idle_seconds) {
            if self.state() != SegmenterState::Idle {
                info!("Entered idle mode ({:.0}s without input)", sample.idle_seconds);
            }
            return self.advance(now, Focus::Idle);
        }

        let mut emitted = 0;
        if self.state() == SegmenterState::Idle {
            emitted += self.close_current();
            info!("Exited idle mode");
        }

        // Source could not report a window: no transition this tick.
        let Some(window) = sample.window.as_ref() else {
            return emitted;
        };

        let focus = Focus::Window(self.normalize(window));
        emitted + self.advance(now, focus)
    }

    /// Closes and queues the open block, if any. Called on shutdown.
    pub fn finish(&mut self) -> usize {
        self.close_current()
    }

    fn advance(&mut self, now: DateTime<Utc>, focus: Focus) -> usize {
        let decision = self
            .current
            .as_ref()
            .map(|open| self.policy.decide(open, &focus));

        match decision {
            Some(decision) if decision.merges() => {
                if let Some(open) = self.current.as_mut() {
                    open.end = now;
                }
                0
            }
            Some(_) => {
                let emitted = self.close_current();
                self.current = Some(OpenBlock::open(now, &focus));
                emitted
            }
            None => {
                self.current = Some(OpenBlock::open(now, &focus));
                0
            }
        }
    }

    fn close_current(&mut self) -> usize {
        let Some(block) = self.current.take() else {
            return 0;
        };

        info!(
            "SESSION: {} -> {} | {} | {}",
            block.start, block.end, block.app_name, block.window_title
        );

        let event = RawEvent {
            user_id: self.user_id,
            start: block.start,
            end: block.end,
            app_name: block.app_name,
            window_title: block.window_title,
            project: None,
        };
        self.queue.enqueue(event.to_payload());
        1
    }

    fn normalize(&self, window: &ActiveWindow) -> ActiveWindow {
        ActiveWindow {
            app_name: window.app_name.clone(),
            window_title: window
                .window_title
                .chars()
                .take(self.config.max_title_chars)
                .collect(),
        }
    }
}

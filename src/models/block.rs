use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{span_seconds, RawEvent};

pub const BREAK_APP: &str = "Idle";
pub const BREAK_TITLE: &str = "Break";
pub const BREAK_PROJECT: &str = "Break";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    #[default]
    Activity,
    /// Synthesised by the compressor to fill a gap between events.
    Break,
}

/// A merged span of activity. Derived on every read, never persisted.
///
/// `duration_seconds` is the sum of the durations of the events folded into
/// the block; gaps between those events are not counted, so it can be smaller
/// than `elapsed_seconds()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub app_name: String,
    pub title: String,
    pub project: String,
    pub duration_seconds: f64,
    #[serde(default)]
    pub kind: BlockKind,
}

impl CompressedBlock {
    pub fn from_event(event: &RawEvent) -> Self {
        Self {
            start: event.start,
            end: event.end,
            app_name: event.app_name.clone(),
            title: event.window_title.clone(),
            project: event.project_or_unassigned().to_string(),
            duration_seconds: event.duration_seconds(),
            kind: BlockKind::Activity,
        }
    }

    pub fn idle_break(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            app_name: BREAK_APP.to_string(),
            title: BREAK_TITLE.to_string(),
            project: BREAK_PROJECT.to_string(),
            duration_seconds: span_seconds(start, end),
            kind: BlockKind::Break,
        }
    }

    /// Wall-clock span of the block, gaps included.
    pub fn elapsed_seconds(&self) -> f64 {
        span_seconds(self.start, self.end)
    }

    pub fn is_break(&self) -> bool {
        self.kind == BlockKind::Break
    }

    /// Folds `other` into this block: the span grows to `other.end`, the
    /// duration grows by `other`'s own duration only.
    pub(crate) fn absorb(&mut self, other: &CompressedBlock) {
        self.end = other.end;
        self.duration_seconds += other.duration_seconds;
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Focused window as reported by the sample source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWindow {
    pub app_name: String,
    pub window_title: String,
}

impl ActiveWindow {
    pub fn new(app_name: impl Into<String>, window_title: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            window_title: window_title.into(),
        }
    }
}

/// A single poll of the sample source. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub idle_seconds: f64,
    /// `None` when the source could not report a focused window this tick.
    pub window: Option<ActiveWindow>,
}

impl Sample {
    pub fn active(
        timestamp: DateTime<Utc>,
        app_name: impl Into<String>,
        window_title: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            idle_seconds: 0.0,
            window: Some(ActiveWindow::new(app_name, window_title)),
        }
    }

    pub fn idle(timestamp: DateTime<Utc>, idle_seconds: f64) -> Self {
        Self {
            timestamp,
            idle_seconds,
            window: None,
        }
    }
}

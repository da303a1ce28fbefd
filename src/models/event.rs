//! Raw activity events.
//!
//! A `RawEvent` is one closed block as emitted by the live segmenter. On the
//! wire and in storage it travels as a `RawEventPayload`, whose fields are all
//! optional because rows coming back from storage are not trusted.

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const UNASSIGNED_PROJECT: &str = "Unassigned";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid timestamp in `{field}`: '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("event ends before it starts")]
    NegativeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub user_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub app_name: String,
    pub window_title: String,
    pub project: Option<String>,
}

impl RawEvent {
    pub fn duration_seconds(&self) -> f64 {
        span_seconds(self.start, self.end)
    }

    /// Project label, with null and empty both meaning "Unassigned".
    pub fn project_or_unassigned(&self) -> &str {
        match self.project.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => UNASSIGNED_PROJECT,
        }
    }

    pub fn to_payload(&self) -> RawEventPayload {
        RawEventPayload {
            event_id: None,
            user_id: Some(self.user_id),
            start_time: Some(format_timestamp(self.start)),
            end_time: Some(format_timestamp(self.end)),
            app_name: Some(self.app_name.clone()),
            window_title: Some(self.window_title.clone()),
            project: self.project.clone(),
        }
    }
}

impl TryFrom<&RawEventPayload> for RawEvent {
    type Error = EventError;

    fn try_from(payload: &RawEventPayload) -> Result<Self, Self::Error> {
        let user_id = payload.user_id.ok_or(EventError::MissingField("user_id"))?;
        let start = required_timestamp(payload.start_time.as_deref(), "start_time")?;
        let end = required_timestamp(payload.end_time.as_deref(), "end_time")?;
        if end < start {
            return Err(EventError::NegativeSpan);
        }

        Ok(Self {
            user_id,
            start,
            end,
            app_name: payload.app_name.clone().unwrap_or_default(),
            window_title: payload.window_title.clone().unwrap_or_default(),
            project: payload.project.clone(),
        })
    }
}

/// Wire shape of a raw event. Also the shape rows take when read back from
/// storage, so every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEventPayload {
    /// Client-generated identifier, used to drop re-delivered events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub user_id: Option<i64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub app_name: Option<String>,
    pub window_title: Option<String>,
    pub project: Option<String>,
}

/// Body of a batch upload: `{"events": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBatch {
    #[serde(default)]
    pub events: Vec<RawEventPayload>,
}

fn required_timestamp(
    value: Option<&str>,
    field: &'static str,
) -> Result<DateTime<Utc>, EventError> {
    let raw = value.ok_or(EventError::MissingField(field))?;
    parse_timestamp(raw).ok_or_else(|| EventError::InvalidTimestamp {
        field,
        value: raw.to_string(),
    })
}

/// Accepts RFC 3339 as well as naive ISO-8601 timestamps, which are read as
/// local time.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
}

/// Fixed-width UTC form, so stored timestamps sort lexicographically.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn span_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

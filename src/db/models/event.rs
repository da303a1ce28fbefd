use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::RawEventPayload;

/// A row of `activity_events`. The payload is returned as stored, untrusted.
#[derive(Debug, Clone, Serialize)]
pub struct StoredEvent {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: RawEventPayload,
}

/// Outcome of one `ingest_batch` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    /// Already stored under the same event id (a retried upload).
    pub duplicates: usize,
    /// No user id or no usable start time.
    pub rejected: usize,
}

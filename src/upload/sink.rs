use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use serde::Serialize;

use crate::db::Database;
use crate::models::RawEventPayload;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Destination for batches of closed blocks. An `Err` leaves the batch queued.
pub trait UploadSink: Send + Sync {
    fn deliver(&self, batch: &[RawEventPayload]) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    events: &'a [RawEventPayload],
}

/// Posts batches to `{server}/api/events/batch` with an `X-API-Key` header.
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpSink {
    pub fn new(server_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/events/batch", server_url.trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl UploadSink for HttpSink {
    async fn deliver(&self, batch: &[RawEventPayload]) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-Key", &self.api_key)
            .json(&BatchRequest { events: batch })
            .send()
            .await
            .with_context(|| format!("network error posting to {}", self.endpoint))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            bail!("server error {status}: {body}");
        }
        Ok(())
    }
}

/// Writes batches straight into the local event store.
pub struct StoreSink {
    db: Database,
}

impl StoreSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl UploadSink for StoreSink {
    async fn deliver(&self, batch: &[RawEventPayload]) -> Result<()> {
        let report = self.db.ingest_batch(batch.to_vec()).await?;
        if report.rejected > 0 {
            log::warn!("Local store rejected {} events", report.rejected);
        }
        Ok(())
    }
}

/// Sink chosen at startup.
pub enum AgentSink {
    Http(HttpSink),
    Store(StoreSink),
}

impl UploadSink for AgentSink {
    async fn deliver(&self, batch: &[RawEventPayload]) -> Result<()> {
        match self {
            AgentSink::Http(sink) => sink.deliver(batch).await,
            AgentSink::Store(sink) => sink.deliver(batch).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let sink = HttpSink::new("https://tracker.example.com/", "key").unwrap();
        assert_eq!(sink.endpoint(), "https://tracker.example.com/api/events/batch");
    }

    #[test]
    fn batch_body_shape() {
        let events = vec![RawEventPayload {
            event_id: Some("e1".into()),
            user_id: Some(9),
            ..Default::default()
        }];
        let body = serde_json::to_value(BatchRequest { events: &events }).unwrap();
        assert_eq!(body["events"][0]["user_id"], 9);
        assert_eq!(body["events"][0]["event_id"], "e1");
        assert!(body["events"][0]["project"].is_null());
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let sink = HttpSink::new("http://127.0.0.1:9", "key").unwrap();
        let result = sink.deliver(&[RawEventPayload::default()]).await;
        assert!(result.is_err());
    }
}

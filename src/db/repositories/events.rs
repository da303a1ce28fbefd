use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{local_day_range, parse_datetime},
    models::{IngestReport, StoredEvent},
};
use crate::models::{format_timestamp, parse_timestamp, RawEventPayload, UNASSIGNED_PROJECT};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Columns as written. Start is normalized; end is normalized when it parses
/// and kept verbatim otherwise.
struct EventRow {
    event_uid: Option<String>,
    user_id: i64,
    start_time: String,
    end_time: Option<String>,
    app_name: Option<String>,
    window_title: Option<String>,
    project: Option<String>,
}

impl EventRow {
    fn from_payload(payload: &RawEventPayload) -> Option<Self> {
        let user_id = payload.user_id?;
        let start = parse_timestamp(payload.start_time.as_deref()?)?;
        let end_time = payload.end_time.as_deref().map(|raw| {
            parse_timestamp(raw)
                .map(format_timestamp)
                .unwrap_or_else(|| raw.to_string())
        });

        Some(Self {
            event_uid: payload.event_id.clone(),
            user_id,
            start_time: format_timestamp(start),
            end_time,
            app_name: payload.app_name.clone(),
            window_title: payload.window_title.clone(),
            project: payload.project.clone(),
        })
    }
}

fn row_to_parts(row: &Row) -> Result<(i64, String, RawEventPayload), rusqlite::Error> {
    let event = RawEventPayload {
        event_id: row.get("event_uid")?,
        user_id: row.get("user_id")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        app_name: row.get("app_name")?,
        window_title: row.get("window_title")?,
        project: row.get("project")?,
    };
    Ok((row.get("id")?, row.get("created_at")?, event))
}

impl Database {
    /// Stores a batch in one transaction. Events already stored under the same
    /// event id are skipped, so a retried upload never duplicates rows.
    pub async fn ingest_batch(&self, payloads: Vec<RawEventPayload>) -> Result<IngestReport> {
        let report = self
            .execute(move |conn| {
                let tx = conn.transaction()?;
                let created_at = format_timestamp(Utc::now());
                let mut report = IngestReport::default();

                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO activity_events
                         (event_uid, user_id, start_time, end_time, app_name, window_title, project, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )?;

                    for payload in &payloads {
                        let Some(row) = EventRow::from_payload(payload) else {
                            report.rejected += 1;
                            continue;
                        };

                        let changed = stmt
                            .execute(params![
                                row.event_uid,
                                row.user_id,
                                row.start_time,
                                row.end_time,
                                row.app_name,
                                row.window_title,
                                row.project,
                                created_at,
                            ])
                            .context("failed to insert activity event")?;

                        if changed == 0 {
                            report.duplicates += 1;
                        } else {
                            report.inserted += 1;
                        }
                    }
                }

                tx.commit().context("failed to commit event batch")?;
                Ok(report)
            })
            .await?;

        log_info!(
            "Ingested batch: {} inserted, {} duplicates, {} rejected",
            report.inserted,
            report.duplicates,
            report.rejected
        );
        if report.rejected > 0 {
            log_warn!("{} events had no user id or start time", report.rejected);
        }
        Ok(report)
    }

    /// A user's events starting within the given local calendar day, in
    /// `start_time` order (ties by id).
    pub async fn events_for_day(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<StoredEvent>> {
        let (from, to) = local_day_range(date)?;
        let from = format_timestamp(from);
        let to = format_timestamp(to);

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, event_uid, user_id, start_time, end_time, app_name, window_title, project, created_at
                 FROM activity_events
                 WHERE user_id = ?1 AND start_time >= ?2 AND start_time < ?3
                 ORDER BY start_time ASC, id ASC",
            )?;

            let rows = stmt
                .query_map(params![user_id, from, to], row_to_parts)?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, created_at, event)| -> Result<StoredEvent> {
                    Ok(StoredEvent {
                        id,
                        created_at: parse_datetime(&created_at, "created_at")?,
                        event,
                    })
                })
                .collect()
        })
        .await
    }

    /// Stamps the project's name on the given events. Only rows owned by
    /// `user_id` change. Returns the number of rows updated.
    pub async fn assign_project(
        &self,
        event_ids: Vec<i64>,
        project_id: i64,
        user_id: i64,
    ) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let name: String = tx
                .query_row(
                    "SELECT name FROM projects WHERE id = ?1",
                    params![project_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| anyhow!("project {project_id} does not exist"))?;

            let updated = set_project(&tx, &event_ids, &name, user_id)?;
            tx.commit().context("failed to commit project assignment")?;
            Ok(updated)
        })
        .await
    }

    /// Resets the given events to "Unassigned". Only rows owned by `user_id` change.
    pub async fn unassign_project(&self, event_ids: Vec<i64>, user_id: i64) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let updated = set_project(&tx, &event_ids, UNASSIGNED_PROJECT, user_id)?;
            tx.commit().context("failed to commit project unassignment")?;
            Ok(updated)
        })
        .await
    }
}

fn set_project(
    tx: &rusqlite::Transaction<'_>,
    event_ids: &[i64],
    project: &str,
    user_id: i64,
) -> Result<usize> {
    let mut stmt =
        tx.prepare("UPDATE activity_events SET project = ?1 WHERE id = ?2 AND user_id = ?3")?;
    let mut updated = 0;
    for id in event_ids {
        updated += stmt
            .execute(params![project, id, user_id])
            .with_context(|| format!("failed to update project of event {id}"))?;
    }
    Ok(updated)
}

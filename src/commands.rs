use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::db::{Database, IngestReport, StoredEvent};
use crate::models::{EventBatch, Project, RawEvent, RawEventPayload, UNASSIGNED_PROJECT};
use crate::segmentation::{CompressionConfig, DailyReport};
use crate::sensing::{AgentController, FeedSource};
use crate::settings::AgentSettings;
use crate::upload::{AgentSink, HttpSink, StoreSink};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Where the agent reads samples from: a file of JSON lines, or stdin for `-`.
pub fn open_feed(feed: Option<&str>) -> Result<FeedSource> {
    let (source, _reader) = match feed {
        None | Some("-") => FeedSource::from_reader(BufReader::new(io::stdin()))?,
        Some(path) => {
            let file = File::open(path).with_context(|| format!("failed to open feed {path}"))?;
            FeedSource::from_reader(BufReader::new(file))?
        }
    };
    Ok(source)
}

pub fn build_sink(settings: &AgentSettings, offline: bool) -> Result<AgentSink> {
    if offline {
        let db = Database::new(settings.database_path())?;
        log_info!("Offline mode: writing sessions to {}", db.path().display());
        return Ok(AgentSink::Store(StoreSink::new(db)));
    }

    if settings.api_key.is_empty() {
        log_warn!("No API key configured; the server will likely reject uploads");
    }
    let sink = HttpSink::new(&settings.server_url, settings.api_key.clone())?;
    log_info!("Uploading sessions to {}", sink.endpoint());
    Ok(AgentSink::Http(sink))
}

/// Runs the live segmenter and the upload flusher until Ctrl-C.
pub async fn run_agent(settings: AgentSettings, feed: Option<&str>, offline: bool) -> Result<()> {
    let source = open_feed(feed)?;
    let sink = build_sink(&settings, offline)?;

    let mut controller = AgentController::new();
    controller.start(source, sink, &settings)?;
    log_info!("Agent running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    log_info!("Shutting down...");

    controller.stop().await
}

pub fn read_batch(path: &Path) -> Result<EventBatch> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not a valid event batch", path.display()))
}

pub async fn ingest_file(db: &Database, path: &Path) -> Result<IngestReport> {
    let batch = read_batch(path)?;
    db.ingest_batch(batch.events).await
}

/// Compressed timeline for one user and one local calendar day.
pub async fn daily_report(db: &Database, user_id: i64, date: NaiveDate) -> Result<DailyReport> {
    let rows: Vec<RawEventPayload> = db
        .events_for_day(user_id, date)
        .await?
        .into_iter()
        .map(|stored| stored.event)
        .collect();

    let report = DailyReport::build(user_id, date, &rows, &CompressionConfig::default());
    log_debug!(
        "{} rows for user {} on {} compressed into {} blocks, {:.2} h total",
        rows.len(),
        user_id,
        date,
        report.blocks.len(),
        report.total_hours()
    );
    if report.skipped_rows > 0 {
        log_warn!(
            "{} of {} rows for user {} on {} were malformed",
            report.skipped_rows,
            rows.len(),
            user_id,
            date
        );
    }
    Ok(report)
}

pub fn print_report(report: &DailyReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

/// One day of stored events, split by whether they carry a project.
#[derive(Debug, Clone, Serialize)]
pub struct DayEvents {
    pub user_id: i64,
    pub date: NaiveDate,
    pub assigned: Vec<StoredEvent>,
    pub unassigned: Vec<StoredEvent>,
}

fn has_project(event: &RawEventPayload) -> bool {
    matches!(event.project.as_deref(), Some(name) if !name.is_empty() && name != UNASSIGNED_PROJECT)
}

/// Stored events for one user and day with their row ids, which is what
/// `assign` and `unassign` take.
pub async fn day_events(db: &Database, user_id: i64, date: NaiveDate) -> Result<DayEvents> {
    let (assigned, unassigned): (Vec<StoredEvent>, Vec<StoredEvent>) = db
        .events_for_day(user_id, date)
        .await?
        .into_iter()
        .partition(|stored| has_project(&stored.event));

    Ok(DayEvents {
        user_id,
        date,
        assigned,
        unassigned,
    })
}

fn event_line(stored: &StoredEvent) -> String {
    let event = &stored.event;
    let span = match RawEvent::try_from(event) {
        Ok(parsed) => format!(
            "{} - {}  {:>5.2} h",
            parsed.start.with_timezone(&Local).format("%H:%M"),
            parsed.end.with_timezone(&Local).format("%H:%M"),
            parsed.duration_seconds() / 3600.0
        ),
        Err(_) => format!("{:<21}", "(bad timestamps)"),
    };

    format!(
        "{:>6}  {}  [{}] {} | {}",
        stored.id,
        span,
        event.project.as_deref().unwrap_or(UNASSIGNED_PROJECT),
        event.app_name.as_deref().unwrap_or(""),
        event.window_title.as_deref().unwrap_or(""),
    )
}

pub fn print_events(events: &DayEvents, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(events)?);
        return Ok(());
    }

    println!("Events for user {} on {}", events.user_id, events.date);
    for (heading, group) in [
        ("Assigned", &events.assigned),
        ("Unassigned", &events.unassigned),
    ] {
        println!("{heading} ({})", group.len());
        for stored in group {
            println!("  {}", event_line(stored));
        }
    }
    Ok(())
}

pub fn print_projects(projects: &[Project]) {
    if projects.is_empty() {
        println!("No projects");
        return;
    }
    for project in projects {
        println!("{:>5}  {}", project.id, project.name);
    }
}

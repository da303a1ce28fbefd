use std::collections::BTreeMap;
use std::fmt;

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::models::{CompressedBlock, RawEventPayload};
use crate::segmentation::algorithm::compress_rows;
use crate::segmentation::config::CompressionConfig;
use crate::segmentation::summary::summarize;

/// Compressed timeline and per-project hours for one user and one day.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub user_id: i64,
    pub date: NaiveDate,
    pub blocks: Vec<CompressedBlock>,
    pub summary: BTreeMap<String, f64>,
    pub skipped_rows: usize,
}

impl DailyReport {
    pub fn build(
        user_id: i64,
        date: NaiveDate,
        rows: &[RawEventPayload],
        config: &CompressionConfig,
    ) -> Self {
        let compression = compress_rows(rows, config);
        let summary = summarize(&compression.blocks);

        Self {
            user_id,
            date,
            blocks: compression.blocks,
            summary,
            skipped_rows: compression.skipped_rows,
        }
    }

    pub fn total_hours(&self) -> f64 {
        self.summary.values().sum()
    }
}

impl fmt::Display for DailyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timeline for user {} on {}", self.user_id, self.date)?;
        for block in &self.blocks {
            writeln!(
                f,
                "  {} - {}  {:>7.1} min  [{}] {} | {}",
                block.start.with_timezone(&Local).format("%H:%M:%S"),
                block.end.with_timezone(&Local).format("%H:%M:%S"),
                block.duration_seconds / 60.0,
                block.project,
                block.app_name,
                block.title,
            )?;
        }

        writeln!(f, "Hours by project")?;
        for (project, hours) in &self.summary {
            writeln!(f, "  {project:<24} {hours:>6.2}")?;
        }
        writeln!(f, "  {:<24} {:>6.2}", "Total", self.total_hours())?;

        if self.skipped_rows > 0 {
            writeln!(f, "Skipped {} malformed rows", self.skipped_rows)?;
        }
        Ok(())
    }
}

use std::collections::BTreeMap;

use crate::models::{CompressedBlock, UNASSIGNED_PROJECT};

/// Hours per project, rounded to two decimals. Sums `duration_seconds`, so
/// gaps absorbed by merges are not counted.
pub fn summarize(blocks: &[CompressedBlock]) -> BTreeMap<String, f64> {
    let mut seconds: BTreeMap<String, f64> = BTreeMap::new();
    for block in blocks {
        let project = if block.project.is_empty() {
            UNASSIGNED_PROJECT
        } else {
            block.project.as_str()
        };
        *seconds.entry(project.to_string()).or_insert(0.0) += block.duration_seconds;
    }

    seconds
        .into_iter()
        .map(|(project, total)| (project, round_hours(total)))
        .collect()
}

fn round_hours(seconds: f64) -> f64 {
    (seconds / 3600.0 * 100.0).round() / 100.0
}

use crate::models::CompressedBlock;
use crate::segmentation::config::CompressionConfig;
use crate::segmentation::decision::{ExtendReason, MergeDecision, MergePolicy};
use crate::segmentation::similarity::similarity;

/// Fuzzy merge cascade used by the retrospective compressor.
///
/// In order: long gap → break; micro event → fold; same project within the
/// merge gap → extend; similar title → extend; otherwise a new block.
pub struct FuzzyMergePolicy<'a> {
    config: &'a CompressionConfig,
}

impl<'a> FuzzyMergePolicy<'a> {
    pub fn new(config: &'a CompressionConfig) -> Self {
        Self { config }
    }
}

/// Gap between the end of `last` and the start of `next`, in minutes.
/// Negative when they overlap.
pub fn gap_minutes(last: &CompressedBlock, next: &CompressedBlock) -> f64 {
    (next.start - last.end).num_milliseconds() as f64 / 60_000.0
}

impl MergePolicy for FuzzyMergePolicy<'_> {
    type Open = CompressedBlock;
    type Incoming = CompressedBlock;

    fn decide(&self, last: &CompressedBlock, incoming: &CompressedBlock) -> MergeDecision {
        let gap = gap_minutes(last, incoming);

        if gap > self.config.idle_gap_minutes {
            return MergeDecision::Break;
        }

        // Synthetic breaks only show up here when output is fed back in.
        // They stay separate so a second pass is a fixed point.
        if last.is_break() || incoming.is_break() {
            return MergeDecision::NewBlock;
        }

        if incoming.duration_seconds < self.config.micro_event_secs {
            return MergeDecision::SkipMicro;
        }

        if incoming.project == last.project && gap <= self.config.merge_gap_minutes {
            return MergeDecision::Extend(ExtendReason::SameProject);
        }

        if similarity(&incoming.title, &last.title) > self.config.title_similarity {
            return MergeDecision::Extend(ExtendReason::SimilarTitle);
        }

        MergeDecision::NewBlock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(minute: i64, second: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
            + Duration::minutes(minute)
            + Duration::seconds(second)
    }

    fn block(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        title: &str,
        project: &str,
    ) -> CompressedBlock {
        CompressedBlock {
            start,
            end,
            app_name: "app".into(),
            title: title.into(),
            project: project.into(),
            duration_seconds: (end - start).num_seconds() as f64,
            kind: Default::default(),
        }
    }

    #[test]
    fn long_gap_beats_every_merge_rule() {
        let config = CompressionConfig::default();
        let policy = FuzzyMergePolicy::new(&config);
        let last = block(at(0, 0), at(2, 0), "Inbox", "A");
        // micro, same project and same title, but 4 minutes later
        let next = block(at(6, 0), at(6, 10), "Inbox", "A");
        assert_eq!(policy.decide(&last, &next), MergeDecision::Break);
    }

    #[test]
    fn micro_rule_wins_over_project_mismatch() {
        let config = CompressionConfig::default();
        let policy = FuzzyMergePolicy::new(&config);
        let last = block(at(0, 0), at(5, 0), "Spreadsheet", "A");
        let next = block(at(5, 0), at(5, 20), "Terminal", "B");
        assert_eq!(policy.decide(&last, &next), MergeDecision::SkipMicro);
    }

    #[test]
    fn micro_rule_wins_over_similar_title() {
        let config = CompressionConfig::default();
        let policy = FuzzyMergePolicy::new(&config);
        let last = block(at(0, 0), at(5, 0), "Inbox", "A");
        let next = block(at(5, 0), at(5, 10), "Inbox", "B");
        assert_eq!(policy.decide(&last, &next), MergeDecision::SkipMicro);
    }

    #[test]
    fn same_project_within_gap() {
        let config = CompressionConfig::default();
        let policy = FuzzyMergePolicy::new(&config);
        let last = block(at(0, 0), at(5, 0), "Spreadsheet", "A");
        let next = block(at(7, 0), at(9, 0), "Terminal", "A");
        assert_eq!(
            policy.decide(&last, &next),
            MergeDecision::Extend(ExtendReason::SameProject)
        );
    }

    #[test]
    fn similar_title_across_projects() {
        let config = CompressionConfig::default();
        let policy = FuzzyMergePolicy::new(&config);
        let last = block(at(0, 0), at(5, 0), "main.rs - daytrace", "A");
        let next = block(at(5, 0), at(9, 0), "lib.rs - daytrace", "B");
        assert_eq!(
            policy.decide(&last, &next),
            MergeDecision::Extend(ExtendReason::SimilarTitle)
        );
    }

    #[test]
    fn distinct_work_starts_a_new_block() {
        let config = CompressionConfig::default();
        let policy = FuzzyMergePolicy::new(&config);
        let last = block(at(0, 0), at(5, 0), "Quarterly budget.xlsx", "A");
        let next = block(at(5, 0), at(9, 0), "YouTube - Music", "B");
        assert_eq!(policy.decide(&last, &next), MergeDecision::NewBlock);
    }

    #[test]
    fn synthetic_breaks_never_merge() {
        let config = CompressionConfig::default();
        let policy = FuzzyMergePolicy::new(&config);
        let gap = CompressedBlock::idle_break(at(2, 0), at(10, 0));
        let next = block(at(10, 0), at(10, 5), "Break", "Break");
        assert_eq!(policy.decide(&gap, &next), MergeDecision::NewBlock);
    }

    #[test]
    fn gap_is_fractional() {
        let last = block(at(0, 0), at(1, 0), "a", "A");
        let next = block(at(1, 30), at(2, 0), "b", "A");
        assert_eq!(gap_minutes(&last, &next), 0.5);
    }
}

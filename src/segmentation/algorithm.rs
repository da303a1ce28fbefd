use log::warn;

use crate::models::{CompressedBlock, RawEvent, RawEventPayload};
use crate::segmentation::config::CompressionConfig;
use crate::segmentation::decision::{MergeDecision, MergePolicy};
use crate::segmentation::merge::FuzzyMergePolicy;

/// Blocks produced from a day of stored rows, plus how many rows were unusable.
#[derive(Debug, Clone, Default)]
pub struct Compression {
    pub blocks: Vec<CompressedBlock>,
    pub skipped_rows: usize,
}

/// Compresses one user's events for one day.
pub fn compress_events(events: &[RawEvent], config: &CompressionConfig) -> Vec<CompressedBlock> {
    compress_blocks(events.iter().map(CompressedBlock::from_event).collect(), config)
}

/// Parses stored rows, skipping malformed ones, then compresses them.
pub fn compress_rows(rows: &[RawEventPayload], config: &CompressionConfig) -> Compression {
    let mut skipped_rows = 0;
    let events: Vec<RawEvent> = rows
        .iter()
        .filter_map(|row| match RawEvent::try_from(row) {
            Ok(event) => Some(event),
            Err(err) => {
                skipped_rows += 1;
                warn!("Skipping malformed event {:?}: {err}", row.event_id);
                None
            }
        })
        .collect();

    Compression {
        blocks: compress_events(&events, config),
        skipped_rows,
    }
}

/// Single forward pass over blocks sorted by start time.
///
/// The sort is stable, so ties keep their input order. Feeding the output
/// back in returns it unchanged.
pub fn compress_blocks(
    mut input: Vec<CompressedBlock>,
    config: &CompressionConfig,
) -> Vec<CompressedBlock> {
    input.sort_by_key(|block| block.start);

    let policy = FuzzyMergePolicy::new(config);
    let mut blocks: Vec<CompressedBlock> = Vec::with_capacity(input.len());

    for incoming in input {
        let Some(last) = blocks.last_mut() else {
            blocks.push(incoming);
            continue;
        };

        match policy.decide(last, &incoming) {
            MergeDecision::Break => {
                let gap = CompressedBlock::idle_break(last.end, incoming.start);
                blocks.push(gap);
                blocks.push(incoming);
            }
            MergeDecision::SkipMicro | MergeDecision::Extend(_) => last.absorb(&incoming),
            MergeDecision::NewBlock => blocks.push(incoming),
        }
    }

    blocks
}

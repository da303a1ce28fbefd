/// Thresholds for the retrospective compressor.
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Gaps longer than this become a synthetic break block.
    pub idle_gap_minutes: f64,

    /// Events shorter than this are folded into the previous block.
    pub micro_event_secs: f64,

    /// Same-project events this close together are merged.
    pub merge_gap_minutes: f64,

    /// Titles scoring strictly above this ratio are merged.
    pub title_similarity: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            idle_gap_minutes: 3.0,
            micro_event_secs: 30.0,
            merge_gap_minutes: 5.0,
            title_similarity: 0.55,
        }
    }
}

/// Thresholds for the live segmenter running on the capturing device.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// No input for longer than this puts the segmenter in idle mode.
    pub idle_threshold_secs: f64,

    /// Titles are cut to this many characters before comparison.
    pub max_title_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: super::idle::IDLE_THRESHOLD_SECONDS,
            max_title_chars: 120,
        }
    }
}

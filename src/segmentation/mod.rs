pub mod algorithm;
pub mod config;
pub mod decision;
pub mod idle;
pub mod live;
pub mod merge;
pub mod report;
pub mod similarity;
pub mod summary;

pub use algorithm::{compress_blocks, compress_events, compress_rows, Compression};
pub use config::{CompressionConfig, SegmenterConfig};
pub use decision::{ExtendReason, MergeDecision, MergePolicy};
pub use idle::{is_idle, IdleDetector};
pub use live::{ExactMatchPolicy, LiveSegmenter, SegmenterState};
pub use merge::FuzzyMergePolicy;
pub use report::DailyReport;
pub use similarity::similarity;
pub use summary::summarize;

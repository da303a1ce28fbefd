/// Outcome of comparing an incoming observation with the currently open
/// block. Shared by the live segmenter and the retrospective compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// Grow the open block to cover the incoming one.
    Extend(ExtendReason),
    /// Close the open block; the time before the incoming one is a break.
    Break,
    /// Close the open block and start a new one from the incoming one.
    NewBlock,
    /// The incoming block is too short to stand alone and is folded in.
    SkipMicro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendReason {
    /// Same app and same (truncated) title.
    IdenticalFocus,
    /// Still idle.
    IdleHeartbeat,
    /// Same project, short gap.
    SameProject,
    /// Titles close enough by diff ratio.
    SimilarTitle,
}

impl MergeDecision {
    /// Whether the incoming observation ends up inside the open block.
    pub fn merges(&self) -> bool {
        matches!(self, MergeDecision::Extend(_) | MergeDecision::SkipMicro)
    }
}

/// A merge strategy. Rules are an ordered cascade: the first rule that
/// applies decides.
pub trait MergePolicy {
    type Open;
    type Incoming;

    fn decide(&self, open: &Self::Open, incoming: &Self::Incoming) -> MergeDecision;
}

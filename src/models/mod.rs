pub mod block;
pub mod event;
pub mod project;
pub mod sample;

pub use block::{BlockKind, CompressedBlock};
pub use event::{
    format_timestamp, parse_timestamp, EventBatch, EventError, RawEvent, RawEventPayload,
    UNASSIGNED_PROJECT,
};
pub use project::Project;
pub use sample::{ActiveWindow, Sample};

pub mod event;

pub use event::{IngestReport, StoredEvent};

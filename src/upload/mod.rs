pub mod flusher;
pub mod queue;
pub mod sink;

pub use flusher::{flush_loop, flush_once};
pub use queue::UploadQueue;
pub use sink::{AgentSink, HttpSink, StoreSink, UploadSink};

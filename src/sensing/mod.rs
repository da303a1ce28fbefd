pub mod controller;
pub mod loop_worker;
pub mod source;

pub use controller::AgentController;
pub use loop_worker::{perform_sample, sensing_loop};
pub use source::{parse_feed_line, spawn_reader, FeedSource, FeedState, SampleSource};

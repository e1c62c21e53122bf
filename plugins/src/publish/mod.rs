pub mod jsonl;
pub mod log;

pub use jsonl::{JsonlPublisher, STDOUT_SINK};
pub use log::LogPublisher;

/// Sink value that routes updates to tracing instead of a JSON lines stream.
pub const LOG_SINK: &str = "log";

//! Dead-letter handling and configuration for the Tool Gateway's command
//! execution path.

mod config;
mod dlq;

pub use config::ExecutorConfig;
pub use dlq::{DeadLetterEntry, DeadLetterQueue, DeadLetterSink};

mod config;
mod error;
mod monitor;

pub use config::SafeguardConfig;
pub use error::SafeguardError;
pub use monitor::{SafeguardDecision, SafeguardMonitor};

mod backoff;
mod config;
mod error;
mod supervisor;
mod table;

pub use backoff::next_restart_delay;
pub use config::SupervisorConfig;
pub use error::SupervisorError;
pub use supervisor::Supervisor;
pub use table::WorkerRecord;

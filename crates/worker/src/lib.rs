mod config;
mod error;
mod handler;
mod worker;

pub use config::WorkerConfig;
pub use error::WorkerError;
pub use handler::DomainHandler;
pub use worker::Worker;

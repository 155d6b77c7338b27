use thiserror::Error;

/// Errors raised by the Worker Runtime.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("bus error: {0}")]
    Bus(#[from] hiveguard_bus::BusError),

    #[error("gateway error: {0}")]
    Gateway(#[from] hiveguard_gateway::GatewayError),

    #[error("domain handler for event type {0} failed: {1}")]
    Handler(String, String),
}

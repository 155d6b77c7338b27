use thiserror::Error;

/// Errors raised by the Event Bus Adapter.
#[derive(Debug, Error)]
pub enum BusError {
    /// The published value could not be coerced into the canonical event shape.
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] hiveguard_core::CoreError),

    /// The underlying MailStore reported an error.
    #[error("store error: {0}")]
    Store(#[from] hiveguard_store::StoreError),
}

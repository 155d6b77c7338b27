use thiserror::Error;

/// Errors raised by the durable MailStore.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying SQLite connection reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The requested event does not exist.
    #[error("event {0} not found")]
    EventNotFound(i64),

    /// `ack`/`fail`/`requeue` was called by a consumer that does not hold
    /// the live lease for this event.
    #[error("consumer {consumer} does not hold the lease for event {event_id}")]
    LeaseMismatch { event_id: i64, consumer: String },

    /// The event has no live lease at all (already acked, failed, or never claimed).
    #[error("event {0} has no live lease")]
    NoLease(i64),

    /// A blocking database task panicked or was cancelled.
    #[error("store task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

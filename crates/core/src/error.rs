use thiserror::Error;

/// Errors raised while constructing or validating core domain types.
///
/// These are always validation failures — they fail synchronously and are
/// never persisted, per the error handling design in `spec.md` §7.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An event was constructed or coerced without a non-empty `type` field.
    #[error("event type must be a non-empty token")]
    EmptyEventType,

    /// An event was constructed or coerced without a non-empty `origin_id`.
    #[error("event origin_id must be non-empty")]
    EmptyOriginId,

    /// The input could not be coerced into the canonical event shape.
    #[error("cannot coerce value into an event: {0}")]
    NotCoercible(String),
}

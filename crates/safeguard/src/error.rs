use thiserror::Error;

/// Errors raised by the Safeguard Monitor. Policy denials are not errors —
/// they are represented by [`crate::SafeguardDecision`] — this type covers
/// only programmer-level misuse.
#[derive(Debug, Error)]
pub enum SafeguardError {
    #[error("empty action key")]
    EmptyActionKey,
}

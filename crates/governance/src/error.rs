use thiserror::Error;

/// Errors raised by the Governance Engine.
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("ledger io error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Fatal per spec.md §7: the engine refuses to append further once the
    /// chain fails to verify.
    #[error("ledger chain is invalid at seq {0}")]
    ChainInvalid(u64),
}

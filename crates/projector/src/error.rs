use thiserror::Error;

/// Errors raised by the Projection Materializer.
#[derive(Debug, Error)]
pub enum ProjectorError {
    #[error("store error: {0}")]
    Store(#[from] hiveguard_store::StoreError),

    #[error("view io error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("view serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

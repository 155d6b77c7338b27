use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the Workspace Manager.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("agent {0} has no registered workspace")]
    NotFound(String),

    #[error("workspace for {agent} is dirty: {detail}")]
    Dirty { agent: String, detail: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

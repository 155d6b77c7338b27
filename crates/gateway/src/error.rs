use thiserror::Error;

/// Errors raised by the Tool Gateway.
///
/// Policy denials are not represented here — they are a normal, audited
/// [`ActionResult`](crate::ActionResult) with `allowed = false` (spec.md
/// §7: "policy denials ... are not retried by the gateway"). This enum is
/// reserved for failures that prevent the gateway from even producing a
/// result — a broken store, an unregistered workspace, or I/O failure while
/// spawning the command.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("store error: {0}")]
    Store(#[from] hiveguard_store::StoreError),

    #[error("workspace error: {0}")]
    Workspace(#[from] hiveguard_workspace::WorkspaceError),

    #[error("failed to spawn command: {0}")]
    Spawn(#[from] std::io::Error),
}

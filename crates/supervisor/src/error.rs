use thiserror::Error;

/// Errors raised by the Supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("bus error: {0}")]
    Bus(#[from] hiveguard_bus::BusError),

    #[error("failed to spawn worker process for {agent_id}: {source}")]
    Spawn {
        agent_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown agent: {0}")]
    UnknownAgent(String),
}

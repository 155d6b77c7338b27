use std::time::Duration;

/// Tunables for the supervisor's liveness and restart policy (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub heartbeat_interval_seconds: u64,
    pub heartbeat_timeout_seconds: u64,
    /// Rolling window, in seconds, used when deciding whether a worker has
    /// restarted too often to keep respawning.
    pub restart_window_seconds: i64,
    pub restart_window_limit: u32,
    pub max_restarts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub lease_seconds: i64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: 10,
            heartbeat_timeout_seconds: 30,
            restart_window_seconds: 300,
            restart_window_limit: 5,
            max_restarts: 10,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(60),
            lease_seconds: 30,
        }
    }
}

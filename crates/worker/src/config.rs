use std::time::Duration;

/// Tunables for one worker's claim/dispatch loop (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long a single `claim_next_event` call may block.
    pub claim_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub lease_seconds: i64,
    /// Whether this worker also claims events with no `target_agent`.
    pub include_unrouted: bool,
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            claim_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(10),
            lease_seconds: 30,
            include_unrouted: false,
            poll_interval: Duration::from_millis(250),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_defaults() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.lease_seconds, 30);
        assert!(!cfg.include_unrouted);
    }
}

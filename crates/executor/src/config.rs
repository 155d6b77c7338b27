use std::time::Duration;

/// Configuration for gateway command execution: per-call timeout and the
/// concurrency cap enforced via a [`tokio::sync::Semaphore`] (spec.md §4.4).
///
/// # Examples
///
/// ```
/// use hiveguard_executor::ExecutorConfig;
///
/// let config = ExecutorConfig::default();
/// assert_eq!(config.command_timeout, std::time::Duration::from_secs(15));
/// ```
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum wall-clock time allowed for a single gateway command.
    pub command_timeout: Duration,
    /// Maximum number of gateway commands that may execute concurrently.
    pub max_concurrent: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(15),
            max_concurrent: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ExecutorConfig::default();
        assert_eq!(cfg.command_timeout, Duration::from_secs(15));
        assert_eq!(cfg.max_concurrent, 8);
    }

    #[test]
    fn config_custom_values() {
        let cfg = ExecutorConfig {
            command_timeout: Duration::from_secs(60),
            max_concurrent: 2,
        };
        assert_eq!(cfg.max_concurrent, 2);
    }
}

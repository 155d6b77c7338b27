/// Tunables for the Governance Engine (spec.md §4.8).
#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    pub success_step: f64,
    pub failure_step: f64,
    pub escalation_penalty: f64,
    /// Water-cooler lessons trigger only at or below this stress level.
    pub idle_threshold: f64,
    /// Rolling window, in samples, used by the stability metric.
    pub stability_window: usize,
    /// Boardroom arbitration passes when the aggregate decision score is at
    /// least this value.
    pub arbitration_threshold: f64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            success_step: 0.05,
            failure_step: 0.05,
            escalation_penalty: 0.05,
            idle_threshold: 0.2,
            stability_window: 5,
            arbitration_threshold: 0.35,
        }
    }
}

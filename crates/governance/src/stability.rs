use hiveguard_core::GovernanceRegistry;

/// Population variance (not sample variance) of `samples`.
#[must_use]
pub fn population_variance(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64
}

/// Mean of per-agent population variance over the last `window` reputation
/// samples (spec.md §4.8 step 4). Agents are always present in `history`
/// once `record_history` has run for them at least once.
#[must_use]
pub fn stability_metric(registry: &GovernanceRegistry, window: usize) -> f64 {
    if registry.history.is_empty() {
        return 0.0;
    }
    let variances: Vec<f64> = registry
        .history
        .values()
        .map(|samples| {
            let tail: Vec<f64> = samples.iter().rev().take(window).map(|s| s.score).collect();
            population_variance(&tail)
        })
        .collect();
    variances.iter().sum::<f64>() / variances.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn population_variance_of_constant_series_is_zero() {
        assert_eq!(population_variance(&[0.5, 0.5, 0.5]), 0.0);
    }

    #[test]
    fn population_variance_of_empty_series_is_zero() {
        assert_eq!(population_variance(&[]), 0.0);
    }

    #[test]
    fn stability_metric_averages_across_agents() {
        let mut registry = GovernanceRegistry::new();
        registry.ensure_agent("recon", "scout");
        registry.ensure_agent("forge", "builder");
        for score in [0.5, 0.5, 0.5] {
            registry.record_history("recon", Utc::now(), score);
        }
        for score in [0.2, 0.8] {
            registry.record_history("forge", Utc::now(), score);
        }
        let metric = stability_metric(&registry, 5);
        assert!(metric > 0.0);
    }
}

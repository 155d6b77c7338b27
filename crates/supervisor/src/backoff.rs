use std::time::Duration;

/// `min(cap, base * 2^(restart_count-1))` (spec.md §4.5 restart logic).
/// `restart_count` is 1-based; a value of 0 is treated as 1.
#[must_use]
pub fn next_restart_delay(base: Duration, cap: Duration, restart_count: u32) -> Duration {
    let exponent = restart_count.saturating_sub(1).min(20);
    let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(cap).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_restart_uses_base_delay() {
        let d = next_restart_delay(Duration::from_secs(1), Duration::from_secs(60), 1);
        assert_eq!(d, Duration::from_secs(1));
    }

    #[test]
    fn delay_doubles_each_restart() {
        assert_eq!(
            next_restart_delay(Duration::from_secs(1), Duration::from_secs(60), 3),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn delay_is_capped() {
        assert_eq!(
            next_restart_delay(Duration::from_secs(1), Duration::from_secs(10), 10),
            Duration::from_secs(10)
        );
    }
}

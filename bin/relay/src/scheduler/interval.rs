//! Exploration pacing

use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// Base interval from the requested travel duration
pub fn base_interval_secs(duration_secs: u64) -> u64 {
    if duration_secs <= HOUR {
        5 * MINUTE
    } else if duration_secs <= 6 * HOUR {
        15 * MINUTE
    } else {
        30 * MINUTE
    }
}

/// Busier chains get shorter intervals. `None` means the tx count read failed.
pub fn activity_factor(latest_block_tx_count: Option<usize>) -> f64 {
    match latest_block_tx_count {
        None => 1.0,
        Some(n) if n > 100 => 0.6,
        Some(n) if n > 50 => 0.8,
        Some(n) if n > 20 => 1.0,
        Some(_) => 1.2,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntervalPolicy {
    pub testing_mode: bool,
    pub testing_interval_secs: u64,
}

impl IntervalPolicy {
    /// Time the frog waits between explorations, floored to whole minutes
    pub fn interval(
        &self,
        duration_secs: u64,
        latest_block_tx_count: Option<usize>,
        chain_multiplier: f64,
    ) -> Duration {
        if self.testing_mode {
            return Duration::from_secs(self.testing_interval_secs);
        }
        let base = base_interval_secs(duration_secs) as f64;
        let scaled = base * activity_factor(latest_block_tx_count) * chain_multiplier;
        let minutes = (scaled / MINUTE as f64).floor().max(1.0) as u64;
        Duration::from_secs(minutes * MINUTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: IntervalPolicy = IntervalPolicy {
        testing_mode: false,
        testing_interval_secs: 60,
    };

    #[test]
    fn test_duration_tiers() {
        assert_eq!(base_interval_secs(30 * MINUTE), 5 * MINUTE);
        assert_eq!(base_interval_secs(HOUR), 5 * MINUTE);
        assert_eq!(base_interval_secs(HOUR + 1), 15 * MINUTE);
        assert_eq!(base_interval_secs(6 * HOUR), 15 * MINUTE);
        assert_eq!(base_interval_secs(24 * HOUR), 30 * MINUTE);
        assert_eq!(base_interval_secs(72 * HOUR), 30 * MINUTE);
    }

    #[test]
    fn test_activity_factor_thresholds() {
        assert_eq!(activity_factor(Some(150)), 0.6);
        assert_eq!(activity_factor(Some(101)), 0.6);
        assert_eq!(activity_factor(Some(100)), 0.8);
        assert_eq!(activity_factor(Some(51)), 0.8);
        assert_eq!(activity_factor(Some(50)), 1.0);
        assert_eq!(activity_factor(Some(20)), 1.2);
        assert_eq!(activity_factor(Some(0)), 1.2);
        assert_eq!(activity_factor(None), 1.0);
    }

    #[test]
    fn test_interval_floors_to_minutes() {
        // 5min * 1.2 * 1.1 = 6.6min
        let interval = POLICY.interval(HOUR, Some(3), 1.1);
        assert_eq!(interval, Duration::from_secs(6 * MINUTE));

        // 30min * 0.6 * 1.5 = 27min
        let interval = POLICY.interval(48 * HOUR, Some(500), 1.5);
        assert_eq!(interval, Duration::from_secs(27 * MINUTE));
    }

    #[test]
    fn test_testing_mode_ignores_activity() {
        let policy = IntervalPolicy {
            testing_mode: true,
            testing_interval_secs: 60,
        };
        assert_eq!(policy.interval(48 * HOUR, Some(0), 1.5), Duration::from_secs(60));
    }
}

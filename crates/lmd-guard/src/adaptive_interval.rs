//! The adaptive interval function from §4.5, kept here alongside the
//! CircuitBreaker and peak-hours logic it composes with.

use lmd_schemas::{AdaptivePolicy, CircuitBreakerState, IntervalBounds};

/// `nextInterval(target)`, clamped into `[minInterval, maxInterval]`.
pub fn next_interval_secs(
    bounds: &IntervalBounds,
    policy: &AdaptivePolicy,
    current_change_rate: f64,
    consecutive_failures: u32,
    is_peak_hours: bool,
    circuit_breaker_state: CircuitBreakerState,
) -> u64 {
    let base = bounds.base_interval_secs as f64;
    let mut interval = if current_change_rate > policy.change_threshold {
        (base / policy.activity_boost).max(bounds.min_interval_secs as f64)
    } else if current_change_rate == 0.0 && consecutive_failures == 0 {
        (base * policy.stability_bonus).min(bounds.max_interval_secs as f64)
    } else {
        base
    };

    if !is_peak_hours {
        interval = (interval * 1.5).min(bounds.max_interval_secs as f64);
    }
    if circuit_breaker_state == CircuitBreakerState::Open {
        interval = (interval * 2.0).min(bounds.max_interval_secs as f64);
    }

    bounds.clamp_secs(interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> IntervalBounds {
        IntervalBounds { base_interval_secs: 300, min_interval_secs: 60, max_interval_secs: 3600 }
    }

    #[test]
    fn result_is_always_within_bounds() {
        let bounds = bounds();
        let policy = AdaptivePolicy::default();
        for rate in [0.0, 0.5, 1.0, 5.0, 100.0] {
            for failures in [0, 1, 5] {
                for peak in [true, false] {
                    for cb in [
                        CircuitBreakerState::Closed,
                        CircuitBreakerState::Open,
                        CircuitBreakerState::HalfOpen,
                    ] {
                        let secs = next_interval_secs(&bounds, &policy, rate, failures, peak, cb);
                        assert!(secs >= bounds.min_interval_secs);
                        assert!(secs <= bounds.max_interval_secs);
                    }
                }
            }
        }
    }

    #[test]
    fn quiet_target_with_no_failures_gets_longer_interval() {
        let bounds = bounds();
        let policy = AdaptivePolicy::default();
        let secs = next_interval_secs(&bounds, &policy, 0.0, 0, true, CircuitBreakerState::Closed);
        assert!(secs as f64 > bounds.base_interval_secs as f64);
    }

    #[test]
    fn active_target_above_threshold_gets_shorter_interval() {
        let bounds = bounds();
        let policy = AdaptivePolicy::default();
        let secs = next_interval_secs(&bounds, &policy, 10.0, 0, true, CircuitBreakerState::Closed);
        assert!((secs as f64) < bounds.base_interval_secs as f64);
    }

    #[test]
    fn open_circuit_breaker_doubles_interval() {
        let bounds = bounds();
        let policy = AdaptivePolicy::default();
        let closed = next_interval_secs(&bounds, &policy, 0.5, 0, true, CircuitBreakerState::Closed);
        let open = next_interval_secs(&bounds, &policy, 0.5, 0, true, CircuitBreakerState::Open);
        assert!(open >= closed);
    }
}

//! Per-target circuit breaking (§4.3).
//!
//! Pure functions operating on a [`CircuitBreakerRuntime`] value the caller
//! owns and persists with the target — mirrors the sticky-state pattern used
//! elsewhere in this codebase: callers check `allow` before doing work, then
//! report the outcome via `record_success`/`record_failure`.

use chrono::{DateTime, Utc};
use lmd_schemas::{CircuitBreakerRuntime, CircuitBreakerState};

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_duration_secs: i64,
    pub half_open_probe: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, open_duration_secs: 60, half_open_probe: 3 }
    }
}

/// Whether a poll may proceed right now. `HALF_OPEN` allows exactly one
/// concurrent probe; `allow` marks `half_open_probe_in_flight` when it grants
/// one so a second caller sees it refused.
pub fn allow(state: &mut CircuitBreakerRuntime, cfg: &CircuitBreakerConfig, now: DateTime<Utc>) -> bool {
    match state.state {
        CircuitBreakerState::Closed => true,
        CircuitBreakerState::Open => {
            let opened_at = match state.opened_at {
                Some(t) => t,
                None => return true,
            };
            if now >= opened_at + chrono::Duration::seconds(cfg.open_duration_secs) {
                state.state = CircuitBreakerState::HalfOpen;
                state.half_open_successes = 0;
                state.half_open_probe_in_flight = true;
                true
            } else {
                false
            }
        }
        CircuitBreakerState::HalfOpen => {
            if state.half_open_probe_in_flight {
                false
            } else {
                state.half_open_probe_in_flight = true;
                true
            }
        }
    }
}

pub fn record_success(state: &mut CircuitBreakerRuntime, cfg: &CircuitBreakerConfig) {
    state.half_open_probe_in_flight = false;
    match state.state {
        CircuitBreakerState::Closed => {
            state.consecutive_failures = state.consecutive_failures.saturating_sub(1);
        }
        CircuitBreakerState::HalfOpen => {
            state.half_open_successes += 1;
            if state.half_open_successes >= cfg.half_open_probe {
                state.state = CircuitBreakerState::Closed;
                state.consecutive_failures = 0;
                state.opened_at = None;
                state.half_open_successes = 0;
            }
        }
        CircuitBreakerState::Open => {
            // A success can't observably occur while OPEN denies traffic;
            // treat it as a no-op rather than panicking on a logic error
            // elsewhere in the caller.
        }
    }
}

pub fn record_failure(state: &mut CircuitBreakerRuntime, cfg: &CircuitBreakerConfig, now: DateTime<Utc>) {
    state.half_open_probe_in_flight = false;
    match state.state {
        CircuitBreakerState::Closed => {
            state.consecutive_failures += 1;
            if state.consecutive_failures >= cfg.failure_threshold {
                state.state = CircuitBreakerState::Open;
                state.opened_at = Some(now);
            }
        }
        CircuitBreakerState::HalfOpen => {
            state.state = CircuitBreakerState::Open;
            state.opened_at = Some(now);
            state.half_open_successes = 0;
        }
        CircuitBreakerState::Open => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_threshold_failures_trips_breaker() {
        let mut state = CircuitBreakerRuntime::default();
        let cfg = CircuitBreakerConfig::default();
        let now = Utc::now();
        for _ in 0..cfg.failure_threshold - 1 {
            record_failure(&mut state, &cfg, now);
            assert_eq!(state.state, CircuitBreakerState::Closed);
        }
        record_failure(&mut state, &cfg, now);
        assert_eq!(state.state, CircuitBreakerState::Open);
    }

    #[test]
    fn open_refuses_until_duration_elapses_then_probes_once() {
        let mut state = CircuitBreakerRuntime::default();
        let cfg = CircuitBreakerConfig::default();
        let now = Utc::now();
        for _ in 0..cfg.failure_threshold {
            record_failure(&mut state, &cfg, now);
        }
        assert!(!allow(&mut state, &cfg, now + chrono::Duration::seconds(10)));

        let after_open = now + chrono::Duration::seconds(cfg.open_duration_secs + 1);
        assert!(allow(&mut state, &cfg, after_open));
        assert_eq!(state.state, CircuitBreakerState::HalfOpen);
        // A second concurrent probe is refused.
        assert!(!allow(&mut state, &cfg, after_open));
    }

    #[test]
    fn three_consecutive_successes_close_from_half_open() {
        let mut state = CircuitBreakerRuntime::default();
        let cfg = CircuitBreakerConfig::default();
        let now = Utc::now();
        for _ in 0..cfg.failure_threshold {
            record_failure(&mut state, &cfg, now);
        }
        let after_open = now + chrono::Duration::seconds(cfg.open_duration_secs + 1);
        assert!(allow(&mut state, &cfg, after_open));
        for _ in 0..cfg.half_open_probe {
            record_success(&mut state, &cfg);
        }
        assert_eq!(state.state, CircuitBreakerState::Closed);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn any_failure_in_half_open_reopens() {
        let mut state = CircuitBreakerRuntime::default();
        let cfg = CircuitBreakerConfig::default();
        let now = Utc::now();
        for _ in 0..cfg.failure_threshold {
            record_failure(&mut state, &cfg, now);
        }
        let after_open = now + chrono::Duration::seconds(cfg.open_duration_secs + 1);
        assert!(allow(&mut state, &cfg, after_open));
        record_failure(&mut state, &cfg, after_open);
        assert_eq!(state.state, CircuitBreakerState::Open);
    }
}

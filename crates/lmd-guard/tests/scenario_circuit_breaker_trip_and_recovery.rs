use chrono::Utc;
use lmd_guard::circuit_breaker::{allow, record_failure, record_success, CircuitBreakerConfig};
use lmd_schemas::{CircuitBreakerRuntime, CircuitBreakerState};

#[test]
fn five_failures_trip_then_recover_after_three_probes() {
    let mut state = CircuitBreakerRuntime::default();
    let cfg = CircuitBreakerConfig::default();
    let now = Utc::now();

    for _ in 0..5 {
        record_failure(&mut state, &cfg, now);
    }
    assert_eq!(state.state, CircuitBreakerState::Open);

    // Sixth poll attempt is skipped.
    assert!(!allow(&mut state, &cfg, now + chrono::Duration::seconds(10)));

    let after_open = now + chrono::Duration::seconds(cfg.open_duration_secs + 1);
    assert!(allow(&mut state, &cfg, after_open));
    assert_eq!(state.state, CircuitBreakerState::HalfOpen);

    record_success(&mut state, &cfg);
    record_success(&mut state, &cfg);
    assert_eq!(state.state, CircuitBreakerState::HalfOpen);
    record_success(&mut state, &cfg);
    assert_eq!(state.state, CircuitBreakerState::Closed);
}

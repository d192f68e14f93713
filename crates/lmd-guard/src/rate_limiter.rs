//! Per-domain sliding-window rate limiting (§4.2).
//!
//! Counters are protected by a per-domain mutex; no lock is held across I/O.
//! The `active_bursts` field is a simple counter bounded by `policy.burst`,
//! held for the duration of an outbound request by the caller via
//! [`BurstGuard`].

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use lmd_schemas::RateLimitPolicy;

#[derive(Debug, Default)]
struct DomainWindow {
    minute: VecDeque<DateTime<Utc>>,
    hour: VecDeque<DateTime<Utc>>,
    active_bursts: u32,
}

pub struct RateLimitDecision {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

/// Shared across all scheduler tasks; one instance per engine.
pub struct RateLimiter {
    domains: Mutex<HashMap<String, DomainWindow>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { domains: Mutex::new(HashMap::new()) }
    }

    /// `Allow(domain, policy) -> (ok, retryAfter)`.
    pub fn allow(&self, domain: &str, policy: &RateLimitPolicy, now: DateTime<Utc>) -> RateLimitDecision {
        let mut domains = self.domains.lock().unwrap();
        let window = domains.entry(domain.to_string()).or_default();

        let minute_cutoff = now - chrono::Duration::seconds(60);
        let hour_cutoff = now - chrono::Duration::seconds(3600);
        window.minute.retain(|ts| *ts >= minute_cutoff);
        window.hour.retain(|ts| *ts >= hour_cutoff);

        if window.minute.len() as u32 >= policy.per_minute {
            let oldest = *window.minute.front().unwrap();
            let retry_after = (oldest + chrono::Duration::seconds(60) - now)
                .num_seconds()
                .max(1) as u64;
            return RateLimitDecision { allowed: false, retry_after_secs: retry_after };
        }
        if window.hour.len() as u32 >= policy.per_hour {
            let oldest = *window.hour.front().unwrap();
            let retry_after = (oldest + chrono::Duration::seconds(3600) - now)
                .num_seconds()
                .max(1) as u64;
            return RateLimitDecision { allowed: false, retry_after_secs: retry_after };
        }
        if window.active_bursts >= policy.burst {
            return RateLimitDecision { allowed: false, retry_after_secs: 1 };
        }

        window.minute.push_back(now);
        window.hour.push_back(now);
        window.active_bursts += 1;
        RateLimitDecision { allowed: true, retry_after_secs: 0 }
    }

    /// Release a burst slot acquired by a successful [`Self::allow`] call.
    pub fn release_burst(&self, domain: &str) {
        let mut domains = self.domains.lock().unwrap();
        if let Some(window) = domains.get_mut(domain) {
            window.active_bursts = window.active_bursts.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn n_plus_one_request_within_60s_is_denied() {
        let limiter = RateLimiter::new();
        let policy = RateLimitPolicy { per_minute: 3, per_hour: 1000, burst: 100 };
        let now = Utc::now();
        for _ in 0..3 {
            let decision = limiter.allow("example.test", &policy, now);
            assert!(decision.allowed);
            limiter.release_burst("example.test");
        }
        let denied = limiter.allow("example.test", &policy, now);
        assert!(!denied.allowed);
        assert!(denied.retry_after_secs > 0);
    }

    #[test]
    fn window_rolls_off_after_sixty_seconds() {
        let limiter = RateLimiter::new();
        let policy = RateLimitPolicy { per_minute: 1, per_hour: 1000, burst: 100 };
        let now = Utc::now();
        assert!(limiter.allow("example.test", &policy, now).allowed);
        let later = now + chrono::Duration::seconds(61);
        assert!(limiter.allow("example.test", &policy, later).allowed);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::listing::CHANGES_RETENTION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        CircuitBreakerState::Closed
    }
}

/// Interval bounds in seconds. Invariant: `min <= base <= max`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntervalBounds {
    pub base_interval_secs: u64,
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
}

impl IntervalBounds {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_interval_secs <= self.base_interval_secs
            && self.base_interval_secs <= self.max_interval_secs
        {
            Ok(())
        } else {
            Err(format!(
                "interval bounds violate min <= base <= max: min={} base={} max={}",
                self.min_interval_secs, self.base_interval_secs, self.max_interval_secs
            ))
        }
    }

    pub fn clamp_secs(&self, secs: f64) -> u64 {
        let clamped = secs
            .max(self.min_interval_secs as f64)
            .min(self.max_interval_secs as f64);
        clamped.round() as u64
    }
}

/// Governs the adaptive polling interval. `stability_bonus` is required to be
/// in `(0.0, 1.0]` — see the Design Notes decision on this Open Question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdaptivePolicy {
    pub change_threshold: f64,
    pub stability_bonus: f64,
    pub activity_boost: f64,
    pub learning_window_hours: u64,
}

impl AdaptivePolicy {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.stability_bonus > 0.0 && self.stability_bonus <= 1.0) {
            return Err(format!(
                "stability_bonus must be in (0, 1], got {}",
                self.stability_bonus
            ));
        }
        if self.activity_boost < 1.0 {
            return Err(format!(
                "activity_boost must be >= 1, got {}",
                self.activity_boost
            ));
        }
        Ok(())
    }
}

impl Default for AdaptivePolicy {
    fn default() -> Self {
        Self {
            change_threshold: 1.0,
            stability_bonus: 0.8,
            activity_boost: 2.0,
            learning_window_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub per_minute: u32,
    pub per_hour: u32,
    pub burst: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self { per_minute: 20, per_hour: 600, burst: 3 }
    }
}

/// Runtime state of a target's circuit breaker, persisted alongside it so it
/// survives restarts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitBreakerRuntime {
    pub state: CircuitBreakerState,
    pub consecutive_failures: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub half_open_successes: u32,
    pub half_open_probe_in_flight: bool,
}

impl Default for CircuitBreakerRuntime {
    fn default() -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_successes: 0,
            half_open_probe_in_flight: false,
        }
    }
}

/// A single poll-outcome entry used to derive `current_change_rate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollHistoryEntry {
    pub polled_at: DateTime<Utc>,
    pub changes_detected: u32,
}

/// Governs which tracked-field differences are worth an event. Not part of
/// `AdaptivePolicy` — it filters change *significance*, not poll *timing*.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffPolicy {
    pub min_significance: f64,
    /// Field names skipped entirely during diffing regardless of change.
    pub ignore_fields: Vec<String>,
}

impl Default for DiffPolicy {
    fn default() -> Self {
        Self { min_significance: 0.1, ignore_fields: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingTarget {
    pub id: String,
    pub url: String,
    pub domain: String,
    pub intervals: IntervalBounds,
    pub adaptive_policy: AdaptivePolicy,
    pub rate_limit_policy: RateLimitPolicy,
    pub tracked_fields: Vec<String>,
    pub diff_policy: DiffPolicy,
    pub grace_period_secs: u64,
    pub enabled: bool,

    pub last_polled_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub circuit_breaker: CircuitBreakerRuntime,
    pub current_change_rate: f64,
    pub change_history: Vec<PollHistoryEntry>,
}

impl PollingTarget {
    pub fn new(id: String, url: String, tracked_fields: Vec<String>) -> anyhow::Result<Self> {
        let domain = domain_of(&url)?;
        let intervals = IntervalBounds {
            base_interval_secs: 300,
            min_interval_secs: 60,
            max_interval_secs: 3600,
        };
        intervals.validate().map_err(anyhow::Error::msg)?;
        Ok(Self {
            id,
            url,
            domain,
            intervals,
            adaptive_policy: AdaptivePolicy::default(),
            rate_limit_policy: RateLimitPolicy::default(),
            tracked_fields,
            diff_policy: DiffPolicy::default(),
            grace_period_secs: 300,
            enabled: true,
            last_polled_at: None,
            last_success_at: None,
            consecutive_failures: 0,
            circuit_breaker: CircuitBreakerRuntime::default(),
            current_change_rate: 0.0,
            change_history: Vec::new(),
        })
    }

    /// Push a poll-history entry and recompute `current_change_rate` from the
    /// last hour of history, then trim history beyond [`CHANGES_RETENTION`].
    pub fn record_poll(&mut self, now: DateTime<Utc>, changes_detected: u32) {
        self.change_history.push(PollHistoryEntry { polled_at: now, changes_detected });
        let cutoff = now - CHANGES_RETENTION;
        self.change_history.retain(|e| e.polled_at >= cutoff);

        let hour_ago = now - chrono::Duration::hours(1);
        self.current_change_rate = self
            .change_history
            .iter()
            .filter(|e| e.polled_at >= hour_ago)
            .map(|e| e.changes_detected as f64)
            .sum();
    }
}

/// Extract the host portion of a target URL, used as the rate-limiting and
/// circuit-breaking domain key.
pub fn domain_of(url: &str) -> anyhow::Result<String> {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);
    let host = host.split('@').last().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    if host.is_empty() {
        anyhow::bail!("cannot derive domain from url: {url}");
    }
    Ok(host.to_ascii_lowercase())
}

use std::time::Duration;

use lmd_guard::PeakHours;

/// Scheduler-wide tunables (§4.5). Per-target policy (intervals, adaptive
/// policy, rate limits) lives on the `PollingTarget` itself.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent_polls: usize,
    pub poll_interval: Duration,
    pub reconciliation_interval: Duration,
    pub watchdog_interval: Duration,
    /// A task older than this is forcibly evicted from `active` so it stops
    /// holding a concurrency slot; the task itself is not cancelled.
    pub task_ceiling: Duration,
    pub drain_deadline: Duration,
    pub fetch_timeout: Duration,
    pub peak_hours: PeakHours,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_polls: 10,
            poll_interval: Duration::from_secs(5),
            reconciliation_interval: Duration::from_secs(24 * 3600),
            watchdog_interval: Duration::from_secs(30),
            task_ceiling: Duration::from_secs(5 * 60),
            drain_deadline: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(30),
            peak_hours: PeakHours::default(),
        }
    }
}

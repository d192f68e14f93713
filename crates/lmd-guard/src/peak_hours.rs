//! Operator-configured peak-hours window used by the adaptive interval
//! function (§4.5): outside peak hours the computed interval is stretched.

use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy)]
pub struct PeakHours {
    pub start_hour: u32,
    pub end_hour: u32,
    pub timezone: Tz,
}

impl Default for PeakHours {
    fn default() -> Self {
        Self { start_hour: 8, end_hour: 22, timezone: chrono_tz::UTC }
    }
}

impl PeakHours {
    /// `[start_hour, end_hour)` in local time, per §4.5's `peakHours(now)`.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = self.timezone.from_utc_datetime(&now.naive_utc());
        let hour = local.hour();
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            // Wraps past midnight, e.g. 20..6.
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

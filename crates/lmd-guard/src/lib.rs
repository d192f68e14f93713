pub mod adaptive_interval;
pub mod circuit_breaker;
pub mod peak_hours;
pub mod rate_limiter;

pub use adaptive_interval::next_interval_secs;
pub use circuit_breaker::CircuitBreakerConfig;
pub use peak_hours::PeakHours;
pub use rate_limiter::{RateLimitDecision, RateLimiter};

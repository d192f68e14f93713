//! Exponential backoff with full jitter (§4.6).

use std::time::Duration;

use lmd_schemas::RetryPolicy;
use rand::Rng;

/// `min(maxBackoff, baseBackoff * 2^attempt)`, then a uniform-random draw in
/// `[0, that]` so concurrent retries don't all wake up at once.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exp = policy.base_backoff_secs.saturating_mul(1u64 << attempt.min(20));
    let capped = exp.min(policy.max_backoff_secs);
    let jittered = rand::thread_rng().gen_range(0..=capped.max(1));
    Duration::from_secs(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_never_exceeds_max_backoff() {
        let policy = RetryPolicy { max_retries: 5, base_backoff_secs: 1, max_backoff_secs: 10 };
        for attempt in 0..10 {
            let delay = backoff_delay(&policy, attempt);
            assert!(delay.as_secs() <= policy.max_backoff_secs);
        }
    }
}

/// The seven error kinds the engine distinguishes at I/O boundaries.
///
/// Propagation policy: recoverable kinds never abort the process; only
/// [`EngineError::Config`] or a catastrophic init failure is allowed to
/// reach the host binary's `main`.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// Network timeout, 5xx, DNS failure. CircuitBreaker records a failure.
    TransientFetch { target_id: String, detail: String },
    /// Per-domain budget exhausted. Not a CircuitBreaker failure.
    RateLimited { domain: String, retry_after_secs: u64 },
    /// Fetcher returned unparseable data.
    Parse { target_id: String, detail: String },
    /// Persistence unavailable. Fatal to the current cycle.
    Store { detail: String },
    /// Subscriber delivery failed.
    Delivery { subscriber_id: String, event_id: String, detail: String },
    /// Invalid target/subscriber at registration. Surfaced synchronously,
    /// never enqueued.
    Config { detail: String },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::TransientFetch { target_id, detail } => {
                write!(f, "transient fetch error for target {target_id}: {detail}")
            }
            EngineError::RateLimited { domain, retry_after_secs } => write!(
                f,
                "rate limited for domain {domain}, retry after {retry_after_secs}s"
            ),
            EngineError::Parse { target_id, detail } => {
                write!(f, "parse error for target {target_id}: {detail}")
            }
            EngineError::Store { detail } => write!(f, "store error: {detail}"),
            EngineError::Delivery { subscriber_id, event_id, detail } => write!(
                f,
                "delivery error: subscriber={subscriber_id} event={event_id}: {detail}"
            ),
            EngineError::Config { detail } => write!(f, "config error: {detail}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    /// Whether a CircuitBreaker should record a failure for this error kind.
    /// `RateLimited` is explicitly excluded — see §7.
    pub fn trips_circuit_breaker(&self) -> bool {
        matches!(
            self,
            EngineError::TransientFetch { .. } | EngineError::Parse { .. }
        )
    }
}

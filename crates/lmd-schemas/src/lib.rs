pub mod error;
pub mod event;
pub mod fetcher;
pub mod hash;
pub mod listing;
pub mod subscriber;
pub mod target;

pub use error::EngineError;
pub use event::{ChangeEvent, ChangeType, ChangedField, EventStatus, EventType, SignificanceBucket};
pub use fetcher::{FetchResult, Fetcher, RawListing};
pub use listing::{CanonicalListing, ChangeHistoryEntry, ListingStatus, CHANGES_RETENTION};
pub use subscriber::{RetryPolicy, Subscriber, SubscriberType};
pub use target::{
    domain_of, AdaptivePolicy, CircuitBreakerRuntime, CircuitBreakerState, DiffPolicy,
    IntervalBounds, PollHistoryEntry, PollingTarget, RateLimitPolicy,
};

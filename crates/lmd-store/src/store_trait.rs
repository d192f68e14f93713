use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use lmd_schemas::{CanonicalListing, ChangeEvent, EventStatus, PollingTarget, Subscriber};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Processed,
    Failed,
}

/// Persists canonical listings, polling targets, subscribers, and the event
/// outbox. `Store` is the only writer of persistent state; all other
/// components hold short-lived read views (§3 Ownership).
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn get_listing(&self, source: &str, listing_id: &str) -> Result<Option<CanonicalListing>>;
    async fn list_listings(&self, source: &str) -> Result<Vec<CanonicalListing>>;
    async fn upsert_listing(&self, listing: &CanonicalListing) -> Result<()>;
    async fn mark_listing_removed(&self, source: &str, listing_id: &str, detected_at: DateTime<Utc>) -> Result<()>;

    async fn get_target(&self, id: &str) -> Result<Option<PollingTarget>>;
    async fn list_targets(&self) -> Result<Vec<PollingTarget>>;
    async fn upsert_target(&self, target: &PollingTarget) -> Result<()>;
    async fn delete_target(&self, id: &str) -> Result<()>;

    async fn list_subscribers(&self) -> Result<Vec<Subscriber>>;
    async fn upsert_subscriber(&self, subscriber: &Subscriber) -> Result<()>;
    async fn delete_subscriber(&self, id: &str) -> Result<()>;

    /// Atomic with any listing upserts performed in the same call.
    async fn append_events(&self, events: &[ChangeEvent]) -> Result<()>;

    /// Atomically flips `PENDING -> IN_FLIGHT` with a lease of `lease_duration`.
    /// Stale `IN_FLIGHT` rows (lease expired) are reclaimable as PENDING.
    async fn claim_pending_events(&self, limit: i64, lease_duration: Duration) -> Result<Vec<ChangeEvent>>;

    async fn complete_event(&self, event_id: Uuid, outcome: EventOutcome, retry_increment: bool) -> Result<()>;

    /// Paged event query for the admin surface's `GET /v1/events` (§6),
    /// newest first. `status` narrows to one `EventStatus`; `None` returns
    /// events of any status.
    async fn list_events(&self, status: Option<EventStatus>, limit: i64, offset: i64) -> Result<Vec<ChangeEvent>>;

    /// MUST persist target state, listing mutations, and outbox events
    /// atomically (§4.1 Critical contract).
    async fn commit_poll_outcome(
        &self,
        target: &PollingTarget,
        updated_listings: &[CanonicalListing],
        new_events: &[ChangeEvent],
    ) -> Result<()>;
}

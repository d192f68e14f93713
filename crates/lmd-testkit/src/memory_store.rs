//! An in-memory [`Store`] good enough to exercise the scheduler, dispatcher,
//! and admin surface without a database. Mirrors the durable contract
//! exactly — including the outbox lease semantics in §4.1 — so tests that
//! run against it exercise the same invariants `PgStore` must uphold.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lmd_schemas::{CanonicalListing, ChangeEvent, EventStatus, PollingTarget, Subscriber};
use lmd_store::{EventOutcome, Store};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    listings: HashMap<(String, String), CanonicalListing>,
    targets: HashMap<String, PollingTarget>,
    subscribers: HashMap<String, Subscriber>,
    events: HashMap<Uuid, ChangeEvent>,
    /// Insertion order, preserved so claims happen in emission order —
    /// required for per-listing ordering (§5).
    event_order: Vec<Uuid>,
    leases: HashMap<Uuid, DateTime<Utc>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: total events ever appended, regardless of status.
    pub fn event_count(&self) -> usize {
        self.inner.lock().unwrap().events.len()
    }

    /// Test helper: snapshot of events currently in PENDING status, in
    /// emission order.
    pub fn pending_events(&self) -> Vec<ChangeEvent> {
        let inner = self.inner.lock().unwrap();
        inner
            .event_order
            .iter()
            .filter_map(|id| inner.events.get(id))
            .filter(|e| e.status == EventStatus::Pending)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn get_listing(&self, source: &str, listing_id: &str) -> anyhow::Result<Option<CanonicalListing>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .listings
            .get(&(source.to_string(), listing_id.to_string()))
            .cloned())
    }

    async fn list_listings(&self, source: &str) -> anyhow::Result<Vec<CanonicalListing>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .listings
            .values()
            .filter(|l| l.source == source)
            .cloned()
            .collect())
    }

    async fn upsert_listing(&self, listing: &CanonicalListing) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .listings
            .insert((listing.source.clone(), listing.listing_id.clone()), listing.clone());
        Ok(())
    }

    async fn mark_listing_removed(&self, source: &str, listing_id: &str, detected_at: DateTime<Utc>) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(l) = inner.listings.get_mut(&(source.to_string(), listing_id.to_string())) {
            l.status = lmd_schemas::ListingStatus::Removed;
            l.last_seen_at = detected_at;
            l.version += 1;
        }
        Ok(())
    }

    async fn get_target(&self, id: &str) -> anyhow::Result<Option<PollingTarget>> {
        Ok(self.inner.lock().unwrap().targets.get(id).cloned())
    }

    async fn list_targets(&self) -> anyhow::Result<Vec<PollingTarget>> {
        Ok(self.inner.lock().unwrap().targets.values().cloned().collect())
    }

    async fn upsert_target(&self, target: &PollingTarget) -> anyhow::Result<()> {
        self.inner.lock().unwrap().targets.insert(target.id.clone(), target.clone());
        Ok(())
    }

    async fn delete_target(&self, id: &str) -> anyhow::Result<()> {
        self.inner.lock().unwrap().targets.remove(id);
        Ok(())
    }

    async fn list_subscribers(&self) -> anyhow::Result<Vec<Subscriber>> {
        Ok(self.inner.lock().unwrap().subscribers.values().cloned().collect())
    }

    async fn upsert_subscriber(&self, subscriber: &Subscriber) -> anyhow::Result<()> {
        self.inner.lock().unwrap().subscribers.insert(subscriber.id.clone(), subscriber.clone());
        Ok(())
    }

    async fn delete_subscriber(&self, id: &str) -> anyhow::Result<()> {
        self.inner.lock().unwrap().subscribers.remove(id);
        Ok(())
    }

    async fn append_events(&self, events: &[ChangeEvent]) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for event in events {
            inner.event_order.push(event.event_id);
            inner.events.insert(event.event_id, event.clone());
        }
        Ok(())
    }

    async fn claim_pending_events(&self, limit: i64, lease_duration: Duration) -> anyhow::Result<Vec<ChangeEvent>> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();

        // Reclaim stale IN_FLIGHT leases back to PENDING (§4.1).
        let expired: Vec<Uuid> = inner
            .leases
            .iter()
            .filter(|(_, expires)| **expires <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            inner.leases.remove(&id);
            if let Some(event) = inner.events.get_mut(&id) {
                if event.status == EventStatus::InFlight {
                    event.status = EventStatus::Pending;
                }
            }
        }

        let ids: Vec<Uuid> = inner
            .event_order
            .iter()
            .filter(|id| matches!(inner.events.get(*id), Some(e) if e.status == EventStatus::Pending))
            .take(limit.max(0) as usize)
            .copied()
            .collect();

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(event) = inner.events.get_mut(&id) {
                event.status = EventStatus::InFlight;
                inner.leases.insert(id, now + chrono::Duration::from_std(lease_duration).unwrap_or_default());
                claimed.push(event.clone());
            }
        }
        Ok(claimed)
    }

    async fn complete_event(&self, event_id: Uuid, outcome: EventOutcome, retry_increment: bool) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.leases.remove(&event_id);
        if let Some(event) = inner.events.get_mut(&event_id) {
            event.status = match outcome {
                EventOutcome::Processed => EventStatus::Processed,
                EventOutcome::Failed => EventStatus::Failed,
            };
            if retry_increment {
                event.retry_count += 1;
                event.last_retry_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn list_events(&self, status: Option<EventStatus>, limit: i64, offset: i64) -> anyhow::Result<Vec<ChangeEvent>> {
        let inner = self.inner.lock().unwrap();
        let matching: Vec<ChangeEvent> = inner
            .event_order
            .iter()
            .rev()
            .filter_map(|id| inner.events.get(id))
            .filter(|e| status.map(|s| e.status == s).unwrap_or(true))
            .cloned()
            .collect();
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn commit_poll_outcome(
        &self,
        target: &PollingTarget,
        updated_listings: &[CanonicalListing],
        new_events: &[ChangeEvent],
    ) -> anyhow::Result<()> {
        self.upsert_target(target).await?;
        for listing in updated_listings {
            self.upsert_listing(listing).await?;
        }
        self.append_events(new_events).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn sample_event(listing_id: &str) -> ChangeEvent {
        ChangeEvent {
            event_id: Uuid::new_v4(),
            event_type: lmd_schemas::EventType::Created,
            listing_id: listing_id.to_string(),
            source: "https://example.test/listings".to_string(),
            changed_fields: Vec::new(),
            field_hash_before: None,
            field_hash_after: "deadbeef".to_string(),
            detected_at: Utc::now(),
            version: 1,
            confidence: 1.0,
            significance: lmd_schemas::SignificanceBucket::High,
            metadata: serde_json::json!({}),
            status: EventStatus::Pending,
            retry_count: 0,
            last_retry_at: None,
        }
    }

    #[tokio::test]
    async fn claim_flips_pending_to_in_flight_and_hides_it_from_the_next_claim() {
        let store = MemoryStore::new();
        store.append_events(&[sample_event("a")]).await.unwrap();

        let first = store.claim_pending_events(10, StdDuration::from_secs(60)).await.unwrap();
        assert_eq!(first.len(), 1);

        let second = store.claim_pending_events(10, StdDuration::from_secs(60)).await.unwrap();
        assert!(second.is_empty(), "an unexpired lease must not be reclaimable");
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimable() {
        let store = MemoryStore::new();
        store.append_events(&[sample_event("a")]).await.unwrap();

        let first = store.claim_pending_events(10, StdDuration::from_millis(1)).await.unwrap();
        assert_eq!(first.len(), 1);

        tokio::time::sleep(StdDuration::from_millis(20)).await;

        let reclaimed = store.claim_pending_events(10, StdDuration::from_secs(60)).await.unwrap();
        assert_eq!(reclaimed.len(), 1, "expired IN_FLIGHT lease must be reclaimable as PENDING");
    }

    #[tokio::test]
    async fn completed_event_is_never_reclaimed() {
        let store = MemoryStore::new();
        let event = sample_event("a");
        let id = event.event_id;
        store.append_events(&[event]).await.unwrap();

        store.claim_pending_events(10, StdDuration::from_millis(1)).await.unwrap();
        store.complete_event(id, EventOutcome::Processed, false).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        let claimed = store.claim_pending_events(10, StdDuration::from_secs(60)).await.unwrap();
        assert!(claimed.is_empty(), "a PROCESSED event must never be reclaimed");
    }
}

pub mod config;
pub mod engine;

pub use config::SchedulerConfig;
pub use engine::Engine;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use lmd_schemas::{
        CanonicalListing, ChangeEvent, FetchResult, Fetcher, PollingTarget, RawListing, Subscriber,
    };
    use lmd_store::{EventOutcome, Store};
    use uuid::Uuid;

    use super::*;

    /// An in-memory `Store` good enough to exercise the scheduler without a
    /// database. `lmd-testkit` provides the shared version of this for other
    /// crates; this one stays local to keep scheduler tests self-contained.
    #[derive(Default)]
    struct MemoryStore {
        listings: Mutex<HashMap<(String, String), CanonicalListing>>,
        targets: Mutex<HashMap<String, PollingTarget>>,
        events: Mutex<Vec<ChangeEvent>>,
    }

    #[async_trait]
    impl Store for MemoryStore {
        async fn get_listing(&self, source: &str, listing_id: &str) -> anyhow::Result<Option<CanonicalListing>> {
            Ok(self.listings.lock().unwrap().get(&(source.to_string(), listing_id.to_string())).cloned())
        }
        async fn list_listings(&self, source: &str) -> anyhow::Result<Vec<CanonicalListing>> {
            Ok(self.listings.lock().unwrap().values().filter(|l| l.source == source).cloned().collect())
        }
        async fn upsert_listing(&self, listing: &CanonicalListing) -> anyhow::Result<()> {
            self.listings.lock().unwrap().insert((listing.source.clone(), listing.listing_id.clone()), listing.clone());
            Ok(())
        }
        async fn mark_listing_removed(&self, source: &str, listing_id: &str, detected_at: chrono::DateTime<Utc>) -> anyhow::Result<()> {
            if let Some(l) = self.listings.lock().unwrap().get_mut(&(source.to_string(), listing_id.to_string())) {
                l.status = lmd_schemas::ListingStatus::Removed;
                l.last_seen_at = detected_at;
                l.version += 1;
            }
            Ok(())
        }
        async fn get_target(&self, id: &str) -> anyhow::Result<Option<PollingTarget>> {
            Ok(self.targets.lock().unwrap().get(id).cloned())
        }
        async fn list_targets(&self) -> anyhow::Result<Vec<PollingTarget>> {
            Ok(self.targets.lock().unwrap().values().cloned().collect())
        }
        async fn upsert_target(&self, target: &PollingTarget) -> anyhow::Result<()> {
            self.targets.lock().unwrap().insert(target.id.clone(), target.clone());
            Ok(())
        }
        async fn delete_target(&self, id: &str) -> anyhow::Result<()> {
            self.targets.lock().unwrap().remove(id);
            Ok(())
        }
        async fn list_subscribers(&self) -> anyhow::Result<Vec<Subscriber>> {
            Ok(Vec::new())
        }
        async fn upsert_subscriber(&self, _subscriber: &Subscriber) -> anyhow::Result<()> {
            Ok(())
        }
        async fn delete_subscriber(&self, _id: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn append_events(&self, events: &[ChangeEvent]) -> anyhow::Result<()> {
            self.events.lock().unwrap().extend(events.iter().cloned());
            Ok(())
        }
        async fn claim_pending_events(&self, _limit: i64, _lease_duration: Duration) -> anyhow::Result<Vec<ChangeEvent>> {
            Ok(Vec::new())
        }
        async fn complete_event(&self, _event_id: Uuid, _outcome: EventOutcome, _retry_increment: bool) -> anyhow::Result<()> {
            Ok(())
        }
        async fn list_events(&self, _status: Option<lmd_schemas::EventStatus>, _limit: i64, _offset: i64) -> anyhow::Result<Vec<ChangeEvent>> {
            Ok(self.events.lock().unwrap().clone())
        }
        async fn commit_poll_outcome(&self, target: &PollingTarget, updated_listings: &[CanonicalListing], new_events: &[ChangeEvent]) -> anyhow::Result<()> {
            self.upsert_target(target).await?;
            for listing in updated_listings {
                self.upsert_listing(listing).await?;
            }
            self.append_events(new_events).await?;
            Ok(())
        }
    }

    struct ScriptedFetcher {
        pages: Mutex<Vec<Vec<RawListing>>>,
    }

    impl ScriptedFetcher {
        fn new(pages: Vec<Vec<RawListing>>) -> Self {
            Self { pages: Mutex::new(pages) }
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, target_url: &str, full: bool) -> anyhow::Result<FetchResult> {
            let pages = self.pages.lock().unwrap();
            let listings = pages.last().cloned().unwrap_or_default();
            Ok(FetchResult {
                total_listings: listings.len() as u64,
                listings,
                pages_scraped: 1,
                scraped_at: Utc::now(),
                source: target_url.to_string(),
                full,
            })
        }
    }

    fn raw(id: &str, title: &str, price: f64) -> RawListing {
        RawListing {
            id: id.to_string(),
            title: Some(title.to_string()),
            price: Some(price),
            condition: Some("used".to_string()),
            location: Some("nowhere".to_string()),
            url: Some(format!("https://example.test/{id}")),
            image_urls: Vec::new(),
            raw: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn first_poll_of_a_new_target_creates_a_listing_and_commits_an_event() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let fetcher: Arc<dyn Fetcher> = Arc::new(ScriptedFetcher::new(vec![vec![raw("a", "Couch", 100.0)]]));
        let target = PollingTarget::new(
            "t1".to_string(),
            "https://example.test/listings".to_string(),
            vec!["title".to_string(), "price".to_string(), "condition".to_string(), "location".to_string()],
        )
        .unwrap();
        store.upsert_target(&target).await.unwrap();

        let engine = Engine::new(store.clone(), fetcher, SchedulerConfig::default());
        engine.poll_task("t1").await.unwrap();

        let listings = store.list_listings(&target.url).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].version, 1);

        let updated_target = store.get_target("t1").await.unwrap().unwrap();
        assert!(updated_target.last_success_at.is_some());
        assert_eq!(updated_target.consecutive_failures, 0);
    }
}

//! A [`SubscriberSink`] that records every delivery attempt in order instead
//! of making network calls, for asserting per-listing ordering (§5) and
//! retry behavior (§4.6) without a real HTTP endpoint.

use std::sync::Mutex;

use lmd_dispatcher::sink::{DeliveryOutcome, SubscriberSink};
use lmd_schemas::{ChangeEvent, Subscriber};

#[derive(Debug, Clone)]
pub struct RecordedDelivery {
    pub subscriber_id: String,
    pub event_id: uuid::Uuid,
    pub listing_id: String,
    pub version: u64,
}

pub struct RecordingSink {
    deliveries: Mutex<Vec<RecordedDelivery>>,
    /// Number of leading attempts per subscriber to fail before succeeding,
    /// keyed by subscriber id. Absent subscribers always succeed.
    fail_first_n: Mutex<std::collections::HashMap<String, u32>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { deliveries: Mutex::new(Vec::new()), fail_first_n: Mutex::new(Default::default()) }
    }

    /// Configure a subscriber to fail its first `n` delivery attempts, then
    /// succeed — for exercising the dispatcher's retry-with-backoff path.
    pub fn fail_first(&self, subscriber_id: &str, n: u32) {
        self.fail_first_n.lock().unwrap().insert(subscriber_id.to_string(), n);
    }

    pub fn deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Deliveries for one listing, in the order they were recorded — the
    /// property the dispatcher's per-listing sharding must preserve.
    pub fn deliveries_for(&self, listing_id: &str) -> Vec<RecordedDelivery> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.listing_id == listing_id)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl SubscriberSink for RecordingSink {
    async fn deliver(&self, event: &ChangeEvent, subscriber: &Subscriber) -> DeliveryOutcome {
        let remaining_failures = {
            let mut map = self.fail_first_n.lock().unwrap();
            let counter = map.entry(subscriber.id.clone()).or_insert(0);
            if *counter > 0 {
                *counter -= 1;
                true
            } else {
                false
            }
        };

        if remaining_failures {
            return DeliveryOutcome::Failed;
        }

        self.deliveries.lock().unwrap().push(RecordedDelivery {
            subscriber_id: subscriber.id.clone(),
            event_id: event.event_id,
            listing_id: event.listing_id.clone(),
            version: event.version,
        });
        DeliveryOutcome::Delivered
    }
}

//! The Dispatcher (§4.6): drains the event outbox and delivers to
//! subscribers with retry and at-least-once, per-listing-ordered semantics.
//!
//! Per-listing ordering is enforced by sharding in-flight deliveries on a
//! hash of `listing_id` into a fixed pool of workers; a listing's events are
//! always processed by the same worker, in claim order.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use lmd_schemas::ChangeEvent;
use lmd_store::{EventOutcome, Store};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::retry::backoff_delay;
use crate::sink::{DeliveryOutcome, SubscriberSink};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub batch_size: i64,
    pub processing_interval: Duration,
    pub lease_duration: Duration,
    pub worker_pool_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            processing_interval: Duration::from_secs(2),
            lease_duration: Duration::from_secs(60),
            worker_pool_size: 8,
        }
    }
}

pub struct Dispatcher {
    store: Arc<dyn Store>,
    sink: Arc<dyn SubscriberSink>,
    config: DispatcherConfig,
    workers: Vec<mpsc::UnboundedSender<ChangeEvent>>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, sink: Arc<dyn SubscriberSink>, config: DispatcherConfig) -> Arc<Self> {
        let mut workers = Vec::with_capacity(config.worker_pool_size);
        let mut receivers = Vec::with_capacity(config.worker_pool_size);
        for _ in 0..config.worker_pool_size {
            let (tx, rx) = mpsc::unbounded_channel::<ChangeEvent>();
            workers.push(tx);
            receivers.push(rx);
        }

        let dispatcher = Arc::new(Self { store, sink, config, workers });
        for mut rx in receivers {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    dispatcher.process_event(event).await;
                }
            });
        }
        dispatcher
    }

    fn shard_for(&self, listing_id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        listing_id.hash(&mut hasher);
        (hasher.finish() as usize) % self.config.worker_pool_size.max(1)
    }

    /// Drives `processing_interval` claims until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.processing_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.claim_and_dispatch().await {
                        warn!(error = %err, "dispatcher claim failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("dispatcher shutting down");
    }

    async fn claim_and_dispatch(&self) -> anyhow::Result<()> {
        let events = self
            .store
            .claim_pending_events(self.config.batch_size, self.config.lease_duration)
            .await?;
        for event in events {
            let shard = self.shard_for(&event.listing_id);
            if self.workers[shard].send(event).is_err() {
                warn!("dispatcher worker channel closed, dropping claimed event");
            }
        }
        Ok(())
    }

    async fn process_event(&self, event: ChangeEvent) {
        let subscribers = match self.store.list_subscribers().await {
            Ok(subs) => subs.into_iter().filter(|s| s.enabled).collect::<Vec<_>>(),
            Err(err) => {
                warn!(event_id = %event.event_id, error = %err, "failed to list subscribers");
                let _ = self.store.complete_event(event.event_id, EventOutcome::Failed, true).await;
                return;
            }
        };

        let deliveries = subscribers
            .iter()
            .map(|subscriber| deliver_with_retry(self.sink.as_ref(), &event, subscriber));
        let results = futures_util::future::join_all(deliveries).await;
        let all_delivered = results.iter().all(|ok| *ok);

        let outcome = if all_delivered { EventOutcome::Processed } else { EventOutcome::Failed };
        if let Err(err) = self.store.complete_event(event.event_id, outcome, !all_delivered).await {
            warn!(event_id = %event.event_id, error = %err, "failed to record event completion");
        }
    }
}

/// One subscriber's full delivery attempt sequence: retry with backoff up to
/// `maxRetries`, then give up (the event as a whole is dead-lettered by the
/// caller if any subscriber never succeeds).
async fn deliver_with_retry(
    sink: &dyn SubscriberSink,
    event: &ChangeEvent,
    subscriber: &lmd_schemas::Subscriber,
) -> bool {
    let max_retries = subscriber.retry_policy.max_retries;
    for attempt in 0..=max_retries {
        match sink.deliver(event, subscriber).await {
            DeliveryOutcome::Delivered => return true,
            DeliveryOutcome::Failed => {
                if attempt < max_retries {
                    tokio::time::sleep(backoff_delay(&subscriber.retry_policy, attempt)).await;
                }
            }
        }
    }
    false
}

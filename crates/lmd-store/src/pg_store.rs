use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lmd_schemas::{CanonicalListing, ChangeEvent, ListingStatus, PollingTarget, Subscriber};
use sqlx::PgPool;
use uuid::Uuid;

use crate::rows::{
    change_type_str, event_status_str, event_type_str, listing_status_str, significance_str,
    subscriber_type_str, EventRow, ListingRow, SubscriberRow, TargetRow,
};
use crate::store_trait::{EventOutcome, Store};

/// Postgres-backed `Store`. Read paths consult an advisory in-process cache
/// first and fall through to the database on miss; writes invalidate the
/// cache key (§4.1: "the cache is advisory").
pub struct PgStore {
    pool: PgPool,
    listing_cache: RwLock<HashMap<(String, String), CanonicalListing>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, listing_cache: RwLock::new(HashMap::new()) }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("connecting to store database")?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("running store migrations")?;
        Ok(())
    }

    fn invalidate(&self, source: &str, listing_id: &str) {
        self.listing_cache
            .write()
            .unwrap()
            .remove(&(source.to_string(), listing_id.to_string()));
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn get_listing(&self, source: &str, listing_id: &str) -> Result<Option<CanonicalListing>> {
        let key = (source.to_string(), listing_id.to_string());
        if let Some(hit) = self.listing_cache.read().unwrap().get(&key) {
            return Ok(Some(hit.clone()));
        }
        let row: Option<ListingRow> = sqlx::query_as(
            "SELECT source, listing_id, first_seen_at, last_seen_at, status, tracked_fields, \
             image_urls, version, field_hash, etag, last_modified, change_history, raw_data \
             FROM listings WHERE source = $1 AND listing_id = $2",
        )
        .bind(source)
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await
        .context("get_listing query")?;

        match row {
            None => Ok(None),
            Some(row) => {
                let listing = row.into_domain()?;
                self.listing_cache.write().unwrap().insert(key, listing.clone());
                Ok(Some(listing))
            }
        }
    }

    async fn list_listings(&self, source: &str) -> Result<Vec<CanonicalListing>> {
        let rows: Vec<ListingRow> = sqlx::query_as(
            "SELECT source, listing_id, first_seen_at, last_seen_at, status, tracked_fields, \
             image_urls, version, field_hash, etag, last_modified, change_history, raw_data \
             FROM listings WHERE source = $1",
        )
        .bind(source)
        .fetch_all(&self.pool)
        .await
        .context("list_listings query")?;
        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    async fn upsert_listing(&self, listing: &CanonicalListing) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin upsert_listing tx")?;
        upsert_listing_tx(&mut tx, listing).await?;
        tx.commit().await.context("commit upsert_listing tx")?;
        self.invalidate(&listing.source, &listing.listing_id);
        Ok(())
    }

    async fn mark_listing_removed(&self, source: &str, listing_id: &str, detected_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE listings SET status = $1, last_seen_at = $2, version = version + 1, \
             updated_at = now() WHERE source = $3 AND listing_id = $4",
        )
        .bind(listing_status_str(ListingStatus::Removed))
        .bind(detected_at)
        .bind(source)
        .bind(listing_id)
        .execute(&self.pool)
        .await
        .context("mark_listing_removed query")?;
        self.invalidate(source, listing_id);
        Ok(())
    }

    async fn get_target(&self, id: &str) -> Result<Option<PollingTarget>> {
        let row: Option<TargetRow> = sqlx::query_as(
            "SELECT id, url, domain, intervals, adaptive_policy, rate_limit_policy, \
             tracked_fields, diff_policy, grace_period_secs, enabled, last_polled_at, \
             last_success_at, consecutive_failures, circuit_breaker, current_change_rate, \
             change_history FROM polling_targets WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("get_target query")?;
        row.map(|r| r.into_domain()).transpose()
    }

    async fn list_targets(&self) -> Result<Vec<PollingTarget>> {
        let rows: Vec<TargetRow> = sqlx::query_as(
            "SELECT id, url, domain, intervals, adaptive_policy, rate_limit_policy, \
             tracked_fields, diff_policy, grace_period_secs, enabled, last_polled_at, \
             last_success_at, consecutive_failures, circuit_breaker, current_change_rate, \
             change_history FROM polling_targets",
        )
        .fetch_all(&self.pool)
        .await
        .context("list_targets query")?;
        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    async fn upsert_target(&self, target: &PollingTarget) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin upsert_target tx")?;
        upsert_target_tx(&mut tx, target).await?;
        tx.commit().await.context("commit upsert_target tx")?;
        Ok(())
    }

    async fn delete_target(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM polling_targets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete_target query")?;
        Ok(())
    }

    async fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
        let rows: Vec<SubscriberRow> = sqlx::query_as(
            "SELECT id, subscriber_type, endpoint, timeout_ms, retry_policy, enabled, \
             webhook_secret_env FROM subscribers",
        )
        .fetch_all(&self.pool)
        .await
        .context("list_subscribers query")?;
        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    async fn upsert_subscriber(&self, subscriber: &Subscriber) -> Result<()> {
        sqlx::query(
            "INSERT INTO subscribers (id, subscriber_type, endpoint, timeout_ms, retry_policy, \
             enabled, webhook_secret_env, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, now()) \
             ON CONFLICT (id) DO UPDATE SET subscriber_type = EXCLUDED.subscriber_type, \
             endpoint = EXCLUDED.endpoint, timeout_ms = EXCLUDED.timeout_ms, \
             retry_policy = EXCLUDED.retry_policy, enabled = EXCLUDED.enabled, \
             webhook_secret_env = EXCLUDED.webhook_secret_env, updated_at = now()",
        )
        .bind(&subscriber.id)
        .bind(subscriber_type_str(subscriber.subscriber_type))
        .bind(&subscriber.endpoint)
        .bind(subscriber.timeout_ms as i64)
        .bind(serde_json::to_value(&subscriber.retry_policy)?)
        .bind(subscriber.enabled)
        .bind(&subscriber.webhook_secret_env)
        .execute(&self.pool)
        .await
        .context("upsert_subscriber query")?;
        Ok(())
    }

    async fn delete_subscriber(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM subscribers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete_subscriber query")?;
        Ok(())
    }

    async fn append_events(&self, events: &[ChangeEvent]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin append_events tx")?;
        for event in events {
            insert_event_tx(&mut tx, event).await?;
        }
        tx.commit().await.context("commit append_events tx")?;
        Ok(())
    }

    async fn claim_pending_events(&self, limit: i64, lease_duration: Duration) -> Result<Vec<ChangeEvent>> {
        let lease_secs = lease_duration.as_secs() as f64;
        // A single statement: reclaim stale IN_FLIGHT leases as PENDING, then
        // atomically claim up to `limit` PENDING rows with a row lock that
        // skips rows concurrently claimed by another dispatcher worker.
        sqlx::query(
            "UPDATE events SET status = 'PENDING', lease_expires_at = NULL \
             WHERE status = 'IN_FLIGHT' AND lease_expires_at < now()",
        )
        .execute(&self.pool)
        .await
        .context("reclaim stale leases")?;

        let rows: Vec<EventRow> = sqlx::query_as(
            "WITH claimable AS ( \
                SELECT event_id FROM events \
                WHERE status = 'PENDING' \
                ORDER BY created_at \
                LIMIT $1 \
                FOR UPDATE SKIP LOCKED \
             ) \
             UPDATE events SET status = 'IN_FLIGHT', \
                lease_expires_at = now() + make_interval(secs => $2) \
             FROM claimable WHERE events.event_id = claimable.event_id \
             RETURNING events.event_id, events.event_type, events.listing_id, events.source, \
                events.changed_fields, events.field_hash_before, events.field_hash_after, \
                events.detected_at, events.version, events.confidence, events.significance, \
                events.metadata, events.status, events.retry_count, events.last_retry_at",
        )
        .bind(limit)
        .bind(lease_secs)
        .fetch_all(&self.pool)
        .await
        .context("claim_pending_events query")?;

        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    async fn complete_event(&self, event_id: Uuid, outcome: EventOutcome, retry_increment: bool) -> Result<()> {
        let status = match outcome {
            EventOutcome::Processed => event_status_str(lmd_schemas::EventStatus::Processed),
            EventOutcome::Failed => event_status_str(lmd_schemas::EventStatus::Failed),
        };
        if retry_increment {
            sqlx::query(
                "UPDATE events SET status = $1, retry_count = retry_count + 1, \
                 last_retry_at = now(), lease_expires_at = NULL WHERE event_id = $2",
            )
            .bind(status)
            .bind(event_id)
            .execute(&self.pool)
            .await
            .context("complete_event query")?;
        } else {
            sqlx::query(
                "UPDATE events SET status = $1, lease_expires_at = NULL WHERE event_id = $2",
            )
            .bind(status)
            .bind(event_id)
            .execute(&self.pool)
            .await
            .context("complete_event query")?;
        }
        Ok(())
    }

    async fn list_events(&self, status: Option<lmd_schemas::EventStatus>, limit: i64, offset: i64) -> Result<Vec<ChangeEvent>> {
        let rows: Vec<EventRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT event_id, event_type, listing_id, source, changed_fields, \
                     field_hash_before, field_hash_after, detected_at, version, confidence, \
                     significance, metadata, status, retry_count, last_retry_at FROM events \
                     WHERE status = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
                )
                .bind(event_status_str(status))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .context("list_events query")?
            }
            None => {
                sqlx::query_as(
                    "SELECT event_id, event_type, listing_id, source, changed_fields, \
                     field_hash_before, field_hash_after, detected_at, version, confidence, \
                     significance, metadata, status, retry_count, last_retry_at FROM events \
                     ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .context("list_events query")?
            }
        };
        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    async fn commit_poll_outcome(
        &self,
        target: &PollingTarget,
        updated_listings: &[CanonicalListing],
        new_events: &[ChangeEvent],
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin commit_poll_outcome tx")?;
        upsert_target_tx(&mut tx, target).await?;
        for listing in updated_listings {
            upsert_listing_tx(&mut tx, listing).await?;
        }
        for event in new_events {
            insert_event_tx(&mut tx, event).await?;
        }
        tx.commit().await.context("commit commit_poll_outcome tx")?;

        let mut cache = self.listing_cache.write().unwrap();
        for listing in updated_listings {
            cache.remove(&(listing.source.clone(), listing.listing_id.clone()));
        }
        Ok(())
    }
}

async fn upsert_listing_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    listing: &CanonicalListing,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO listings (source, listing_id, first_seen_at, last_seen_at, status, \
         tracked_fields, image_urls, version, field_hash, etag, last_modified, change_history, \
         raw_data, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, now()) \
         ON CONFLICT (source, listing_id) DO UPDATE SET \
            last_seen_at = EXCLUDED.last_seen_at, status = EXCLUDED.status, \
            tracked_fields = EXCLUDED.tracked_fields, image_urls = EXCLUDED.image_urls, \
            version = EXCLUDED.version, field_hash = EXCLUDED.field_hash, \
            etag = EXCLUDED.etag, last_modified = EXCLUDED.last_modified, \
            change_history = EXCLUDED.change_history, raw_data = EXCLUDED.raw_data, \
            updated_at = now()",
    )
    .bind(&listing.source)
    .bind(&listing.listing_id)
    .bind(listing.first_seen_at)
    .bind(listing.last_seen_at)
    .bind(listing_status_str(listing.status))
    .bind(serde_json::to_value(&listing.tracked_fields)?)
    .bind(serde_json::to_value(&listing.image_urls)?)
    .bind(listing.version as i64)
    .bind(&listing.field_hash)
    .bind(&listing.etag)
    .bind(&listing.last_modified)
    .bind(serde_json::to_value(&listing.change_history)?)
    .bind(&listing.raw_data)
    .execute(&mut **tx)
    .await
    .context("upsert_listing_tx query")?;
    Ok(())
}

async fn upsert_target_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    target: &PollingTarget,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO polling_targets (id, url, domain, intervals, adaptive_policy, \
         rate_limit_policy, tracked_fields, diff_policy, grace_period_secs, enabled, \
         last_polled_at, last_success_at, consecutive_failures, circuit_breaker, \
         current_change_rate, change_history, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, now()) \
         ON CONFLICT (id) DO UPDATE SET \
            url = EXCLUDED.url, domain = EXCLUDED.domain, intervals = EXCLUDED.intervals, \
            adaptive_policy = EXCLUDED.adaptive_policy, rate_limit_policy = EXCLUDED.rate_limit_policy, \
            tracked_fields = EXCLUDED.tracked_fields, diff_policy = EXCLUDED.diff_policy, \
            grace_period_secs = EXCLUDED.grace_period_secs, enabled = EXCLUDED.enabled, \
            last_polled_at = EXCLUDED.last_polled_at, last_success_at = EXCLUDED.last_success_at, \
            consecutive_failures = EXCLUDED.consecutive_failures, \
            circuit_breaker = EXCLUDED.circuit_breaker, \
            current_change_rate = EXCLUDED.current_change_rate, \
            change_history = EXCLUDED.change_history, updated_at = now()",
    )
    .bind(&target.id)
    .bind(&target.url)
    .bind(&target.domain)
    .bind(serde_json::to_value(target.intervals)?)
    .bind(serde_json::to_value(target.adaptive_policy)?)
    .bind(serde_json::to_value(target.rate_limit_policy)?)
    .bind(serde_json::to_value(&target.tracked_fields)?)
    .bind(serde_json::to_value(&target.diff_policy)?)
    .bind(target.grace_period_secs as i64)
    .bind(target.enabled)
    .bind(target.last_polled_at)
    .bind(target.last_success_at)
    .bind(target.consecutive_failures as i32)
    .bind(serde_json::to_value(target.circuit_breaker)?)
    .bind(target.current_change_rate)
    .bind(serde_json::to_value(&target.change_history)?)
    .execute(&mut **tx)
    .await
    .context("upsert_target_tx query")?;
    Ok(())
}

async fn insert_event_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &ChangeEvent,
) -> Result<()> {
    let changed_fields_json: Vec<serde_json::Value> = event
        .changed_fields
        .iter()
        .map(|f| {
            serde_json::json!({
                "field": f.field,
                "oldValue": f.old_value,
                "newValue": f.new_value,
                "changeType": change_type_str(f.change_type),
                "significance": f.significance,
            })
        })
        .collect();
    sqlx::query(
        "INSERT INTO events (event_id, event_type, listing_id, source, changed_fields, \
         field_hash_before, field_hash_after, detected_at, version, confidence, significance, \
         metadata, status, retry_count, last_retry_at, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, now()) \
         ON CONFLICT (event_id) DO NOTHING",
    )
    .bind(event.event_id)
    .bind(event_type_str(event.event_type))
    .bind(&event.listing_id)
    .bind(&event.source)
    .bind(serde_json::to_value(changed_fields_json)?)
    .bind(&event.field_hash_before)
    .bind(&event.field_hash_after)
    .bind(event.detected_at)
    .bind(event.version as i64)
    .bind(event.confidence)
    .bind(significance_str(event.significance))
    .bind(&event.metadata)
    .bind(event_status_str(event.status))
    .bind(event.retry_count as i32)
    .bind(event.last_retry_at)
    .execute(&mut **tx)
    .await
    .context("insert_event_tx query")?;
    Ok(())
}

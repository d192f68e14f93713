//! Row <-> domain-type conversions. sqlx column types stay primitive
//! (String, JSONB-as-Value, DateTime<Utc>); all domain typing happens here.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lmd_schemas::{
    listing::ChangeHistoryEntry, target::DiffPolicy, AdaptivePolicy, CanonicalListing,
    ChangeEvent, ChangeType, ChangedField, CircuitBreakerRuntime, EventStatus, EventType,
    IntervalBounds, ListingStatus, PollHistoryEntry, PollingTarget, RateLimitPolicy,
    RetryPolicy, SignificanceBucket, Subscriber, SubscriberType,
};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub struct ListingRow {
    pub source: String,
    pub listing_id: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub status: String,
    pub tracked_fields: serde_json::Value,
    pub image_urls: serde_json::Value,
    pub version: i64,
    pub field_hash: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub change_history: serde_json::Value,
    pub raw_data: serde_json::Value,
}

impl ListingRow {
    pub fn into_domain(self) -> Result<CanonicalListing> {
        let status = match self.status.as_str() {
            "ACTIVE" => ListingStatus::Active,
            "REMOVED" => ListingStatus::Removed,
            other => anyhow::bail!("unknown listing status in row: {other}"),
        };
        let tracked_fields = serde_json::from_value(self.tracked_fields)
            .context("decoding listings.tracked_fields")?;
        let image_urls: Vec<String> =
            serde_json::from_value(self.image_urls).context("decoding listings.image_urls")?;
        let change_history: Vec<ChangeHistoryEntry> =
            serde_json::from_value(self.change_history).context("decoding listings.change_history")?;
        Ok(CanonicalListing {
            source: self.source,
            listing_id: self.listing_id,
            first_seen_at: self.first_seen_at,
            last_seen_at: self.last_seen_at,
            status,
            tracked_fields,
            image_urls,
            version: self.version as u64,
            field_hash: self.field_hash,
            etag: self.etag,
            last_modified: self.last_modified,
            change_history,
            raw_data: self.raw_data,
        })
    }
}

pub fn listing_status_str(status: ListingStatus) -> &'static str {
    match status {
        ListingStatus::Active => "ACTIVE",
        ListingStatus::Removed => "REMOVED",
    }
}

#[derive(sqlx::FromRow)]
pub struct TargetRow {
    pub id: String,
    pub url: String,
    pub domain: String,
    pub intervals: serde_json::Value,
    pub adaptive_policy: serde_json::Value,
    pub rate_limit_policy: serde_json::Value,
    pub tracked_fields: serde_json::Value,
    pub diff_policy: serde_json::Value,
    pub grace_period_secs: i64,
    pub enabled: bool,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: i32,
    pub circuit_breaker: serde_json::Value,
    pub current_change_rate: f64,
    pub change_history: serde_json::Value,
}

impl TargetRow {
    pub fn into_domain(self) -> Result<PollingTarget> {
        let intervals: IntervalBounds =
            serde_json::from_value(self.intervals).context("decoding polling_targets.intervals")?;
        let adaptive_policy: AdaptivePolicy = serde_json::from_value(self.adaptive_policy)
            .context("decoding polling_targets.adaptive_policy")?;
        let rate_limit_policy: RateLimitPolicy = serde_json::from_value(self.rate_limit_policy)
            .context("decoding polling_targets.rate_limit_policy")?;
        let tracked_fields: Vec<String> = serde_json::from_value(self.tracked_fields)
            .context("decoding polling_targets.tracked_fields")?;
        let diff_policy: DiffPolicy =
            serde_json::from_value(self.diff_policy).context("decoding polling_targets.diff_policy")?;
        let circuit_breaker: CircuitBreakerRuntime = serde_json::from_value(self.circuit_breaker)
            .context("decoding polling_targets.circuit_breaker")?;
        let change_history: Vec<PollHistoryEntry> = serde_json::from_value(self.change_history)
            .context("decoding polling_targets.change_history")?;
        Ok(PollingTarget {
            id: self.id,
            url: self.url,
            domain: self.domain,
            intervals,
            adaptive_policy,
            rate_limit_policy,
            tracked_fields,
            diff_policy,
            grace_period_secs: self.grace_period_secs as u64,
            enabled: self.enabled,
            last_polled_at: self.last_polled_at,
            last_success_at: self.last_success_at,
            consecutive_failures: self.consecutive_failures as u32,
            circuit_breaker,
            current_change_rate: self.current_change_rate,
            change_history,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct EventRow {
    pub event_id: Uuid,
    pub event_type: String,
    pub listing_id: String,
    pub source: String,
    pub changed_fields: serde_json::Value,
    pub field_hash_before: Option<String>,
    pub field_hash_after: String,
    pub detected_at: DateTime<Utc>,
    pub version: i64,
    pub confidence: f64,
    pub significance: String,
    pub metadata: serde_json::Value,
    pub status: String,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
}

impl EventRow {
    pub fn into_domain(self) -> Result<ChangeEvent> {
        let event_type = match self.event_type.as_str() {
            "CREATED" => EventType::Created,
            "UPDATED" => EventType::Updated,
            "REMOVED" => EventType::Removed,
            other => anyhow::bail!("unknown event_type in row: {other}"),
        };
        let significance = match self.significance.as_str() {
            "LOW" => SignificanceBucket::Low,
            "MEDIUM" => SignificanceBucket::Medium,
            "HIGH" => SignificanceBucket::High,
            other => anyhow::bail!("unknown significance in row: {other}"),
        };
        let status = match self.status.as_str() {
            "PENDING" => EventStatus::Pending,
            "IN_FLIGHT" => EventStatus::InFlight,
            "PROCESSED" => EventStatus::Processed,
            "FAILED" => EventStatus::Failed,
            other => anyhow::bail!("unknown event status in row: {other}"),
        };
        let changed_fields: Vec<ChangedField> =
            serde_json::from_value(self.changed_fields).context("decoding events.changed_fields")?;
        Ok(ChangeEvent {
            event_id: self.event_id,
            event_type,
            listing_id: self.listing_id,
            source: self.source,
            changed_fields,
            field_hash_before: self.field_hash_before,
            field_hash_after: self.field_hash_after,
            detected_at: self.detected_at,
            version: self.version as u64,
            confidence: self.confidence,
            significance,
            metadata: self.metadata,
            status,
            retry_count: self.retry_count as u32,
            last_retry_at: self.last_retry_at,
        })
    }
}

pub fn event_type_str(t: EventType) -> &'static str {
    match t {
        EventType::Created => "CREATED",
        EventType::Updated => "UPDATED",
        EventType::Removed => "REMOVED",
    }
}

pub fn significance_str(s: SignificanceBucket) -> &'static str {
    match s {
        SignificanceBucket::Low => "LOW",
        SignificanceBucket::Medium => "MEDIUM",
        SignificanceBucket::High => "HIGH",
    }
}

pub fn event_status_str(s: EventStatus) -> &'static str {
    match s {
        EventStatus::Pending => "PENDING",
        EventStatus::InFlight => "IN_FLIGHT",
        EventStatus::Processed => "PROCESSED",
        EventStatus::Failed => "FAILED",
    }
}

pub fn change_type_str(c: ChangeType) -> &'static str {
    match c {
        ChangeType::Added => "ADDED",
        ChangeType::Modified => "MODIFIED",
        ChangeType::Removed => "REMOVED",
    }
}

#[derive(sqlx::FromRow)]
pub struct SubscriberRow {
    pub id: String,
    pub subscriber_type: String,
    pub endpoint: String,
    pub timeout_ms: i64,
    pub retry_policy: serde_json::Value,
    pub enabled: bool,
    pub webhook_secret_env: Option<String>,
}

impl SubscriberRow {
    pub fn into_domain(self) -> Result<Subscriber> {
        let subscriber_type = match self.subscriber_type.as_str() {
            "WEBHOOK" => SubscriberType::Webhook,
            "WEBSOCKET" => SubscriberType::Websocket,
            "EMAIL" => SubscriberType::Email,
            other => anyhow::bail!("unknown subscriber type in row: {other}"),
        };
        let retry_policy: RetryPolicy =
            serde_json::from_value(self.retry_policy).context("decoding subscribers.retry_policy")?;
        Ok(Subscriber {
            id: self.id,
            subscriber_type,
            endpoint: self.endpoint,
            timeout_ms: self.timeout_ms as u64,
            retry_policy,
            enabled: self.enabled,
            webhook_secret_env: self.webhook_secret_env,
        })
    }
}

pub fn subscriber_type_str(t: SubscriberType) -> &'static str {
    match t {
        SubscriberType::Webhook => "WEBHOOK",
        SubscriberType::Websocket => "WEBSOCKET",
        SubscriberType::Email => "EMAIL",
    }
}

//! Request and response types for the admin HTTP surface (§6).
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use lmd_schemas::target::{IntervalBounds, RateLimitPolicy};
use lmd_schemas::EventStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// A coarse operational snapshot — the admin surface's status/metrics
/// endpoint (§6). Per-event counts are available via `GET /v1/events`
/// instead, which is pageable; this stays cheap and unpaged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub target_count: usize,
    pub enabled_target_count: usize,
    pub subscriber_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body for `POST /v1/targets`. A subset of `PollingTarget` — the fields an
/// admin caller supplies (§6); everything else (runtime state, circuit
/// breaker, change history) starts at its default and is owned by the
/// scheduler from then on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTargetRequest {
    pub id: String,
    pub url: String,
    pub tracked_fields: Vec<String>,
    #[serde(default)]
    pub intervals: Option<IntervalBounds>,
    #[serde(default)]
    pub rate_limit_policy: Option<RateLimitPolicy>,
    #[serde(default)]
    pub grace_period_secs: Option<u64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Query params for `GET /v1/events` — `status` narrows to one
/// `EventStatus`; `limit`/`offset` page through the rest (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub status: Option<EventStatus>,
    #[serde(default = "default_events_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_events_limit() -> i64 {
    50
}

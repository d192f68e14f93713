//! Axum router and all HTTP handlers for lmd-daemon's admin surface (§6):
//! CRUD over targets and subscribers, force-poll and force-reconcile
//! triggers, and a status endpoint.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use lmd_schemas::{PollingTarget, Subscriber};
use tracing::{info, warn};

use crate::{
    api_types::{
        CreateTargetRequest, ErrorResponse, EventsQuery, HealthResponse, OkResponse, StatusResponse,
    },
    state::{uptime_secs, AppState},
};

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/targets", get(list_targets).post(create_target))
        .route(
            "/v1/targets/:id",
            get(get_target).put(update_target).delete(delete_target),
        )
        .route("/v1/targets/:id/poll", post(force_poll))
        .route("/v1/reconcile", post(force_reconcile))
        .route("/v1/events", get(list_events))
        .route("/v1/subscribers", get(list_subscribers).post(create_subscriber))
        .route(
            "/v1/subscribers/:id",
            put(update_subscriber).delete(delete_subscriber),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse { ok: true, service: st.build.service, version: st.build.version }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> Response {
    let targets = match st.store.list_targets().await {
        Ok(t) => t,
        Err(err) => return store_error(err),
    };
    let subscribers = match st.store.list_subscribers().await {
        Ok(s) => s,
        Err(err) => return store_error(err),
    };

    let response = StatusResponse {
        uptime_secs: uptime_secs(),
        target_count: targets.len(),
        enabled_target_count: targets.iter().filter(|t| t.enabled).count(),
        subscriber_count: subscribers.len(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/events
// ---------------------------------------------------------------------------

pub(crate) async fn list_events(State(st): State<Arc<AppState>>, Query(q): Query<EventsQuery>) -> Response {
    match st.store.list_events(q.status, q.limit, q.offset).await {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(err) => store_error(err),
    }
}

// ---------------------------------------------------------------------------
// Targets CRUD
// ---------------------------------------------------------------------------

pub(crate) async fn list_targets(State(st): State<Arc<AppState>>) -> Response {
    match st.store.list_targets().await {
        Ok(targets) => (StatusCode::OK, Json(targets)).into_response(),
        Err(err) => store_error(err),
    }
}

pub(crate) async fn get_target(State(st): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match st.store.get_target(&id).await {
        Ok(Some(target)) => (StatusCode::OK, Json(target)).into_response(),
        Ok(None) => not_found("target", &id),
        Err(err) => store_error(err),
    }
}

pub(crate) async fn create_target(
    State(st): State<Arc<AppState>>,
    Json(body): Json<CreateTargetRequest>,
) -> Response {
    let mut target = match PollingTarget::new(body.id.clone(), body.url.clone(), body.tracked_fields) {
        Ok(t) => t,
        Err(err) => return config_error(err),
    };
    if let Some(intervals) = body.intervals {
        if let Err(err) = intervals.validate() {
            return config_error(anyhow::Error::msg(err));
        }
        target.intervals = intervals;
    }
    if let Some(policy) = body.rate_limit_policy {
        target.rate_limit_policy = policy;
    }
    if let Some(grace) = body.grace_period_secs {
        target.grace_period_secs = grace;
    }
    target.enabled = body.enabled;

    match st.store.upsert_target(&target).await {
        Ok(()) => {
            info!(target_id = %target.id, "target registered");
            (StatusCode::CREATED, Json(target)).into_response()
        }
        Err(err) => store_error(err),
    }
}

/// Full replacement of a target's configuration. The path id is
/// authoritative; a mismatched body id is corrected rather than rejected,
/// since the id in the URL is what identifies the resource.
pub(crate) async fn update_target(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut body): Json<PollingTarget>,
) -> Response {
    if st.store.get_target(&id).await.ok().flatten().is_none() {
        return not_found("target", &id);
    }
    if let Err(err) = body.intervals.validate() {
        return config_error(anyhow::Error::msg(err));
    }
    if let Err(err) = body.adaptive_policy.validate() {
        return config_error(anyhow::Error::msg(err));
    }
    body.id = id;
    match st.store.upsert_target(&body).await {
        Ok(()) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => store_error(err),
    }
}

pub(crate) async fn delete_target(State(st): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match st.store.delete_target(&id).await {
        Ok(()) => (StatusCode::OK, Json(OkResponse { ok: true })).into_response(),
        Err(err) => store_error(err),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/targets/:id/poll — force-poll trigger
// ---------------------------------------------------------------------------

pub(crate) async fn force_poll(State(st): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if st.store.get_target(&id).await.ok().flatten().is_none() {
        return not_found("target", &id);
    }
    match st.engine.force_poll(&id).await {
        Ok(()) => {
            info!(target_id = %id, "force-poll completed");
            (StatusCode::OK, Json(OkResponse { ok: true })).into_response()
        }
        Err(err) => {
            warn!(target_id = %id, error = %err, "force-poll failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse { error: format!("force-poll failed: {err}") }),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/reconcile — force-reconcile trigger
// ---------------------------------------------------------------------------

pub(crate) async fn force_reconcile(State(st): State<Arc<AppState>>) -> Response {
    match st.engine.reconcile().await {
        Ok(()) => {
            info!("reconciliation sweep completed");
            (StatusCode::OK, Json(OkResponse { ok: true })).into_response()
        }
        Err(err) => store_error(err),
    }
}

// ---------------------------------------------------------------------------
// Subscribers CRUD
// ---------------------------------------------------------------------------

pub(crate) async fn list_subscribers(State(st): State<Arc<AppState>>) -> Response {
    match st.store.list_subscribers().await {
        Ok(subs) => (StatusCode::OK, Json(subs)).into_response(),
        Err(err) => store_error(err),
    }
}

pub(crate) async fn create_subscriber(
    State(st): State<Arc<AppState>>,
    Json(subscriber): Json<Subscriber>,
) -> Response {
    match st.store.upsert_subscriber(&subscriber).await {
        Ok(()) => {
            info!(subscriber_id = %subscriber.id, "subscriber registered");
            (StatusCode::CREATED, Json(subscriber)).into_response()
        }
        Err(err) => store_error(err),
    }
}

pub(crate) async fn update_subscriber(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut subscriber): Json<Subscriber>,
) -> Response {
    subscriber.id = id;
    match st.store.upsert_subscriber(&subscriber).await {
        Ok(()) => (StatusCode::OK, Json(subscriber)).into_response(),
        Err(err) => store_error(err),
    }
}

pub(crate) async fn delete_subscriber(State(st): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match st.store.delete_subscriber(&id).await {
        Ok(()) => (StatusCode::OK, Json(OkResponse { ok: true })).into_response(),
        Err(err) => store_error(err),
    }
}

// ---------------------------------------------------------------------------
// Shared error shapes
// ---------------------------------------------------------------------------

fn not_found(kind: &str, id: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error: format!("{kind} '{id}' not found") })).into_response()
}

/// A malformed admin request (§7 ConfigError): surfaced synchronously to the
/// caller, never enqueued.
fn config_error(err: anyhow::Error) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: err.to_string() })).into_response()
}

fn store_error(err: anyhow::Error) -> Response {
    warn!(error = %err, "store operation failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: err.to_string() })).into_response()
}

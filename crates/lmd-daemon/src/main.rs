//! lmd-daemon entry point.
//!
//! This file is intentionally thin: it loads configuration, connects the
//! store, wires the scheduler and dispatcher, builds the admin router, and
//! runs all three concurrently until a shutdown signal arrives. All route
//! handlers live in `routes.rs`; all shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use lmd_daemon::{routes, state};
use lmd_dispatcher::{Dispatcher, DispatcherConfig, WebhookSink};
use lmd_scheduler::{Engine, SchedulerConfig};
use lmd_store::Store;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist — production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    // Config errors are the one class of startup failure allowed to abort
    // the process (§7 ConfigError); everything after this point that fails
    // is also fatal to startup, for the same reason — there is no degraded
    // mode for a daemon with no store.
    let config = lmd_config::EngineConfig::from_env().context("invalid configuration")?;
    init_tracing(&config.log_level);

    let pg_store = lmd_store::PgStore::connect(&config.store_path)
        .await
        .context("failed to connect to the store")?;
    lmd_store::migrate(&pg_store).await.context("failed to run store migrations")?;
    let store: Arc<dyn Store> = Arc::new(pg_store);

    let fetcher = Arc::new(lmd_daemon::HttpJsonFetcher::new());
    let scheduler_config = SchedulerConfig {
        max_concurrent_polls: config.max_concurrent_polls,
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        ..SchedulerConfig::default()
    };
    let engine = Engine::new(store.clone(), fetcher, scheduler_config);

    let sink = Arc::new(WebhookSink::new());
    let dispatcher = Dispatcher::new(store.clone(), sink, DispatcherConfig::default());

    let shared = Arc::new(state::AppState::new(store, engine.clone(), dispatcher.clone()));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine_handle = tokio::spawn(engine.run(shutdown_rx.clone()));
    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.admin_port));
    info!("lmd-daemon listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(engine_handle, dispatcher_handle);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .init();
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> =
        allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}

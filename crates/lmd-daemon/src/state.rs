//! Shared runtime state for lmd-daemon.
//!
//! All types here are `Clone`-able (via `Arc`). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::Arc;

use lmd_dispatcher::Dispatcher;
use lmd_scheduler::Engine;
use lmd_store::Store;

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub engine: Arc<Engine>,
    pub dispatcher: Arc<Dispatcher>,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, engine: Arc<Engine>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store,
            engine,
            dispatcher,
            build: BuildInfo { service: "lmd-daemon", version: env!("CARGO_PKG_VERSION") },
        }
    }
}

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START.get_or_init(std::time::Instant::now).elapsed().as_secs()
}

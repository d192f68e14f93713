//! The Scheduler (§4.5): drives the polling loop, owns concurrency control,
//! and composes `RateLimiter`, `CircuitBreaker`, `Fetcher`, `DiffEngine`, and
//! `Store` into one straight-line poll task per target. No singletons or
//! module-level state; everything lives on [`Engine`], constructed once at
//! startup and passed explicitly (§9 Design Notes).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lmd_guard::circuit_breaker::{self, CircuitBreakerConfig};
use lmd_schemas::{CircuitBreakerState, Fetcher, PollingTarget};
use lmd_store::Store;
use tracing::{info, warn};

use crate::config::SchedulerConfig;

/// The scheduler's in-memory bookkeeping. None of this is durable: a restart
/// simply re-derives due-ness from the persisted `PollingTarget` state.
struct RuntimeState {
    active: HashMap<String, Instant>,
    queued: HashSet<String>,
    ready_queue: VecDeque<String>,
    /// Last first-page listing-ID set observed per target, for the
    /// first-page fast path (§4.5 step 2).
    first_page_cache: HashMap<String, HashSet<String>>,
    /// Targets temporarily skipped after a rate-limit denial or a fetch
    /// failure, until the stored instant elapses (§4.5 steps 1 and 7).
    cooldowns: HashMap<String, DateTime<Utc>>,
}

impl RuntimeState {
    fn new() -> Self {
        Self {
            active: HashMap::new(),
            queued: HashSet::new(),
            ready_queue: VecDeque::new(),
            first_page_cache: HashMap::new(),
            cooldowns: HashMap::new(),
        }
    }
}

pub struct Engine {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn Fetcher>,
    rate_limiter: Arc<lmd_guard::RateLimiter>,
    circuit_breaker_config: CircuitBreakerConfig,
    config: SchedulerConfig,
    state: Mutex<RuntimeState>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn Fetcher>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            fetcher,
            rate_limiter: Arc::new(lmd_guard::RateLimiter::new()),
            circuit_breaker_config: CircuitBreakerConfig::default(),
            config,
            state: Mutex::new(RuntimeState::new()),
        })
    }

    /// Drives the poll/reconciliation/watchdog timers until `shutdown` fires,
    /// then drains in-flight poll tasks up to `drain_deadline`.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut poll_ticker = tokio::time::interval(self.config.poll_interval);
        let mut reconcile_ticker = tokio::time::interval(self.config.reconciliation_interval);
        let mut watchdog_ticker = tokio::time::interval(self.config.watchdog_interval);

        loop {
            tokio::select! {
                _ = poll_ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        warn!(error = %err, "scheduler tick failed");
                    }
                }
                _ = reconcile_ticker.tick() => {
                    if let Err(err) = self.reconcile().await {
                        warn!(error = %err, "reconciliation sweep failed");
                    }
                }
                _ = watchdog_ticker.tick() => {
                    self.watchdog_sweep();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("scheduler shutting down, draining in-flight polls");
        let deadline = tokio::time::Instant::now() + self.config.drain_deadline;
        loop {
            if tokio::time::Instant::now() >= deadline {
                let remaining = self.state.lock().unwrap().active.len();
                if remaining > 0 {
                    warn!(remaining, "drain deadline exceeded, abandoning in-flight polls");
                }
                break;
            }
            if self.state.lock().unwrap().active.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// One scheduler tick (§4.5): load targets, filter to due ones, enqueue
    /// idempotently, then spawn poll tasks up to `max_concurrent_polls`.
    async fn tick(self: &Arc<Self>) -> anyhow::Result<()> {
        let targets = self.store.list_targets().await?;
        let now = Utc::now();

        for mut target in targets {
            if !target.enabled {
                continue;
            }
            let already_active_or_queued = {
                let state = self.state.lock().unwrap();
                state.active.contains_key(&target.id) || state.queued.contains(&target.id)
            };
            if already_active_or_queued {
                continue;
            }
            if let Some(until) = self.state.lock().unwrap().cooldowns.get(&target.id).copied() {
                if now < until {
                    continue;
                }
            }
            if !self.due(&target, now) {
                continue;
            }
            // CircuitBreaker.allow may flip OPEN -> HALF_OPEN; persist that
            // transition immediately so the next tick sees it.
            let allowed = circuit_breaker::allow(&mut target.circuit_breaker, &self.circuit_breaker_config, now);
            if !allowed {
                continue;
            }
            self.store.upsert_target(&target).await?;

            let mut state = self.state.lock().unwrap();
            state.queued.insert(target.id.clone());
            state.ready_queue.push_back(target.id.clone());
        }

        loop {
            let next_id = {
                let mut state = self.state.lock().unwrap();
                if state.active.len() >= self.config.max_concurrent_polls {
                    None
                } else {
                    state.ready_queue.pop_front()
                }
            };
            let Some(id) = next_id else { break };
            {
                let mut state = self.state.lock().unwrap();
                state.queued.remove(&id);
                state.active.insert(id.clone(), Instant::now());
            }
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                engine.run_poll_task(&id).await;
                engine.state.lock().unwrap().active.remove(&id);
            });
        }

        Ok(())
    }

    fn due(&self, target: &PollingTarget, now: DateTime<Utc>) -> bool {
        let Some(last_polled) = target.last_polled_at else { return true };
        let interval = lmd_guard::next_interval_secs(
            &target.intervals,
            &target.adaptive_policy,
            target.current_change_rate,
            target.consecutive_failures,
            self.config.peak_hours.contains(now),
            target.circuit_breaker.state,
        );
        (now - last_polled).num_seconds() >= interval as i64
    }

    /// Catches panics/errors at the task boundary so one failing poll cannot
    /// take down the scheduler (§5 Failure isolation).
    async fn run_poll_task(self: &Arc<Self>, target_id: &str) {
        let result = self.poll_task(target_id).await;
        if let Err(err) = result {
            warn!(target_id, error = %err, "poll task failed");
        }
    }

    pub(crate) async fn poll_task(&self, target_id: &str) -> anyhow::Result<()> {
        let Some(mut target) = self.store.get_target(target_id).await? else {
            return Ok(());
        };
        let now = Utc::now();

        let decision = self.rate_limiter.allow(&target.domain, &target.rate_limit_policy, now);
        if !decision.allowed {
            self.state
                .lock()
                .unwrap()
                .cooldowns
                .insert(target.id.clone(), now + chrono::Duration::seconds(decision.retry_after_secs as i64));
            return Ok(());
        }

        let fetch_result = self.attempt_fetch(&target, now).await;
        self.rate_limiter.release_burst(&target.domain);

        let fetch = match fetch_result {
            Ok(fetch) => fetch,
            Err(err) => {
                self.record_poll_failure(&mut target, now).await?;
                return Err(err);
            }
        };

        let canonical = self.store.list_listings(&target.url).await?;
        let outcome = lmd_diff::diff(&fetch, &canonical, &target, now);

        target.record_poll(now, outcome.events.len() as u32);
        target.last_polled_at = Some(now);
        target.last_success_at = Some(now);
        target.consecutive_failures = 0;
        circuit_breaker::record_success(&mut target.circuit_breaker, &self.circuit_breaker_config);
        self.state.lock().unwrap().cooldowns.remove(&target.id);

        self.store
            .commit_poll_outcome(&target, &outcome.updated_listings, &outcome.events)
            .await?;
        Ok(())
    }

    /// First-page fast path + full fetch (§4.5 steps 2-3).
    async fn attempt_fetch(&self, target: &PollingTarget, now: DateTime<Utc>) -> anyhow::Result<lmd_schemas::FetchResult> {
        let first_page = self.fetcher.fetch(&target.url, false).await?;
        let first_page_ids: HashSet<String> = first_page.listings.iter().map(|l| l.id.clone()).collect();

        let prior_ids = self.state.lock().unwrap().first_page_cache.get(&target.id).cloned();
        self.state
            .lock()
            .unwrap()
            .first_page_cache
            .insert(target.id.clone(), first_page_ids.clone());

        let unchanged = prior_ids
            .as_ref()
            .map(|prior| lmd_diff::first_page_unchanged(prior, &first_page_ids))
            .unwrap_or(false);

        if unchanged {
            let mut no_change = first_page;
            no_change.full = false;
            return Ok(no_change);
        }

        let _ = now;
        self.fetcher.fetch(&target.url, true).await
    }

    async fn record_poll_failure(&self, target: &mut PollingTarget, now: DateTime<Utc>) -> anyhow::Result<()> {
        target.last_polled_at = Some(now);
        target.consecutive_failures += 1;
        circuit_breaker::record_failure(&mut target.circuit_breaker, &self.circuit_breaker_config, now);

        let backoff_secs = (1u64 << target.consecutive_failures.min(4)).min(300);
        self.state
            .lock()
            .unwrap()
            .cooldowns
            .insert(target.id.clone(), now + chrono::Duration::seconds(backoff_secs as i64));

        self.store.upsert_target(target).await
    }

    /// Forces an immediate poll of one target outside its normal schedule,
    /// for the admin surface's force-poll trigger (§6). Reuses the same
    /// poll task the scheduler's own tick spawns, so it observes the rate
    /// limiter and circuit breaker exactly as a scheduled poll would.
    pub async fn force_poll(&self, target_id: &str) -> anyhow::Result<()> {
        self.poll_task(target_id).await
    }

    /// Forces a full fetch + diff for every enabled target regardless of
    /// schedule, and re-probes any tripped circuit breaker (§4.5).
    pub async fn reconcile(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let targets = self.store.list_targets().await?;
        for mut target in targets {
            if !target.enabled {
                continue;
            }
            if target.circuit_breaker.state == CircuitBreakerState::Open {
                target.circuit_breaker.state = CircuitBreakerState::HalfOpen;
                target.circuit_breaker.half_open_successes = 0;
                target.circuit_breaker.half_open_probe_in_flight = false;
            }

            let fetch = match self.fetcher.fetch(&target.url, true).await {
                Ok(fetch) => fetch,
                Err(err) => {
                    warn!(target_id = %target.id, error = %err, "reconciliation fetch failed");
                    continue;
                }
            };
            let canonical = self.store.list_listings(&target.url).await?;
            let outcome = lmd_diff::diff(&fetch, &canonical, &target, now);
            target.record_poll(now, outcome.events.len() as u32);
            target.last_polled_at = Some(now);
            target.last_success_at = Some(now);
            self.store
                .commit_poll_outcome(&target, &outcome.updated_listings, &outcome.events)
                .await?;
        }
        Ok(())
    }

    /// Evicts any task in `active` older than `task_ceiling`, freeing its
    /// concurrency slot. The task itself is not cancelled; it may still
    /// complete and persist its result.
    fn watchdog_sweep(&self) {
        let mut state = self.state.lock().unwrap();
        let ceiling = self.config.task_ceiling;
        let stale: Vec<String> = state
            .active
            .iter()
            .filter(|(_, started)| started.elapsed() > ceiling)
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale {
            warn!(target_id = %id, "watchdog evicting stale poll task from active set");
            state.active.remove(&id);
        }
    }
}

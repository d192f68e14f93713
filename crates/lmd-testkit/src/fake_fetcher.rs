//! A scripted [`Fetcher`] for driving the scheduler deterministically: each
//! call to [`ScriptedFetcher::fetch`] returns the next page in a pre-loaded
//! sequence, so a test can script "first poll sees listing A, second poll
//! sees A removed and B added" without any network I/O.

use std::sync::Mutex;

use chrono::Utc;
use lmd_schemas::{FetchResult, Fetcher, RawListing};

pub struct ScriptedFetcher {
    pages: Mutex<Vec<Vec<RawListing>>>,
    calls: Mutex<u32>,
}

impl ScriptedFetcher {
    /// Each entry is returned once, in order; the last entry repeats once
    /// exhausted, matching how a real site settles into a steady state.
    pub fn new(pages: Vec<Vec<RawListing>>) -> Self {
        Self { pages: Mutex::new(pages), calls: Mutex::new(0) }
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, target_url: &str, full: bool) -> anyhow::Result<FetchResult> {
        let mut calls = self.calls.lock().unwrap();
        let pages = self.pages.lock().unwrap();
        let index = (*calls as usize).min(pages.len().saturating_sub(1));
        let listings = pages.get(index).cloned().unwrap_or_default();
        *calls += 1;

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

/// A `Fetcher` that always fails, for exercising `CircuitBreaker` trip
/// behavior (§8 scenario 5).
pub struct FailingFetcher;

#[async_trait::async_trait]
impl Fetcher for FailingFetcher {
    async fn fetch(&self, target_url: &str, _full: bool) -> anyhow::Result<FetchResult> {
        anyhow::bail!("simulated fetch failure for {target_url}")
    }
}

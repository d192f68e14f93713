//! The daemon's default `Fetcher` implementation.
//!
//! The actual page-scraping and field-extraction logic for a given listing
//! site is outside the engine's scope (§1 Non-goals: "the HTML/JSON
//! extraction logic ... is out of scope"). This is the simplest
//! implementation the `Fetcher` contract supports — it expects the target
//! URL to already serve a JSON array of listings — so the daemon is
//! runnable out of the box; a real deployment swaps this for a
//! site-specific `Fetcher`.

use chrono::Utc;
use lmd_schemas::{FetchResult, Fetcher, RawListing};

pub struct HttpJsonFetcher {
    client: reqwest::Client,
}

impl Default for HttpJsonFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpJsonFetcher {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpJsonFetcher {
    async fn fetch(&self, target_url: &str, full: bool) -> anyhow::Result<FetchResult> {
        let response = self.client.get(target_url).query(&[("full", full)]).send().await?;
        let listings: Vec<RawListing> = response.error_for_status()?.json().await?;
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

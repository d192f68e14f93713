use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A duck-typed listing as it crosses the Fetcher boundary: tracked fields
/// typed, everything else kept as an opaque blob for `raw_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    pub id: String,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub image_urls: Vec<String>,
    /// Anything the Fetcher surfaced that the engine does not track by name.
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub listings: Vec<RawListing>,
    pub total_listings: u64,
    pub pages_scraped: u32,
    pub scraped_at: DateTime<Utc>,
    pub source: String,
    /// Whether this fetch covered the full result surface (`full=true`) or
    /// only the first page (`full=false`).
    pub full: bool,
}

/// The external collaborator contract the engine consumes. Implemented
/// outside the core (HTML/JSON extraction lives there); the core only calls
/// this trait.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, target_url: &str, full: bool) -> anyhow::Result<FetchResult>;
}

//! `lmdctl events list` — paged read of the outbox via `/v1/events`.

use anyhow::Result;
use serde_json::Value;

use super::{print_json, ApiClient};

pub async fn list(client: &ApiClient, status: Option<String>, limit: i64, offset: i64) -> Result<()> {
    let mut path = format!("/v1/events?limit={limit}&offset={offset}");
    if let Some(status) = status {
        path.push_str(&format!("&status={}", status.to_uppercase()));
    }
    let events: Value = client.get(&path).await?;
    print_json(&events)
}

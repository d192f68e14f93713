//! `lmd status` / `lmd health` / `lmd reconcile` — fleet-wide commands.

use anyhow::Result;
use serde_json::Value;

use super::{print_json, ApiClient};

pub async fn health(client: &ApiClient) -> Result<()> {
    let body: Value = client.get("/v1/health").await?;
    print_json(&body)
}

pub async fn status(client: &ApiClient) -> Result<()> {
    let body: Value = client.get("/v1/status").await?;
    print_json(&body)
}

pub async fn reconcile(client: &ApiClient) -> Result<()> {
    let body: Value = client.post_empty("/v1/reconcile").await?;
    print_json(&body)
}

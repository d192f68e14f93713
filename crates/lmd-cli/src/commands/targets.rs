//! `lmd target ...` — CRUD and trigger commands against `/v1/targets`.

use anyhow::{Context, Result};
use lmd_schemas::PollingTarget;
use serde::Serialize;
use serde_json::Value;

use super::{print_json, ApiClient};

/// Mirrors `lmd_daemon::api_types::CreateTargetRequest`. Kept as a local,
/// minimal struct rather than a dependency on the daemon crate — the CLI
/// only needs to produce the wire shape, not the daemon's internals.
#[derive(Serialize)]
struct CreateTargetRequest {
    id: String,
    url: String,
    tracked_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grace_period_secs: Option<u64>,
    enabled: bool,
}

pub async fn list(client: &ApiClient) -> Result<()> {
    let targets: Vec<PollingTarget> = client.get("/v1/targets").await?;
    print_json(&targets)
}

pub async fn get(client: &ApiClient, id: &str) -> Result<()> {
    let target: PollingTarget = client.get(&format!("/v1/targets/{id}")).await?;
    print_json(&target)
}

pub async fn create(
    client: &ApiClient,
    id: String,
    url: String,
    tracked_fields: Vec<String>,
    grace_period_secs: Option<u64>,
    disabled: bool,
) -> Result<()> {
    let request = CreateTargetRequest {
        id,
        url,
        tracked_fields,
        grace_period_secs,
        enabled: !disabled,
    };
    let target: PollingTarget = client.post("/v1/targets", &request).await?;
    print_json(&target)
}

/// Replaces a target wholesale. `body_file` must contain a complete
/// `PollingTarget` JSON document (the admin surface takes full replacement,
/// not a partial patch) — `lmd target get` followed by editing its output
/// is the usual way to produce one.
pub async fn update(client: &ApiClient, id: &str, body_file: &str) -> Result<()> {
    let raw = std::fs::read_to_string(body_file)
        .with_context(|| format!("reading {body_file}"))?;
    let body: Value = serde_json::from_str(&raw).context("body file must be valid JSON")?;
    let target: PollingTarget = client.put(&format!("/v1/targets/{id}"), &body).await?;
    print_json(&target)
}

pub async fn delete(client: &ApiClient, id: &str) -> Result<()> {
    client.delete(&format!("/v1/targets/{id}")).await?;
    println!("deleted target={id}");
    Ok(())
}

pub async fn poll(client: &ApiClient, id: &str) -> Result<()> {
    let response: Value = client.post_empty(&format!("/v1/targets/{id}/poll")).await?;
    print_json(&response)
}

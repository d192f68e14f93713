//! `lmd subscriber ...` — CRUD commands against `/v1/subscribers`.

use anyhow::{Context, Result};
use lmd_schemas::{RetryPolicy, Subscriber, SubscriberType};

use super::{print_json, ApiClient};

pub async fn list(client: &ApiClient) -> Result<()> {
    let subscribers: Vec<Subscriber> = client.get("/v1/subscribers").await?;
    print_json(&subscribers)
}

pub async fn create(
    client: &ApiClient,
    id: String,
    kind: String,
    endpoint: String,
    timeout_ms: u64,
    webhook_secret_env: Option<String>,
    disabled: bool,
) -> Result<()> {
    let subscriber_type = match kind.to_uppercase().as_str() {
        "WEBHOOK" => SubscriberType::Webhook,
        "WEBSOCKET" => SubscriberType::Websocket,
        "EMAIL" => SubscriberType::Email,
        other => anyhow::bail!("invalid --type '{other}'. expected one of: webhook | websocket | email"),
    };

    let subscriber = Subscriber {
        id,
        subscriber_type,
        endpoint,
        timeout_ms,
        retry_policy: RetryPolicy::default(),
        enabled: !disabled,
        webhook_secret_env,
    };

    let created: Subscriber = client.post("/v1/subscribers", &subscriber).await?;
    print_json(&created)
}

/// Replaces a subscriber wholesale, same full-replacement semantics as
/// `lmd target update`.
pub async fn update(client: &ApiClient, id: &str, body_file: &str) -> Result<()> {
    let raw = std::fs::read_to_string(body_file)
        .with_context(|| format!("reading {body_file}"))?;
    let body: Subscriber = serde_json::from_str(&raw).context("body file must contain a full subscriber JSON document")?;
    let updated: Subscriber = client.put(&format!("/v1/subscribers/{id}"), &body).await?;
    print_json(&updated)
}

pub async fn delete(client: &ApiClient, id: &str) -> Result<()> {
    client.delete(&format!("/v1/subscribers/{id}")).await?;
    println!("deleted subscriber={id}");
    Ok(())
}

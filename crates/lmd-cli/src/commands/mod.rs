//! Command handler modules for lmd-cli.
//!
//! Each submodule wraps one slice of the admin REST surface (`lmd-daemon`'s
//! `routes.rs`) in a thin HTTP client call plus human-readable output.
//! Shared request plumbing lives here.

pub mod events;
pub mod status;
pub mod subscribers;
pub mod targets;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Thin wrapper around a `reqwest::Client` plus the daemon's base URL.
/// Every command module takes one of these instead of raw strings so the
/// base-URL-joining logic lives in exactly one place.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.trim_end_matches('/').to_string() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.http.get(self.url(path)).send().await.context("request failed")?;
        unwrap_json(resp).await
    }

    pub async fn post<B: serde::Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .context("request failed")?;
        unwrap_json(resp).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.http.post(self.url(path)).send().await.context("request failed")?;
        unwrap_json(resp).await
    }

    pub async fn put<B: serde::Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .http
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .context("request failed")?;
        unwrap_json(resp).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let resp = self.http.delete(self.url(path)).send().await.context("request failed")?;
        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{} responded {}: {}", path, status, body);
    }
}

async fn unwrap_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let body = resp.text().await.context("reading response body")?;
    if !status.is_success() {
        anyhow::bail!("server responded {}: {}", status, body);
    }
    serde_json::from_str(&body).with_context(|| format!("unexpected response body: {}", body))
}

/// Pretty-print any serializable value as indented JSON, for all `--json`
/// (well, always-JSON) command output.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

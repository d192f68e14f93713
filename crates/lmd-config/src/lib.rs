//! Environment and layered-file configuration for the engine (§6 Admin
//! surface: "Environment variables recognized").
//!
//! Two concerns live here:
//! - [`EngineConfig`]: the small set of environment variables that size and
//!   address the running daemon (concurrency cap, ports, store location).
//! - [`load_layered_yaml`] / [`load_layered_yaml_from_strings`]: merges an
//!   ordered stack of YAML documents (e.g. a base target fleet overlaid by a
//!   per-environment file) into one canonical, hashed JSON document, so an
//!   operator can tell whether two deployments are running the same target
//!   set without diffing files by hand.

pub mod secrets;

use anyhow::{Context, Result};
use lmd_schemas::hash::{canonicalize_json, sha256_hex_of};
use serde_json::Value;

/// Runtime configuration read once at startup. Per §7, a missing or invalid
/// value here is a [`lmd_schemas::EngineError::Config`] and is the only
/// error kind allowed to abort the process (non-zero exit, §6).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Store connection string (`storePath`). Required — there is no
    /// in-memory fallback for a production daemon.
    pub store_path: String,
    /// Optional fast-cache host (`redisHost`). `None` disables the cache;
    /// the store's durable tier is still authoritative (§4.1).
    pub redis_host: Option<String>,
    pub redis_port: u16,
    pub max_concurrent_polls: usize,
    pub poll_interval_ms: u64,
    pub admin_port: u16,
    pub log_level: String,
    /// Default HMAC signing secret used when a subscriber does not name its
    /// own `webhook_secret_env` (§4.6, §6 Outbox JSON payload signing).
    pub webhook_secret: Option<String>,
}

impl EngineConfig {
    /// Reads `{redisHost, redisPort, storePath, maxConcurrentPolls,
    /// pollIntervalMs, adminPort, logLevel, webhookSecret}` from the process
    /// environment (§6). Everything but `storePath` has a sane default.
    pub fn from_env() -> Result<Self> {
        let store_path = std::env::var("STORE_PATH")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .context("STORE_PATH (or DATABASE_URL) must be set — the engine has no durable store without it")?;

        Ok(Self {
            store_path,
            redis_host: non_empty_env("REDIS_HOST"),
            redis_port: parse_env_or("REDIS_PORT", 6379)?,
            max_concurrent_polls: parse_env_or("MAX_CONCURRENT_POLLS", 10)?,
            poll_interval_ms: parse_env_or("POLL_INTERVAL_MS", 5_000)?,
            admin_port: parse_env_or("ADMIN_PORT", 8080)?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            webhook_secret: non_empty_env("WEBHOOK_SECRET"),
        })
    }

    pub fn redis_url(&self) -> Option<String> {
        self.redis_host
            .as_ref()
            .map(|host| format!("redis://{host}:{port}", port = self.redis_port))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {name}: {e}")),
        _ => Ok(default),
    }
}

/// The result of merging an ordered stack of YAML documents: canonical
/// (sorted-key) JSON, its pretty string form, and a stable hash of the two.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Load and deep-merge YAML files in order (later files override earlier
/// ones), then canonicalize and hash the result.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut contents = Vec::with_capacity(paths.len());
    for p in paths {
        contents.push(std::fs::read_to_string(p).with_context(|| format!("read config: {p}"))?);
    }
    let refs: Vec<&str> = contents.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&refs)
}

/// Same as [`load_layered_yaml`] but takes already-loaded YAML text, so
/// callers (and tests) don't need real files on disk.
pub fn load_layered_yaml_from_strings(docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());
    for doc in docs {
        let yaml_val: serde_yaml::Value =
            serde_yaml::from_str(doc).context("parse yaml document")?;
        let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    let canonical_value = canonicalize_json(&merged);
    let canonical_json =
        serde_json::to_string_pretty(&canonical_value).context("serialize canonical json")?;
    let config_hash = sha256_hex_of(&merged);

    Ok(LoadedConfig { config_json: canonical_value, canonical_json, config_hash })
}

/// Deep-merge: objects merge recursively; arrays and scalars are replaced
/// wholesale by the later document.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

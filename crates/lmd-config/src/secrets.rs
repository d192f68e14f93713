//! Single source of truth for runtime secret resolution.
//!
//! Config/YAML stores only environment variable **names**; values are
//! resolved once at startup and passed into constructors so that
//! `std::env::var` calls don't end up scattered across the engine. `Debug`
//! on [`ResolvedSecrets`] redacts every value — error messages and logs may
//! reference a variable's name, never its contents.

use anyhow::{bail, Result};

/// Secrets resolved once at daemon startup.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Durable store connection string (`storePath` / `DATABASE_URL`).
    pub store_path: String,
    /// Optional fast-cache connection string (`redisHost`/`redisPort`).
    pub redis_url: Option<String>,
    /// Default HMAC signing secret for subscribers that don't name their own
    /// `webhook_secret_env` (§4.6).
    pub default_webhook_secret: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("store_path", &"<REDACTED>")
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<REDACTED>"))
            .field(
                "default_webhook_secret",
                &self.default_webhook_secret.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Resolve a named environment variable, returning `None` if it is unset or
/// blank. Never surfaces the value in an error path — callers report the
/// variable name only.
pub fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve the secrets needed to start the engine from an already-loaded
/// [`crate::EngineConfig`]. Fails closed: a missing store location is a
/// [`lmd_schemas::EngineError::Config`] and must abort startup (§7).
pub fn resolve_engine_secrets(config: &crate::EngineConfig) -> Result<ResolvedSecrets> {
    if config.store_path.trim().is_empty() {
        bail!("SECRETS_MISSING: storePath is required to start the engine");
    }
    Ok(ResolvedSecrets {
        store_path: config.store_path.clone(),
        redis_url: config.redis_url(),
        default_webhook_secret: config.webhook_secret.clone(),
    })
}

/// Resolve a subscriber's HMAC signing secret: its own named env var if
/// configured, falling back to the engine-wide default (§4.6).
pub fn resolve_webhook_secret(
    subscriber_env_var: Option<&str>,
    default_secret: Option<&str>,
) -> Option<String> {
    subscriber_env_var
        .and_then(resolve_env)
        .or_else(|| default_secret.map(|s| s.to_string()))
}

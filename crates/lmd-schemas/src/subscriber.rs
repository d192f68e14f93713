use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriberType {
    Webhook,
    Websocket,
    Email,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_backoff_secs: 1, max_backoff_secs: 300 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    pub subscriber_type: SubscriberType,
    pub endpoint: String,
    pub timeout_ms: u64,
    pub retry_policy: RetryPolicy,
    pub enabled: bool,
    /// Name of the environment variable holding the HMAC signing secret, if
    /// signature verification is enabled for this subscriber. The value is
    /// never stored in config or in this struct — only the variable name.
    pub webhook_secret_env: Option<String>,
}

impl Subscriber {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

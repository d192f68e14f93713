//! `SubscriberSink` is the single choke-point through which every outbound
//! delivery passes, regardless of subscriber type: pluggable implementations
//! behind a thin trait, no business logic leaking across it.

use hmac::{Hmac, Mac};
use lmd_schemas::{ChangeEvent, Subscriber, SubscriberType};
use sha2::Sha256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
}

/// Delivers one event to one subscriber. Implementations own their own
/// transport (HTTP, websocket push, …); the dispatcher only ever calls
/// `deliver`.
#[async_trait::async_trait]
pub trait SubscriberSink: Send + Sync {
    async fn deliver(&self, event: &ChangeEvent, subscriber: &Subscriber) -> DeliveryOutcome;
}

/// Delivers webhook subscribers via HTTP POST; silently no-ops for other
/// subscriber types (websocket/email delivery are external collaborators
/// outside the core, per the Fetcher-style boundary).
pub struct WebhookSink {
    client: reqwest::Client,
}

impl Default for WebhookSink {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookSink {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    fn signature_header(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts a key of any length");
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait::async_trait]
impl SubscriberSink for WebhookSink {
    async fn deliver(&self, event: &ChangeEvent, subscriber: &Subscriber) -> DeliveryOutcome {
        if subscriber.subscriber_type != SubscriberType::Webhook {
            return DeliveryOutcome::Delivered;
        }

        let payload = event.to_payload();
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(_) => return DeliveryOutcome::Failed,
        };

        let mut request = self
            .client
            .post(&subscriber.endpoint)
            .timeout(subscriber.timeout())
            .header("Content-Type", "application/json")
            .header("X-Event-Id", event.event_id.to_string())
            .header("X-Event-Type", format!("{:?}", event.event_type).to_uppercase());

        if let Some(env_var) = &subscriber.webhook_secret_env {
            if let Ok(secret) = std::env::var(env_var) {
                request = request.header("X-Signature", Self::signature_header(&secret, &body));
            }
        }

        let response = request.body(body).send().await;
        match response {
            Ok(resp) if resp.status().is_success() => DeliveryOutcome::Delivered,
            _ => DeliveryOutcome::Failed,
        }
    }
}

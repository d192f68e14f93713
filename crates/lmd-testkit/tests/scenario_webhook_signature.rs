//! Verifies `WebhookSink` signs the exact delivered body with HMAC-SHA256 and
//! sends it as `X-Signature: sha256=<hex>` (§6), against a real HTTP server.

use hmac::{Hmac, Mac};
use lmd_dispatcher::{SubscriberSink, WebhookSink};
use lmd_schemas::{ChangeEvent, EventStatus, EventType, RetryPolicy, SignificanceBucket, Subscriber, SubscriberType};
use sha2::Sha256;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const SECRET_ENV_VAR: &str = "LMD_TEST_WEBHOOK_SECRET_SIGNATURE";
const SECRET: &str = "top-secret-signing-key";

fn sample_event() -> ChangeEvent {
    ChangeEvent {
        event_id: Uuid::new_v4(),
        event_type: EventType::Updated,
        listing_id: "listing-x".to_string(),
        source: "https://example.test/listings".to_string(),
        changed_fields: Vec::new(),
        field_hash_before: Some("before".to_string()),
        field_hash_after: "after".to_string(),
        detected_at: chrono::Utc::now(),
        version: 2,
        confidence: 0.8,
        significance: SignificanceBucket::Medium,
        metadata: serde_json::json!({}),
        status: EventStatus::Pending,
        retry_count: 0,
        last_retry_at: None,
    }
}

struct SignatureMatcher;

impl wiremock::Match for SignatureMatcher {
    fn matches(&self, request: &Request) -> bool {
        let header = match request.headers.get("X-Signature") {
            Some(values) => values.to_str().unwrap_or_default().to_string(),
            None => return false,
        };
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(&request.body);
        let expected = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
        header == expected
    }
}

#[tokio::test]
async fn webhook_delivery_carries_a_valid_hmac_signature_over_the_exact_body() {
    std::env::set_var(SECRET_ENV_VAR, SECRET);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(SignatureMatcher)
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let subscriber = Subscriber {
        id: "sub-signed".to_string(),
        subscriber_type: SubscriberType::Webhook,
        endpoint: format!("{}/hook", server.uri()),
        timeout_ms: 2000,
        retry_policy: RetryPolicy::default(),
        enabled: true,
        webhook_secret_env: Some(SECRET_ENV_VAR.to_string()),
    };

    let sink = WebhookSink::new();
    let outcome = sink.deliver(&sample_event(), &subscriber).await;

    assert_eq!(outcome, lmd_dispatcher::DeliveryOutcome::Delivered);
    server.verify().await;

    std::env::remove_var(SECRET_ENV_VAR);
}

#[tokio::test]
async fn webhook_delivery_without_a_configured_secret_sends_no_signature_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let subscriber = Subscriber {
        id: "sub-unsigned".to_string(),
        subscriber_type: SubscriberType::Webhook,
        endpoint: format!("{}/hook", server.uri()),
        timeout_ms: 2000,
        retry_policy: RetryPolicy::default(),
        enabled: true,
        webhook_secret_env: None,
    };

    let sink = WebhookSink::new();
    let outcome = sink.deliver(&sample_event(), &subscriber).await;
    assert_eq!(outcome, lmd_dispatcher::DeliveryOutcome::Delivered);
}

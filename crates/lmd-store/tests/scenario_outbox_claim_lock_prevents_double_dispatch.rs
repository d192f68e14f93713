//! Requires a live Postgres reachable via DATABASE_URL. Run with
//! `cargo test --features db-tests --test scenario_outbox_claim_lock_prevents_double_dispatch`.

use std::time::Duration;

use chrono::Utc;
use lmd_schemas::{ChangeEvent, ChangeType, ChangedField, EventStatus, EventType, SignificanceBucket};
use lmd_store::{connect_from_env, EventOutcome, Store};
use uuid::Uuid;

fn sample_event(listing_id: &str) -> ChangeEvent {
    ChangeEvent {
        event_id: Uuid::new_v4(),
        event_type: EventType::Updated,
        listing_id: listing_id.to_string(),
        source: "test-source".to_string(),
        changed_fields: vec![ChangedField {
            field: "price".to_string(),
            old_value: serde_json::json!(100),
            new_value: serde_json::json!(90),
            change_type: ChangeType::Modified,
            significance: 0.1,
        }],
        field_hash_before: Some("before".to_string()),
        field_hash_after: "after".to_string(),
        detected_at: Utc::now(),
        version: 2,
        confidence: 0.2,
        significance: SignificanceBucket::Low,
        metadata: serde_json::json!({}),
        status: EventStatus::Pending,
        retry_count: 0,
        last_retry_at: None,
    }
}

#[tokio::test]
async fn two_concurrent_claimers_never_receive_the_same_event() {
    let store = connect_from_env()
        .await
        .expect("DATABASE_URL must point at a reachable Postgres for this test");

    let event = sample_event("double-dispatch-listing");
    store
        .append_events(std::slice::from_ref(&event))
        .await
        .expect("append_events");

    let lease = Duration::from_secs(30);
    let (first, second) = tokio::join!(
        store.claim_pending_events(10, lease),
        store.claim_pending_events(10, lease),
    );
    let first = first.expect("first claim");
    let second = second.expect("second claim");

    let first_ids: Vec<Uuid> = first.iter().map(|e| e.event_id).collect();
    let second_ids: Vec<Uuid> = second.iter().map(|e| e.event_id).collect();

    assert!(
        first_ids.contains(&event.event_id) ^ second_ids.contains(&event.event_id),
        "exactly one of the two concurrent claimers must win the row lock"
    );

    for claimed in first.iter().chain(second.iter()) {
        if claimed.event_id == event.event_id {
            store
                .complete_event(claimed.event_id, EventOutcome::Processed, false)
                .await
                .expect("complete_event");
        }
    }
}

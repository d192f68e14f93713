//! Requires a live Postgres reachable via DATABASE_URL. Run with
//! `cargo test --features db-tests --test scenario_stale_claim_is_reclaimable`.

use std::time::Duration;

use chrono::Utc;
use lmd_schemas::{ChangeEvent, ChangeType, ChangedField, EventStatus, EventType, SignificanceBucket};
use lmd_store::{connect_from_env, EventOutcome, Store};
use uuid::Uuid;

fn sample_event(listing_id: &str) -> ChangeEvent {
    ChangeEvent {
        event_id: Uuid::new_v4(),
        event_type: EventType::Created,
        listing_id: listing_id.to_string(),
        source: "test-source".to_string(),
        changed_fields: vec![ChangedField {
            field: "title".to_string(),
            old_value: serde_json::Value::Null,
            new_value: serde_json::json!("A listing"),
            change_type: ChangeType::Added,
            significance: 1.0,
        }],
        field_hash_before: None,
        field_hash_after: "after".to_string(),
        detected_at: Utc::now(),
        version: 1,
        confidence: 1.0,
        significance: SignificanceBucket::High,
        metadata: serde_json::json!({}),
        status: EventStatus::Pending,
        retry_count: 0,
        last_retry_at: None,
    }
}

#[tokio::test]
async fn expired_lease_is_reclaimed_by_a_later_claim() {
    let store = connect_from_env()
        .await
        .expect("DATABASE_URL must point at a reachable Postgres for this test");

    let event = sample_event("stale-claim-listing");
    store
        .append_events(std::slice::from_ref(&event))
        .await
        .expect("append_events");

    // Claim with a lease that has already expired by the time we look again.
    let claimed = store
        .claim_pending_events(10, Duration::from_millis(1))
        .await
        .expect("initial claim");
    assert!(claimed.iter().any(|e| e.event_id == event.event_id));

    tokio::time::sleep(Duration::from_secs(1)).await;

    let reclaimed = store
        .claim_pending_events(10, Duration::from_secs(30))
        .await
        .expect("reclaim after lease expiry");
    assert!(
        reclaimed.iter().any(|e| e.event_id == event.event_id),
        "a claim whose lease has expired must become claimable again"
    );

    store
        .complete_event(event.event_id, EventOutcome::Processed, false)
        .await
        .expect("complete_event");
}

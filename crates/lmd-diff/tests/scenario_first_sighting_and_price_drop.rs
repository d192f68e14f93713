use chrono::Utc;
use lmd_diff::diff;
use lmd_schemas::target::DiffPolicy;
use lmd_schemas::{
    AdaptivePolicy, EventType, FetchResult, IntervalBounds, PollingTarget, RateLimitPolicy,
    RawListing, SignificanceBucket,
};
use serde_json::Value;

fn target() -> PollingTarget {
    PollingTarget {
        id: "t1".into(),
        url: "https://example.test/listings".into(),
        domain: "example.test".into(),
        intervals: IntervalBounds { base_interval_secs: 300, min_interval_secs: 60, max_interval_secs: 3600 },
        adaptive_policy: AdaptivePolicy::default(),
        rate_limit_policy: RateLimitPolicy::default(),
        tracked_fields: vec!["title".into(), "price".into(), "condition".into(), "location".into()],
        diff_policy: DiffPolicy::default(),
        grace_period_secs: 300,
        enabled: true,
        last_polled_at: None,
        last_success_at: None,
        consecutive_failures: 0,
        circuit_breaker: Default::default(),
        current_change_rate: 0.0,
        change_history: Vec::new(),
    }
}

fn raw(id: &str, title: &str, price: f64) -> RawListing {
    RawListing {
        id: id.into(),
        title: Some(title.into()),
        price: Some(price),
        condition: None,
        location: None,
        url: None,
        image_urls: vec![],
        raw: Value::Object(Default::default()),
    }
}

#[test]
fn first_sighting_then_price_drop() {
    let target = target();
    let now = Utc::now();

    let first_fetch = FetchResult {
        listings: vec![raw("a", "X", 100.0)],
        total_listings: 1,
        pages_scraped: 1,
        scraped_at: now,
        source: target.url.clone(),
        full: true,
    };
    let first = diff(&first_fetch, &[], &target, now);
    assert_eq!(first.events.len(), 1);
    assert_eq!(first.events[0].event_type, EventType::Created);

    let later = now + chrono::Duration::minutes(10);
    let second_fetch = FetchResult {
        listings: vec![raw("a", "X", 80.0)],
        total_listings: 1,
        pages_scraped: 1,
        scraped_at: later,
        source: target.url.clone(),
        full: true,
    };
    let second = diff(&second_fetch, &first.updated_listings, &target, later);
    assert_eq!(second.events.len(), 1);
    let event = &second.events[0];
    assert_eq!(event.event_type, EventType::Updated);
    assert_eq!(event.significance, SignificanceBucket::Low);
    assert_eq!(event.version, 2);
}

//! Exercises the literal end-to-end scenarios from §8 of the diff-engine
//! contract directly against `lmd_diff::diff`, without a store or scheduler
//! in the loop.

use chrono::Utc;
use lmd_schemas::{EventType, SignificanceBucket};
use lmd_testkit::fixtures::{raw_listing, target};

#[test]
fn first_sighting_creates_high_significance_event_with_version_one() {
    let t = target("t1", "https://example.test/listings");
    let now = Utc::now();
    let fetch = lmd_schemas::FetchResult {
        listings: vec![raw_listing("a", "X", 100.0)],
        total_listings: 1,
        pages_scraped: 1,
        scraped_at: now,
        source: t.url.clone(),
        full: true,
    };

    let outcome = lmd_diff::diff(&fetch, &[], &t, now);

    assert_eq!(outcome.events.len(), 1);
    let event = &outcome.events[0];
    assert_eq!(event.event_type, EventType::Created);
    assert_eq!(event.significance, SignificanceBucket::High);
    assert_eq!(event.version, 1);

    assert_eq!(outcome.updated_listings.len(), 1);
    assert_eq!(outcome.updated_listings[0].version, 1);
    assert_eq!(
        outcome.updated_listings[0].field_hash,
        lmd_schemas::listing::field_hash(&outcome.updated_listings[0].tracked_fields)
    );
}

#[test]
fn price_drop_from_100_to_80_is_low_bucket_with_confidence_0_4() {
    let t = target("t1", "https://example.test/listings");
    let now = Utc::now();

    let first_fetch = lmd_schemas::FetchResult {
        listings: vec![raw_listing("a", "X", 100.0)],
        total_listings: 1,
        pages_scraped: 1,
        scraped_at: now,
        source: t.url.clone(),
        full: true,
    };
    let first = lmd_diff::diff(&first_fetch, &[], &t, now);

    let second_fetch = lmd_schemas::FetchResult {
        listings: vec![raw_listing("a", "X", 80.0)],
        total_listings: 1,
        pages_scraped: 1,
        scraped_at: now,
        source: t.url.clone(),
        full: true,
    };
    let second = lmd_diff::diff(&second_fetch, &first.updated_listings, &t, now);

    assert_eq!(second.events.len(), 1);
    let event = &second.events[0];
    assert_eq!(event.event_type, EventType::Updated);
    assert_eq!(event.significance, SignificanceBucket::Low);
    assert_eq!(event.version, 2);
    assert_eq!(event.changed_fields.len(), 1);
    assert_eq!(event.changed_fields[0].field, "price");
    assert!((event.changed_fields[0].significance - 0.2).abs() < 1e-9);
    assert!((event.confidence - 0.4).abs() < 1e-9);
}

#[test]
fn cosmetic_title_whitespace_and_punctuation_changes_emit_nothing() {
    let t = target("t1", "https://example.test/listings");
    let now = Utc::now();

    let first_fetch = lmd_schemas::FetchResult {
        listings: vec![raw_listing("a", "MacBook Pro 14", 100.0)],
        total_listings: 1,
        pages_scraped: 1,
        scraped_at: now,
        source: t.url.clone(),
        full: true,
    };
    let first = lmd_diff::diff(&first_fetch, &[], &t, now);

    let second_fetch = lmd_schemas::FetchResult {
        listings: vec![raw_listing("a", "  macbook  pro  14!  ", 100.0)],
        total_listings: 1,
        pages_scraped: 1,
        scraped_at: now,
        source: t.url.clone(),
        full: true,
    };
    let second = lmd_diff::diff(&second_fetch, &first.updated_listings, &t, now);

    assert!(second.events.is_empty(), "cosmetically-equal titles must not emit an event");
}

#[test]
fn repeated_poll_with_identical_data_is_fully_idempotent() {
    let t = target("t1", "https://example.test/listings");
    let now = Utc::now();
    let fetch = lmd_schemas::FetchResult {
        listings: vec![raw_listing("a", "Couch", 100.0)],
        total_listings: 1,
        pages_scraped: 1,
        scraped_at: now,
        source: t.url.clone(),
        full: true,
    };

    let first = lmd_diff::diff(&fetch, &[], &t, now);
    let second = lmd_diff::diff(&fetch, &first.updated_listings, &t, now);

    assert!(second.events.is_empty(), "byte-identical scraped data must produce zero events");
    assert_eq!(
        second.updated_listings[0].version, first.updated_listings[0].version,
        "version must not bump when nothing changed"
    );
}

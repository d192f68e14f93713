use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use lmd_schemas::{
    listing::field_hash, CanonicalListing, ChangeEvent, ChangeType, ChangedField, EventStatus,
    EventType, FetchResult, ListingStatus, PollingTarget, RawListing, SignificanceBucket,
};

use crate::normalize::{jaccard_similarity, values_equal};

/// Output of one [`diff`] call: change-event drafts plus the full set of
/// canonical listings to persist (both mutated and untouched ones the
/// scheduler still needs to write back unchanged).
#[derive(Debug, Default)]
pub struct DiffOutcome {
    pub events: Vec<ChangeEvent>,
    pub updated_listings: Vec<CanonicalListing>,
}

fn tracked_value(listing: &RawListing, field: &str) -> Value {
    match field {
        "title" => listing.title.clone().map(Value::String).unwrap_or(Value::Null),
        "price" => listing.price.map(json_number_from_f64).unwrap_or(Value::Null),
        "condition" => listing.condition.clone().map(Value::String).unwrap_or(Value::Null),
        "location" => listing.location.clone().map(Value::String).unwrap_or(Value::Null),
        other => listing.raw.get(other).cloned().unwrap_or(Value::Null),
    }
}

/// Renders a whole-valued price as a JSON integer (`100`, not `100.0`) so
/// `fieldHash` and `changedFields` match the literal §8 scenarios. Falls
/// back to a JSON float for genuinely fractional prices.
fn json_number_from_f64(price: f64) -> Value {
    if price.is_finite() && price.fract() == 0.0 && price.abs() < 9_007_199_254_740_992.0 {
        Value::Number(serde_json::Number::from(price as i64))
    } else {
        serde_json::Number::from_f64(price).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn scraped_tracked_fields(listing: &RawListing, tracked_fields: &[String]) -> BTreeMap<String, Value> {
    tracked_fields
        .iter()
        .map(|f| (f.clone(), tracked_value(listing, f)))
        .collect()
}

/// Per-field significance, per §4.4 step 4.
fn field_significance(field: &str, old: &Value, new: &Value) -> f64 {
    match field {
        "price" => match (old.as_f64(), new.as_f64()) {
            (Some(o), Some(n)) => {
                if o == 0.0 {
                    1.0
                } else {
                    ((n - o).abs() / o.abs()).min(1.0)
                }
            }
            _ => 1.0,
        },
        "title" => match (old.as_str(), new.as_str()) {
            (Some(o), Some(n)) => 1.0 - jaccard_similarity(o, n),
            _ => 1.0,
        },
        "condition" => 0.3,
        "location" => 0.2,
        _ => 0.1,
    }
}

fn change_type_for(old: &Value, new: &Value) -> ChangeType {
    match (old.is_null(), new.is_null()) {
        (true, false) => ChangeType::Added,
        (false, true) => ChangeType::Removed,
        _ => ChangeType::Modified,
    }
}

fn new_event(
    event_type: EventType,
    listing_id: &str,
    source: &str,
    changed_fields: Vec<ChangedField>,
    field_hash_before: Option<String>,
    field_hash_after: String,
    version: u64,
    now: DateTime<Utc>,
) -> ChangeEvent {
    let confidence = if changed_fields.is_empty() {
        1.0
    } else {
        let mean: f64 =
            changed_fields.iter().map(|c| c.significance).sum::<f64>() / changed_fields.len() as f64;
        (mean * 2.0).min(1.0)
    };
    let max_significance = if changed_fields.is_empty() {
        1.0
    } else {
        changed_fields.iter().map(|c| c.significance).fold(0.0_f64, f64::max)
    };
    ChangeEvent {
        event_id: Uuid::new_v4(),
        event_type,
        listing_id: listing_id.to_string(),
        source: source.to_string(),
        changed_fields,
        field_hash_before,
        field_hash_after,
        detected_at: now,
        version,
        confidence,
        significance: SignificanceBucket::bucket(max_significance),
        metadata: Value::Object(Default::default()),
        status: EventStatus::Pending,
        retry_count: 0,
        last_retry_at: None,
    }
}

/// Run the deterministic diff algorithm described in §4.4.
///
/// `full` mirrors the Fetcher's `full` flag (§6): candidate removals are only
/// confirmed when the fetch covered the complete result surface.
pub fn diff(
    fetch: &FetchResult,
    canonical: &[CanonicalListing],
    target: &PollingTarget,
    now: DateTime<Utc>,
) -> DiffOutcome {
    let tracked_fields: Vec<String> = target
        .tracked_fields
        .iter()
        .filter(|f| !target.diff_policy.ignore_fields.contains(f))
        .cloned()
        .collect();

    let scraped: HashMap<&str, &RawListing> =
        fetch.listings.iter().map(|l| (l.id.as_str(), l)).collect();
    let canon: HashMap<&str, &CanonicalListing> =
        canonical.iter().map(|l| (l.listing_id.as_str(), l)).collect();

    let mut outcome = DiffOutcome::default();
    let mut touched: HashSet<String> = HashSet::new();

    // Step 2: creations. Iterate in a stable order (sorted ids) for
    // deterministic output.
    let mut scraped_ids: Vec<&str> = scraped.keys().copied().collect();
    scraped_ids.sort_unstable();

    for id in &scraped_ids {
        let raw = scraped[id];
        if canon.contains_key(id) {
            continue;
        }
        let fields = scraped_tracked_fields(raw, &tracked_fields);
        let mut listing = CanonicalListing::new_first_sighting(
            fetch.source.clone(),
            (*id).to_string(),
            fields,
            raw.image_urls.clone(),
            raw.raw.clone(),
            now,
        );
        let event = new_event(
            EventType::Created,
            id,
            &fetch.source,
            Vec::new(),
            None,
            listing.field_hash.clone(),
            listing.version,
            now,
        );
        listing.push_history(event.event_id, now);
        touched.insert((*id).to_string());
        outcome.events.push(event);
        outcome.updated_listings.push(listing);
    }

    // Step 3: candidate removals.
    let mut canon_ids: Vec<&str> = canon.keys().copied().collect();
    canon_ids.sort_unstable();

    for id in &canon_ids {
        if scraped.contains_key(id) {
            continue;
        }
        let listing = canon[id];
        if listing.status == ListingStatus::Removed {
            continue;
        }
        let stale_enough = (now - listing.last_seen_at).num_seconds()
            >= target.grace_period_secs as i64;
        if stale_enough && fetch.full {
            let mut mutated = listing.clone();
            mutated.status = ListingStatus::Removed;
            mutated.last_seen_at = now;
            mutated.version += 1;
            let event = new_event(
                EventType::Removed,
                id,
                &fetch.source,
                Vec::new(),
                Some(listing.field_hash.clone()),
                listing.field_hash.clone(),
                mutated.version,
                now,
            );
            mutated.push_history(event.event_id, now);
            touched.insert((*id).to_string());
            outcome.events.push(event);
            outcome.updated_listings.push(mutated);
        }
        // else: suppressed, listing is left untouched.
    }

    // Step 4: field-level diffs for listings present in both.
    let mut common_ids: Vec<&str> = scraped.keys().copied().filter(|id| canon.contains_key(id)).collect();
    common_ids.sort_unstable();

    for id in &common_ids {
        let raw = scraped[id];
        let listing = canon[id];
        let new_fields = scraped_tracked_fields(raw, &tracked_fields);

        if listing.status == ListingStatus::Removed {
            // Relisting: a previously REMOVED listing reappears. Treated as
            // a normal creation (DESIGN.md's resolution of this Open
            // Question), except `version` keeps increasing rather than
            // resetting to 1.
            let mut relisted = listing.clone();
            relisted.status = ListingStatus::Active;
            relisted.tracked_fields = new_fields;
            relisted.image_urls = raw.image_urls.clone();
            relisted.raw_data = raw.raw.clone();
            relisted.last_seen_at = now;
            relisted.version += 1;
            relisted.field_hash = field_hash(&relisted.tracked_fields);

            let event = new_event(
                EventType::Created,
                id,
                &fetch.source,
                Vec::new(),
                None,
                relisted.field_hash.clone(),
                relisted.version,
                now,
            );
            relisted.push_history(event.event_id, now);
            touched.insert((*id).to_string());
            outcome.events.push(event);
            outcome.updated_listings.push(relisted);
            continue;
        }

        let mut changed_fields = Vec::new();
        for field in &tracked_fields {
            let old_value = listing.tracked_fields.get(field).cloned().unwrap_or(Value::Null);
            let new_value = new_fields.get(field).cloned().unwrap_or(Value::Null);
            if values_equal(&old_value, &new_value) {
                continue;
            }
            let significance = field_significance(field, &old_value, &new_value);
            changed_fields.push(ChangedField {
                field: field.clone(),
                old_value,
                new_value,
                change_type: change_type_for(
                    &listing.tracked_fields.get(field).cloned().unwrap_or(Value::Null),
                    &new_fields.get(field).cloned().unwrap_or(Value::Null),
                ),
                significance,
            });
        }

        if changed_fields.is_empty() {
            continue;
        }

        let max_significance = changed_fields
            .iter()
            .map(|c| c.significance)
            .fold(0.0_f64, f64::max);
        if max_significance < target.diff_policy.min_significance {
            // Touched but not significant enough to emit: still refresh
            // last_seen_at and raw_data without bumping version.
            let mut mutated = listing.clone();
            mutated.last_seen_at = now;
            mutated.raw_data = raw.raw.clone();
            mutated.image_urls = raw.image_urls.clone();
            touched.insert((*id).to_string());
            outcome.updated_listings.push(mutated);
            continue;
        }

        let mut mutated = listing.clone();
        mutated.last_seen_at = now;
        mutated.tracked_fields = new_fields;
        mutated.image_urls = raw.image_urls.clone();
        mutated.raw_data = raw.raw.clone();
        mutated.version += 1;
        mutated.field_hash = field_hash(&mutated.tracked_fields);

        let event = new_event(
            EventType::Updated,
            id,
            &fetch.source,
            changed_fields,
            Some(listing.field_hash.clone()),
            mutated.field_hash.clone(),
            mutated.version,
            now,
        );
        mutated.push_history(event.event_id, now);
        touched.insert((*id).to_string());
        outcome.events.push(event);
        outcome.updated_listings.push(mutated);
    }

    // Listings present in both but byte-identical: bump last_seen_at only,
    // no version change, no event — satisfies the idempotence property.
    for id in &common_ids {
        if touched.contains(*id) {
            continue;
        }
        let mut mutated = canon[id].clone();
        mutated.last_seen_at = now;
        outcome.updated_listings.push(mutated);
    }

    outcome
}

/// Whether the first page's listing-ID set is unchanged from the prior
/// first-page snapshot — the fast path from §4.5 step 2. Exact set equality,
/// per the Design Notes resolution of this Open Question.
pub fn first_page_unchanged(prior_ids: &HashSet<String>, current_ids: &HashSet<String>) -> bool {
    prior_ids == current_ids
}

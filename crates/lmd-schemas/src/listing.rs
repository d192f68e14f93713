use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hash::sha256_hex_of;

/// Retention window for `CanonicalListing::change_history` and
/// `PollingTarget::change_history`.
pub const CHANGES_RETENTION: chrono::Duration = chrono::Duration::hours(24);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListingStatus {
    Active,
    Removed,
}

/// One entry in a listing's bounded change history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeHistoryEntry {
    pub at: DateTime<Utc>,
    pub event_id: uuid::Uuid,
}

/// The engine's persistent view of a remote listing, identified by
/// `(source, listing_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalListing {
    pub source: String,
    pub listing_id: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub status: ListingStatus,
    /// Tracked fields, e.g. `title`, `price`, `condition`, `location`.
    /// Values are `Value::Null` when absent so that `field_hash` is a pure
    /// function of a fixed key set.
    pub tracked_fields: BTreeMap<String, Value>,
    pub image_urls: Vec<String>,
    pub version: u64,
    pub field_hash: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub change_history: Vec<ChangeHistoryEntry>,
    pub raw_data: Value,
}

impl CanonicalListing {
    pub fn new_first_sighting(
        source: String,
        listing_id: String,
        tracked_fields: BTreeMap<String, Value>,
        image_urls: Vec<String>,
        raw_data: Value,
        now: DateTime<Utc>,
    ) -> Self {
        let field_hash = field_hash(&tracked_fields);
        Self {
            source,
            listing_id,
            first_seen_at: now,
            last_seen_at: now,
            status: ListingStatus::Active,
            tracked_fields,
            image_urls,
            version: 1,
            field_hash,
            etag: None,
            last_modified: None,
            change_history: Vec::new(),
            raw_data,
        }
    }

    /// Append a change-history entry and trim anything older than
    /// [`CHANGES_RETENTION`].
    pub fn push_history(&mut self, event_id: uuid::Uuid, now: DateTime<Utc>) {
        self.change_history.push(ChangeHistoryEntry { at: now, event_id });
        let cutoff = now - CHANGES_RETENTION;
        self.change_history.retain(|entry| entry.at >= cutoff);
    }
}

/// `fieldHash = SHA256(canonicalize(trackedFields))`, keys sorted.
pub fn field_hash(tracked_fields: &BTreeMap<String, Value>) -> String {
    let value = serde_json::to_value(tracked_fields).expect("BTreeMap<String, Value> always serializes");
    sha256_hex_of(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_hash_is_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("title".to_string(), json!("X"));
        a.insert("price".to_string(), json!(100));
        a.insert("condition".to_string(), Value::Null);
        a.insert("location".to_string(), Value::Null);

        let mut b = BTreeMap::new();
        b.insert("price".to_string(), json!(100));
        b.insert("condition".to_string(), Value::Null);
        b.insert("location".to_string(), Value::Null);
        b.insert("title".to_string(), json!("X"));

        assert_eq!(field_hash(&a), field_hash(&b));
    }

    #[test]
    fn first_sighting_has_version_one() {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), json!("X"));
        let listing = CanonicalListing::new_first_sighting(
            "https://example.test/listings".to_string(),
            "a".to_string(),
            fields,
            vec![],
            json!({}),
            Utc::now(),
        );
        assert_eq!(listing.version, 1);
        assert_eq!(listing.status, ListingStatus::Active);
    }
}

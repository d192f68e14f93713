use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Created,
    Updated,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignificanceBucket {
    Low,
    Medium,
    High,
}

impl SignificanceBucket {
    pub fn bucket(value: f64) -> Self {
        if value > 0.5 {
            SignificanceBucket::High
        } else if value > 0.2 {
            SignificanceBucket::Medium
        } else {
            SignificanceBucket::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventStatus {
    Pending,
    InFlight,
    Processed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedField {
    pub field: String,
    pub old_value: Value,
    pub new_value: Value,
    pub change_type: ChangeType,
    pub significance: f64,
}

/// An outbox row: a durable record of one detected change, awaiting
/// delivery to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub listing_id: String,
    pub source: String,
    pub changed_fields: Vec<ChangedField>,
    pub field_hash_before: Option<String>,
    pub field_hash_after: String,
    pub detected_at: DateTime<Utc>,
    pub version: u64,
    pub confidence: f64,
    pub significance: SignificanceBucket,
    pub metadata: Value,
    pub status: EventStatus,
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
}

impl ChangeEvent {
    /// The stable-key-order JSON payload delivered to webhook subscribers
    /// (§6). Signed bytes and delivered bytes must be identical, so this is
    /// the single place that produces the outbound body.
    pub fn to_payload(&self) -> Value {
        let mut fields = serde_json::Map::new();
        fields.insert("eventId".into(), Value::String(self.event_id.to_string()));
        fields.insert(
            "eventType".into(),
            serde_json::to_value(self.event_type).unwrap(),
        );
        fields.insert("listingId".into(), Value::String(self.listing_id.clone()));
        fields.insert("source".into(), Value::String(self.source.clone()));
        fields.insert(
            "changedFields".into(),
            serde_json::to_value(&self.changed_fields).unwrap(),
        );
        fields.insert(
            "fieldHashBefore".into(),
            match &self.field_hash_before {
                Some(h) => Value::String(h.clone()),
                None => Value::Null,
            },
        );
        fields.insert(
            "fieldHashAfter".into(),
            Value::String(self.field_hash_after.clone()),
        );
        fields.insert(
            "detectedAt".into(),
            Value::String(self.detected_at.to_rfc3339()),
        );
        fields.insert("version".into(), Value::from(self.version));
        fields.insert("confidence".into(), Value::from(self.confidence));
        fields.insert(
            "significance".into(),
            serde_json::to_value(self.significance).unwrap(),
        );
        fields.insert("metadata".into(), self.metadata.clone());
        fields.insert(
            "timestamp".into(),
            Value::String(Utc::now().to_rfc3339()),
        );
        let value = Value::Object(fields);
        crate::hash::canonicalize_json(&value)
    }
}

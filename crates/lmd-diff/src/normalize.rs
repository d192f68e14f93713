use serde_json::Value;

/// Lowercase, trim, collapse internal whitespace, strip punctuation.
pub fn normalize_string(s: &str) -> String {
    let lowered = s.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether two tracked-field values are equal after normalization. Mixed
/// null/non-null is never equal (that's an ADDED or REMOVED field change,
/// not a no-op).
pub fn values_equal(old: &Value, new: &Value) -> bool {
    match (old, new) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => normalize_string(a) == normalize_string(b),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(_), Value::Object(_)) => {
            lmd_schemas::hash::canonicalize_json(old) == lmd_schemas::hash::canonicalize_json(new)
        }
        (a, b) => a == b,
    }
}

/// Jaccard similarity over whitespace-tokenized normalized strings.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_string(a);
    let nb = normalize_string(b);
    let sa: std::collections::HashSet<&str> = na.split(' ').filter(|s| !s.is_empty()).collect();
    let sb: std::collections::HashSet<&str> = nb.split(' ').filter(|s| !s.is_empty()).collect();
    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        1.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cosmetic_title_change_normalizes_equal() {
        assert!(values_equal(
            &json!("MacBook Pro 14"),
            &json!("  macbook  pro  14!  ")
        ));
    }

    #[test]
    fn price_compares_exactly() {
        assert!(!values_equal(&json!(100), &json!(80)));
        assert!(values_equal(&json!(100), &json!(100.0)));
    }

    #[test]
    fn jaccard_identical_strings_is_one() {
        assert_eq!(jaccard_similarity("a b c", "a b c"), 1.0);
    }
}

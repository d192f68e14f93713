//! Builders for the raw values tests construct most often: a minimal
//! [`PollingTarget`] and a minimal [`RawListing`], both with the defaults a
//! real admin CRUD call would otherwise fill in.

use lmd_schemas::{PollingTarget, RawListing};

/// A `PollingTarget` with the standard four tracked fields and otherwise
/// default intervals/policies, suitable as a starting point for scenario
/// tests that only care about one or two fields.
pub fn target(id: &str, url: &str) -> PollingTarget {
    PollingTarget::new(
        id.to_string(),
        url.to_string(),
        vec![
            "title".to_string(),
            "price".to_string(),
            "condition".to_string(),
            "location".to_string(),
        ],
    )
    .expect("fixture target url must be well-formed")
}

/// A `RawListing` as a `Fetcher` would return it, with the four standard
/// tracked fields populated and no extra raw payload.
pub fn raw_listing(id: &str, title: &str, price: f64) -> RawListing {
    RawListing {
        id: id.to_string(),
        title: Some(title.to_string()),
        price: Some(price),
        condition: Some("used".to_string()),
        location: Some("nowhere".to_string()),
        url: Some(format!("https://example.test/{id}")),
        image_urls: Vec::new(),
        raw: serde_json::json!({}),
    }
}

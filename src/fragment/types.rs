//! Wire and storage types for fragments
//!
//! All types use camelCase JSON serialization, matching the API envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flat metadata record, as persisted by storage backends and returned to
/// API clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentRecord {
    pub id: String,
    pub owner_id: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: u64,
}

/// Result of listing an owner's fragments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Listing {
    /// Fragment ids only
    Ids(Vec<String>),
    /// Full metadata records
    Records(Vec<FragmentRecord>),
}

impl Listing {
    /// Build a listing from records, keeping only ids unless `expand` is set.
    ///
    /// Records are ordered by creation time, then id.
    pub fn from_records(mut records: Vec<FragmentRecord>, expand: bool) -> Self {
        records.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        if expand {
            Self::Records(records)
        } else {
            Self::Ids(records.into_iter().map(|r| r.id).collect())
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Ids(ids) => ids.len(),
            Self::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids in listing order, regardless of expansion
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Self::Ids(ids) => ids.iter().map(String::as_str).collect(),
            Self::Records(records) => records.iter().map(|r| r.id.as_str()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, secs: i64) -> FragmentRecord {
        let at = Utc.timestamp_opt(secs, 0).unwrap();
        FragmentRecord {
            id: id.to_string(),
            owner_id: "owner".to_string(),
            created: at,
            updated: at,
            content_type: "text/plain".to_string(),
            size: 3,
        }
    }

    #[test]
    fn test_record_serialization() {
        let json = serde_json::to_value(record("frag-1", 1_700_000_000)).unwrap();
        assert_eq!(json["id"], "frag-1");
        assert_eq!(json["ownerId"], "owner");
        assert_eq!(json["type"], "text/plain");
        assert_eq!(json["size"], 3);
        assert!(json["created"].as_str().unwrap().starts_with("2023-11-14T"));
    }

    #[test]
    fn test_negative_size_is_rejected() {
        let json = serde_json::json!({
            "id": "x",
            "ownerId": "o",
            "created": "2024-01-01T00:00:00Z",
            "updated": "2024-01-01T00:00:00Z",
            "type": "text/plain",
            "size": -1
        });
        assert!(serde_json::from_value::<FragmentRecord>(json).is_err());
    }

    #[test]
    fn test_listing_orders_by_creation() {
        let records = vec![record("b", 20), record("c", 10), record("a", 20)];
        let listing = Listing::from_records(records.clone(), false);
        assert_eq!(listing, Listing::Ids(vec!["c".into(), "a".into(), "b".into()]));

        let expanded = Listing::from_records(records, true);
        assert_eq!(expanded.ids(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_listing_serializes_flat() {
        let listing = Listing::Ids(vec!["a".into()]);
        assert_eq!(serde_json::to_string(&listing).unwrap(), "[\"a\"]");
        assert!(Listing::Ids(Vec::new()).is_empty());
    }
}

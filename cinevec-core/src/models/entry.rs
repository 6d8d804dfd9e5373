use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A typed scalar metadata attribute value.
///
/// Serializes untagged so stored metadata round-trips as plain JSON
/// (`{"title": "Inception", "year": 2010}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Non-vector attributes persisted alongside an embedding.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// An equality predicate over stored metadata.
///
/// A filter matches when every key/value pair equals the entry's metadata
/// exactly. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter(pub BTreeMap<String, MetadataValue>);

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every filter pair is present and equal in `metadata`.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.0
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }
}

/// The persisted (id, metadata, embedding) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

/// A single similarity-query hit. Results are ordered nearest-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub metadata: Metadata,
    /// Cosine similarity in [-1.0, 1.0]; higher is closer.
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> Metadata {
        Metadata::from([
            ("genre".to_string(), MetadataValue::from("Drama")),
            ("year".to_string(), MetadataValue::from(2010i64)),
        ])
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(MetadataFilter::new().matches(&meta()));
        assert!(MetadataFilter::new().matches(&Metadata::new()));
    }

    #[test]
    fn test_filter_requires_exact_equality() {
        let filter = MetadataFilter::new().with("genre", "Drama");
        assert!(filter.matches(&meta()));

        let filter = MetadataFilter::new().with("genre", "Sci-Fi");
        assert!(!filter.matches(&meta()));
    }

    #[test]
    fn test_filter_missing_key_does_not_match() {
        let filter = MetadataFilter::new().with("director", "Nolan");
        assert!(!filter.matches(&meta()));
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let filter = MetadataFilter::new()
            .with("genre", "Drama")
            .with("year", 2010i64);
        assert!(filter.matches(&meta()));

        let filter = MetadataFilter::new()
            .with("genre", "Drama")
            .with("year", 1999i64);
        assert!(!filter.matches(&meta()));
    }

    #[test]
    fn test_filter_does_not_coerce_types() {
        // Int(2010) and Str("2010") are distinct values.
        let filter = MetadataFilter::new().with("year", "2010");
        assert!(!filter.matches(&meta()));
    }

    #[test]
    fn test_metadata_value_serializes_untagged() {
        let meta = meta();
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"genre":"Drama","year":2010}"#);

        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}

//! Memory model: entries, layers, and the two backend seams.
//!
//! Knowledge lives in two physical stores:
//! - **short-term**: an in-process map, lost when the process exits
//! - **long-term**: a cosine-similarity vector collection
//!
//! "Episodic" is not a third store: it is a long-term entry whose metadata
//! carries `episodic = true`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::VectorStoreError;

/// Open metadata map attached to every entry and sent as vector payload.
pub type Metadata = serde_json::Map<String, Value>;

/// Which tier a memory belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryLayer {
    #[serde(rename = "short-term")]
    ShortTerm,
    #[serde(rename = "long-term")]
    LongTerm,
    #[serde(rename = "episodic")]
    Episodic,
}

impl MemoryLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryLayer::ShortTerm => "short-term",
            MemoryLayer::LongTerm => "long-term",
            MemoryLayer::Episodic => "episodic",
        }
    }

    /// Whether entries of this layer are written to the vector store.
    pub fn is_persistent(&self) -> bool {
        !matches!(self, MemoryLayer::ShortTerm)
    }
}

impl fmt::Display for MemoryLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short-term" | "short_term" | "short" => Ok(MemoryLayer::ShortTerm),
            "long-term" | "long_term" | "long" => Ok(MemoryLayer::LongTerm),
            "episodic" => Ok(MemoryLayer::Episodic),
            other => Err(format!("unknown memory layer: {other}")),
        }
    }
}

/// A single memory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique key within its physical store
    pub key: String,

    /// The remembered text
    pub content: String,

    /// Tier the entry was read from or written to
    pub layer: MemoryLayer,

    /// Caller metadata (`importance`, `type`, `tags`, ...)
    #[serde(default)]
    pub metadata: Metadata,

    /// When this entry was stored
    pub timestamp: DateTime<Utc>,

    /// Similarity score (set by long-term recall)
    #[serde(default)]
    pub score: f32,
}

impl MemoryEntry {
    pub fn new(
        key: impl Into<String>,
        content: impl Into<String>,
        layer: MemoryLayer,
        metadata: Metadata,
    ) -> Self {
        Self {
            key: key.into(),
            content: content.into(),
            layer,
            metadata,
            timestamp: Utc::now(),
            score: 0.0,
        }
    }

    /// `metadata.importance`, defaulting to 0.
    pub fn importance(&self) -> f64 {
        self.metadata
            .get("importance")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }

    /// `metadata.type`, defaulting to the empty string.
    pub fn entry_type(&self) -> &str {
        self.metadata
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// `metadata.tags` as strings; non-string elements are skipped.
    pub fn tags(&self) -> Vec<String> {
        self.metadata
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_episodic(&self) -> bool {
        self.metadata
            .get("episodic")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Whether the long-term layer is reachable right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LongTermStatus {
    Connected,
    Disconnected,
}

/// Snapshot for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub short_term_count: usize,
    pub long_term_status: LongTermStatus,
    pub connected: bool,
}

/// One ranked hit from the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub payload: Metadata,
}

/// Exact-match payload filter. All conditions must hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    pub must: Vec<FieldMatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMatch {
    pub key: String,
    pub value: Value,
}

impl SearchFilter {
    /// Filter on a single payload field.
    pub fn matching(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            must: vec![FieldMatch {
                key: key.into(),
                value: value.into(),
            }],
        }
    }

    /// Does a payload satisfy every condition?
    pub fn matches(&self, payload: &Metadata) -> bool {
        self.must
            .iter()
            .all(|m| payload.get(&m.key).is_some_and(|v| v == &m.value))
    }
}

/// Text to fixed-length vector.
///
/// Implementations must be deterministic and return either a unit vector
/// or an all-zero vector of exactly [`dimension`](Self::dimension) floats.
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Vec<f32>;
}

/// The external cosine-similarity vector database.
///
/// Implementations report every failure; deciding whether to degrade is
/// the caller's job.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "qdrant", "in_memory").
    fn name(&self) -> &str;

    /// Connect and make sure the target collection exists.
    async fn connect(&self) -> std::result::Result<(), VectorStoreError>;

    async fn disconnect(&self) -> std::result::Result<(), VectorStoreError>;

    /// True iff a lightweight liveness call succeeds.
    async fn health_check(&self) -> bool;

    /// Insert or replace the point stored under `id`.
    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        payload: Metadata,
    ) -> std::result::Result<(), VectorStoreError>;

    /// Nearest neighbours by cosine similarity, best first.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> std::result::Result<Vec<VectorHit>, VectorStoreError>;

    async fn delete(&self, id: &str) -> std::result::Result<(), VectorStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn layer_serializes_with_hyphens() {
        assert_eq!(
            serde_json::to_string(&MemoryLayer::ShortTerm).unwrap(),
            "\"short-term\""
        );
        assert_eq!("long-term".parse::<MemoryLayer>().unwrap(), MemoryLayer::LongTerm);
        assert_eq!("Episodic".parse::<MemoryLayer>().unwrap(), MemoryLayer::Episodic);
        assert!("medium-term".parse::<MemoryLayer>().is_err());
    }

    #[test]
    fn recognized_metadata_defaults() {
        let entry = MemoryEntry::new("k", "c", MemoryLayer::ShortTerm, Metadata::new());
        assert_eq!(entry.importance(), 0.0);
        assert_eq!(entry.entry_type(), "");
        assert!(entry.tags().is_empty());
        assert!(!entry.is_episodic());
    }

    #[test]
    fn recognized_metadata_values() {
        let entry = MemoryEntry::new(
            "k",
            "c",
            MemoryLayer::LongTerm,
            meta(json!({
                "importance": 0.8,
                "type": "decision",
                "tags": ["infra", 3, "deploy"],
                "episodic": true
            })),
        );
        assert_eq!(entry.importance(), 0.8);
        assert_eq!(entry.entry_type(), "decision");
        assert_eq!(entry.tags(), vec!["infra", "deploy"]);
        assert!(entry.is_episodic());
    }

    #[test]
    fn filter_requires_every_field() {
        let filter = SearchFilter {
            must: vec![
                FieldMatch { key: "episodic".into(), value: json!(true) },
                FieldMatch { key: "type".into(), value: json!("decision") },
            ],
        };
        assert!(filter.matches(&meta(json!({"episodic": true, "type": "decision"}))));
        assert!(!filter.matches(&meta(json!({"episodic": true}))));
        assert!(SearchFilter::default().matches(&Metadata::new()));
    }
}

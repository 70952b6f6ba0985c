//! Core graph type definitions.
//!
//! Defines [`Entity`] (a node in the memory graph), [`Relation`] (a weighted,
//! typed edge with merge-on-repeat identity), and the report structs returned
//! by graph operations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The generic entity type. Entities of this type are subject to stopword
/// filtering and are upgraded in place when a more specific type arrives.
pub const CONCEPT_TYPE: &str = "concept";

/// A node in the memory graph: a named thing (person, tool, project, concept,
/// preference).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Stable id, derived from the normalized name (`lowercase`, spaces → `_`).
    pub id: String,
    /// Display name, whitespace-normalized before comparison.
    pub name: String,
    /// Open type tag: `person`, `project`, `tool`, `concept`, `preference`, ...
    pub entity_type: String,
    /// Free-form property map. Incoming keys win on merge.
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    /// How many times this entity has been mentioned across extractions.
    #[serde(default = "default_mentions")]
    pub mentions: u32,
    /// RFC 3339 creation timestamp, assigned on first insertion.
    #[serde(default)]
    pub created_at: String,
    /// RFC 3339 timestamp of the last mention or merge.
    #[serde(default)]
    pub last_accessed: String,
}

fn default_mentions() -> u32 {
    1
}

impl Entity {
    /// Build an entity with a deterministic id derived from `name`.
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: entity_id_for(&name),
            name,
            entity_type: entity_type.into(),
            properties: HashMap::new(),
            mentions: 1,
            created_at: String::new(),
            last_accessed: String::new(),
        }
    }

    /// Attach a property, consuming and returning self (builder style).
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// A weighted, typed edge between two entities.
///
/// Identity is the ordered `(source, type, target)` triple — re-adding the
/// same triple merges into the existing edge rather than duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub source_id: String,
    pub target_id: String,
    /// Free-form label (`uses`, `knows`, `manages`, ...).
    pub relation_type: String,
    /// Conceptually in `[0, 1]`; hard-clamped only during recalculation.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Snippet of the text the relation was extracted from.
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub created_at: String,
}

fn default_weight() -> f64 {
    1.0
}

impl Relation {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation_type: relation_type.into(),
            weight: 1.0,
            context: String::new(),
            created_at: String::new(),
        }
    }

    /// Identity key: `source--type-->target`.
    pub fn id(&self) -> String {
        relation_id(&self.source_id, &self.relation_type, &self.target_id)
    }
}

/// Build the identity key for a `(source, type, target)` triple.
pub fn relation_id(source_id: &str, relation_type: &str, target_id: &str) -> String {
    format!("{source_id}--{relation_type}-->{target_id}")
}

/// Deterministic entity id: lowercase name with spaces replaced by underscores.
/// Two extractions resolving to the same normalized name always target the
/// same node, which is what makes merge-on-insert work.
pub fn entity_id_for(name: &str) -> String {
    normalize_name(name).to_lowercase().replace(' ', "_")
}

/// Normalize an entity name: trim and collapse internal whitespace.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Function words filtered out when they arrive as `concept`-typed entities.
/// Covers English plus the Korean forms the extraction service emits.
pub const ENTITY_STOPWORDS: &[&str] = &[
    "the", "a", "an", "this", "that", "it", "is", "was", "are", "were", "be", "been", "being",
    "have", "has", "had", "do", "does", "did", "will", "would", "could", "should", "may", "might",
    "must", "shall", "not", "no", "yes", "and", "or", "but", "if", "then", "else", "he", "she",
    "they", "we", "i", "you", "me", "us", "him", "her", "그", "이", "저", "것", "그것", "이것",
];

/// True if `normalized_lower` (already normalized and lowercased) is a stopword.
pub fn is_stopword(normalized_lower: &str) -> bool {
    ENTITY_STOPWORDS.contains(&normalized_lower)
}

/// Counts returned by a weight recalculation pass.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RecalcReport {
    /// Relations examined.
    pub total: usize,
    /// Relations whose weight moved by more than 0.001.
    pub changed: usize,
}

/// Graph-level statistics.
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub total_entities: usize,
    pub total_relations: usize,
    pub entity_types: HashMap<String, usize>,
    pub avg_connections: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_name("  Alice   Smith "), "Alice Smith");
        assert_eq!(normalize_name("Bob"), "Bob");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn entity_id_is_deterministic() {
        assert_eq!(entity_id_for("Alice Smith"), "alice_smith");
        assert_eq!(entity_id_for("  alice   SMITH "), "alice_smith");
        assert_eq!(entity_id_for("Python"), "python");
    }

    #[test]
    fn relation_id_format() {
        let r = Relation::new("alice", "python", "uses");
        assert_eq!(r.id(), "alice--uses-->python");
    }

    #[test]
    fn stopwords_match() {
        assert!(is_stopword("the"));
        assert!(is_stopword("그것"));
        assert!(!is_stopword("python"));
    }
}

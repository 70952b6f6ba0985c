//! Durable JSON snapshot of the knowledge graph.
//!
//! The snapshot carries four collections: entities keyed by id, relations
//! keyed by the `source--type-->target` id, the co-occurrence table keyed by
//! a `a|b` pair join, and the per-entity mention totals. Load reconstructs
//! adjacency and the lookup indices purely from the relations collection.
//!
//! A missing or corrupt snapshot degrades to an empty graph (logged); save
//! errors propagate to the caller — silent data loss on save is worse than a
//! failed consolidation cycle.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use super::store::KnowledgeGraph;
use super::types::{Entity, Relation};

#[derive(Debug, Serialize, Deserialize, Default)]
struct SnapshotDoc {
    #[serde(default)]
    entities: HashMap<String, Entity>,
    #[serde(default)]
    relations: HashMap<String, Relation>,
    /// `"{a}|{b}"` sorted-pair key → co-occurrence count.
    #[serde(default)]
    cooccurrence: HashMap<String, u64>,
    #[serde(default)]
    entity_mentions: HashMap<String, u64>,
}

/// Serialize the full graph to `path`, creating parent directories as needed.
pub fn save(graph: &KnowledgeGraph, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let (entities, relations, cooccurrence, entity_mentions) = graph.snapshot_parts();
    let doc = SnapshotDoc {
        entities: entities.clone(),
        relations: relations.clone(),
        cooccurrence: cooccurrence
            .iter()
            .map(|((a, b), count)| (format!("{a}|{b}"), *count))
            .collect(),
        entity_mentions: entity_mentions.clone(),
    };

    let json = serde_json::to_string_pretty(&doc).context("failed to serialize graph snapshot")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write snapshot to {}", path.display()))?;

    debug!(
        entities = doc.entities.len(),
        relations = doc.relations.len(),
        "graph snapshot saved"
    );
    Ok(())
}

/// Load a graph snapshot into `graph`. A missing file is a silent no-op; a
/// corrupt file is logged and leaves the graph empty.
pub fn load(graph: &mut KnowledgeGraph, path: impl AsRef<Path>) {
    let path = path.as_ref();
    if !path.exists() {
        return;
    }

    let doc = match read_doc(path) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load graph snapshot, starting empty");
            return;
        }
    };

    let cooccurrence = doc
        .cooccurrence
        .into_iter()
        .filter_map(|(key, count)| {
            key.split_once('|')
                .map(|(a, b)| ((a.to_string(), b.to_string()), count))
        })
        .collect();

    let entity_count = doc.entities.len();
    let relation_count = doc.relations.len();
    graph.restore(doc.entities, doc.relations, cooccurrence, doc.entity_mentions);
    debug!(
        entities = entity_count,
        relations = relation_count,
        "graph snapshot loaded"
    );
}

fn read_doc(path: &Path) -> Result<SnapshotDoc> {
    let contents = std::fs::read_to_string(path).context("failed to read snapshot file")?;
    serde_json::from_str(&contents).context("failed to parse snapshot JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{Entity, Relation};

    #[test]
    fn round_trip_preserves_graph() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");

        let mut g = KnowledgeGraph::default();
        g.add_entity(Entity::new("Alice", "person"));
        g.add_entity(Entity::new("Python", "tool"));
        g.add_relation(Relation::new("alice", "python", "uses"));
        g.add_relation(Relation::new("alice", "python", "uses")); // co-occurrence
        save(&g, &path).unwrap();

        let mut restored = KnowledgeGraph::default();
        load(&mut restored, &path);

        assert_eq!(restored.entity_count(), 2);
        assert_eq!(restored.relation_count(), 1);
        // Adjacency is rebuilt from relations.
        assert!(restored.get_neighbors("alice", 1).contains("python"));
        assert_eq!(
            restored.find_path("alice", "python", 3),
            vec!["alice", "python"]
        );
        // Dedup index is rebuilt: re-adding Alice merges.
        restored.add_entity(Entity::new("ALICE", "person"));
        assert_eq!(restored.entity_count(), 2);
    }

    #[test]
    fn missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = KnowledgeGraph::default();
        load(&mut g, dir.path().join("absent.json"));
        assert_eq!(g.entity_count(), 0);
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut g = KnowledgeGraph::default();
        load(&mut g, &path);
        assert_eq!(g.entity_count(), 0);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/graph.json");
        let g = KnowledgeGraph::default();
        save(&g, &path).unwrap();
        assert!(path.exists());
    }
}

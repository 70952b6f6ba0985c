//! The entity graph: authoritative, deduplicated store of entities and
//! weighted relations.
//!
//! Two backends implement the same [`GraphBackend`] contract: the in-memory
//! [`store::KnowledgeGraph`] (JSON snapshot persistence, integer-arena BFS
//! acceleration) and the SQLite-backed [`relational::RelationalGraph`]
//! (recursive-CTE traversal). Callers are agnostic to which backend is active.

pub mod native;
pub mod relational;
pub mod snapshot;
pub mod store;
pub mod types;

use anyhow::Result;
use std::collections::{HashMap, HashSet};

use types::{Entity, GraphStats, RecalcReport, Relation};

/// Operation set shared by the in-memory and relational graph backends.
///
/// Mutating operations return the canonical id actually stored, or an empty
/// string for soft failures (stopword-filtered entities, relations whose
/// endpoints are unknown) — those are logged, never errors.
pub trait GraphBackend {
    fn add_entity(&mut self, entity: Entity) -> Result<String>;
    fn add_relation(&mut self, relation: Relation) -> Result<String>;
    fn get_entity(&self, entity_id: &str) -> Result<Option<Entity>>;
    /// Case-insensitive substring match on entity names.
    fn find_entities_by_name(&self, name: &str) -> Result<Vec<Entity>>;
    fn find_entities_by_names_batch(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, Vec<Entity>>>;
    fn find_entities_by_type(&self, entity_type: &str) -> Result<Vec<Entity>>;
    /// Neighbor ids within `depth` hops, excluding the start node.
    fn get_neighbors(&mut self, entity_id: &str, depth: usize) -> Result<HashSet<String>>;
    fn get_relations_for_entity(&self, entity_id: &str) -> Result<Vec<Relation>>;
    /// Shortest path as an ordered id list; `[a]` when source == target,
    /// empty when unknown or disconnected within `max_depth`.
    fn find_path(&self, source_id: &str, target_id: &str, max_depth: usize) -> Result<Vec<String>>;
    fn recalculate_weights(&mut self) -> Result<RecalcReport>;
    fn get_stats(&self) -> Result<GraphStats>;
    /// Update an entity's last-accessed timestamp. Unknown ids are a no-op.
    fn touch_entity(&mut self, entity_id: &str) -> Result<()>;
    /// Number of relations touching an entity (decay resistance input).
    fn connection_count(&self, entity_id: &str) -> Result<usize>;
    /// Flush durable state: the JSON snapshot for the in-memory backend, a
    /// no-op for SQLite where every write is already durable.
    fn persist(&self) -> Result<()>;
}

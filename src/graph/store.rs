//! In-memory knowledge graph with deduplication and O(1) lookups.
//!
//! Entities are deduplicated by normalized lowercase name through a name→id
//! index; relations are deduplicated on the `(source, type, target)` triple.
//! BFS traversal dispatches to the dense integer arena once the graph crosses
//! the configured size threshold; the direct and accelerated paths return
//! identical result sets.

use anyhow::Result;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::native::NativeIndex;
use super::types::{
    is_stopword, normalize_name, Entity, GraphStats, RecalcReport, Relation, CONCEPT_TYPE,
};
use super::GraphBackend;
use crate::config::GraphConfig;

/// Delta below which a recalculated weight does not count as changed.
const WEIGHT_CHANGE_EPSILON: f64 = 0.001;

pub struct KnowledgeGraph {
    entities: HashMap<String, Entity>,
    relations: HashMap<String, Relation>,
    /// Undirected neighbor sets derived from relations.
    adjacency: HashMap<String, HashSet<String>>,
    /// normalized lowercase name → entity id, for O(1) dedup.
    name_index: HashMap<String, String>,
    /// entity id → relation ids touching it, for O(1) relation lookup.
    relation_index: HashMap<String, Vec<String>>,
    /// Sorted entity-id pair → co-occurrence count, for TF-IDF recalculation.
    cooccurrence: HashMap<(String, String), u64>,
    /// entity id → running mention total from relation re-adds.
    entity_mentions: HashMap<String, u64>,
    native: NativeIndex,
    config: GraphConfig,
    /// Snapshot destination used by [`GraphBackend::persist`]; `None` for
    /// throwaway graphs.
    snapshot_path: Option<PathBuf>,
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

impl KnowledgeGraph {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            entities: HashMap::new(),
            relations: HashMap::new(),
            adjacency: HashMap::new(),
            name_index: HashMap::new(),
            relation_index: HashMap::new(),
            cooccurrence: HashMap::new(),
            entity_mentions: HashMap::new(),
            native: NativeIndex::new(),
            config,
            snapshot_path: None,
        }
    }

    pub fn set_snapshot_path(&mut self, path: impl Into<PathBuf>) {
        self.snapshot_path = Some(path.into());
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Add or merge an entity. Returns the canonical id actually stored, or
    /// an empty string when a concept-typed stopword is rejected.
    pub fn add_entity(&mut self, mut entity: Entity) -> String {
        let normalized = normalize_name(&entity.name);
        if entity.entity_type == CONCEPT_TYPE && is_stopword(&normalized.to_lowercase()) {
            debug!(name = %entity.name, "stopword entity filtered");
            return String::new();
        }
        entity.name = normalized;

        if let Some(existing_id) = self.deduplicate(&entity) {
            debug!(name = %entity.name, id = %existing_id, "entity deduplicated");
            return existing_id;
        }

        let now = chrono::Utc::now().to_rfc3339();
        entity.created_at = now.clone();
        entity.last_accessed = now;
        self.name_index
            .insert(entity.name.to_lowercase(), entity.id.clone());
        let id = entity.id.clone();
        self.entities.insert(id.clone(), entity);
        self.native.mark_dirty();
        id
    }

    /// Case-insensitive exact-normalized-name lookup. On a hit, merges the
    /// incoming entity into the existing one and returns its id.
    fn deduplicate(&mut self, entity: &Entity) -> Option<String> {
        let key = entity.name.to_lowercase();
        let existing_id = self.name_index.get(&key)?.clone();
        let existing = self.entities.get_mut(&existing_id)?;

        existing.mentions += entity.mentions;
        existing.last_accessed = chrono::Utc::now().to_rfc3339();
        // Prefer a specific type over the generic concept tag.
        if existing.entity_type == CONCEPT_TYPE && entity.entity_type != CONCEPT_TYPE {
            existing.entity_type = entity.entity_type.clone();
        }
        for (k, v) in &entity.properties {
            existing.properties.insert(k.clone(), v.clone());
        }
        Some(existing_id)
    }

    /// Add a relation between two existing entities. Soft-fails with an empty
    /// id when either endpoint is unknown. Re-adding an existing triple bumps
    /// its weight and records co-occurrence for later recalculation.
    pub fn add_relation(&mut self, mut relation: Relation) -> String {
        if !self.entities.contains_key(&relation.source_id) {
            warn!(id = %relation.source_id, "source entity not found");
            return String::new();
        }
        if !self.entities.contains_key(&relation.target_id) {
            warn!(id = %relation.target_id, "target entity not found");
            return String::new();
        }

        let id = relation.id();
        if let Some(existing) = self.relations.get_mut(&id) {
            let pair = sorted_pair(&relation.source_id, &relation.target_id);
            *self.cooccurrence.entry(pair).or_insert(0) += 1;
            *self
                .entity_mentions
                .entry(relation.source_id.clone())
                .or_insert(0) += 1;
            *self
                .entity_mentions
                .entry(relation.target_id.clone())
                .or_insert(0) += 1;
            // Naive bump as a baseline until the next recalculation pass.
            existing.weight += self.config.weight_increment;
            return id;
        }

        relation.created_at = chrono::Utc::now().to_rfc3339();
        self.adjacency
            .entry(relation.source_id.clone())
            .or_default()
            .insert(relation.target_id.clone());
        self.adjacency
            .entry(relation.target_id.clone())
            .or_default()
            .insert(relation.source_id.clone());
        self.relation_index
            .entry(relation.source_id.clone())
            .or_default()
            .push(id.clone());
        self.relation_index
            .entry(relation.target_id.clone())
            .or_default()
            .push(id.clone());
        self.relations.insert(id.clone(), relation);
        self.native.mark_dirty();
        id
    }

    pub fn get_entity(&self, entity_id: &str) -> Option<&Entity> {
        self.entities.get(entity_id)
    }

    /// Touch an entity's last-accessed timestamp (query-path bookkeeping).
    pub fn touch_entity(&mut self, entity_id: &str) {
        if let Some(entity) = self.entities.get_mut(entity_id) {
            entity.last_accessed = chrono::Utc::now().to_rfc3339();
        }
    }

    pub fn find_entities_by_name(&self, name: &str) -> Vec<Entity> {
        let needle = name.to_lowercase();
        self.entities
            .values()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn find_entities_by_names_batch(&self, names: &[String]) -> HashMap<String, Vec<Entity>> {
        names
            .iter()
            .map(|name| (name.clone(), self.find_entities_by_name(name)))
            .collect()
    }

    pub fn find_entities_by_type(&self, entity_type: &str) -> Vec<Entity> {
        self.entities
            .values()
            .filter(|e| e.entity_type == entity_type)
            .cloned()
            .collect()
    }

    /// Neighbor ids within `depth` hops, excluding the start node.
    ///
    /// Dispatches to the integer arena once the graph holds at least
    /// `native_threshold` entities; both paths return identical sets.
    pub fn get_neighbors(&mut self, entity_id: &str, depth: usize) -> HashSet<String> {
        if !self.entities.contains_key(entity_id) {
            return HashSet::new();
        }

        if self.entities.len() >= self.config.native_threshold {
            if self.native.is_dirty() {
                self.native.rebuild(self.entities.keys(), &self.adjacency);
            }
            if let Some(result) = self.native.bfs_neighbors(entity_id, depth) {
                return result;
            }
        }

        self.bfs_direct(entity_id, depth)
    }

    /// Direct BFS over the string-keyed adjacency map.
    fn bfs_direct(&self, entity_id: &str, depth: usize) -> HashSet<String> {
        let mut visited: HashSet<String> = HashSet::from([entity_id.to_string()]);
        let mut frontier: Vec<String> = vec![entity_id.to_string()];

        for _ in 0..depth {
            let mut next = Vec::new();
            for node in &frontier {
                if let Some(neighbors) = self.adjacency.get(node) {
                    for neighbor in neighbors {
                        if !visited.contains(neighbor) {
                            visited.insert(neighbor.clone());
                            next.push(neighbor.clone());
                        }
                    }
                }
            }
            frontier = next;
        }

        visited.remove(entity_id);
        visited
    }

    pub fn get_relations_for_entity(&self, entity_id: &str) -> Vec<Relation> {
        self.relation_index
            .get(entity_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.relations.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of relations touching an entity (decay resistance input).
    pub fn connection_count(&self, entity_id: &str) -> usize {
        self.relation_index
            .get(entity_id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    /// Shortest path between two entities via BFS with path tracking.
    pub fn find_path(&self, source_id: &str, target_id: &str, max_depth: usize) -> Vec<String> {
        if !self.entities.contains_key(source_id) || !self.entities.contains_key(target_id) {
            return Vec::new();
        }
        if source_id == target_id {
            return vec![source_id.to_string()];
        }

        let mut visited: HashSet<String> = HashSet::from([source_id.to_string()]);
        let mut queue: VecDeque<(String, Vec<String>)> =
            VecDeque::from([(source_id.to_string(), vec![source_id.to_string()])]);

        while let Some((current, path)) = queue.pop_front() {
            if path.len() > max_depth {
                break;
            }
            if let Some(neighbors) = self.adjacency.get(&current) {
                for neighbor in neighbors {
                    if neighbor == target_id {
                        let mut full = path.clone();
                        full.push(neighbor.clone());
                        return full;
                    }
                    if !visited.contains(neighbor) {
                        visited.insert(neighbor.clone());
                        let mut next_path = path.clone();
                        next_path.push(neighbor.clone());
                        queue.push_back((neighbor.clone(), next_path));
                    }
                }
            }
        }

        Vec::new()
    }

    /// Recalculate every relation's weight from co-occurrence statistics.
    ///
    /// `TF = pair_count / source_mention_total`,
    /// `IDF = ln(total_entities / (1 + distinct partners of source))`,
    /// `weight = clamp(0.7·TF·IDF + 0.3·previous, 0, 1)`.
    ///
    /// Single O(R + C) pass: the per-entity partner counts are prebuilt from
    /// the co-occurrence table instead of rescanning it per relation.
    pub fn recalculate_weights(&mut self) -> RecalcReport {
        let start = std::time::Instant::now();
        let total_entities = self.entities.len().max(1) as f64;
        let mut changed = 0usize;

        let mut partner_counts: HashMap<&str, u64> = HashMap::new();
        for (a, b) in self.cooccurrence.keys() {
            *partner_counts.entry(a.as_str()).or_insert(0) += 1;
            *partner_counts.entry(b.as_str()).or_insert(0) += 1;
        }

        for relation in self.relations.values_mut() {
            let pair = sorted_pair(&relation.source_id, &relation.target_id);
            let pair_count = self.cooccurrence.get(&pair).copied().unwrap_or(1) as f64;
            let source_total = self
                .entity_mentions
                .get(&relation.source_id)
                .copied()
                .unwrap_or(1)
                .max(1) as f64;
            let source_partners = partner_counts
                .get(relation.source_id.as_str())
                .copied()
                .unwrap_or(0) as f64;

            let tf = pair_count / source_total;
            let idf = (total_entities / (1.0 + source_partners)).ln();
            let blended = self.config.tfidf_weight * tf * idf
                + self.config.baseline_weight * relation.weight;
            let new_weight = blended.clamp(0.0, 1.0);

            if (new_weight - relation.weight).abs() > WEIGHT_CHANGE_EPSILON {
                relation.weight = new_weight;
                changed += 1;
            }
        }

        info!(
            relations = self.relations.len(),
            changed,
            dur_ms = start.elapsed().as_millis() as u64,
            "relation weights recalculated"
        );
        RecalcReport {
            total: self.relations.len(),
            changed,
        }
    }

    pub fn get_stats(&self) -> GraphStats {
        let mut entity_types: HashMap<String, usize> = HashMap::new();
        for entity in self.entities.values() {
            *entity_types.entry(entity.entity_type.clone()).or_insert(0) += 1;
        }
        let avg_connections = self
            .adjacency
            .values()
            .map(|n| n.len())
            .sum::<usize>() as f64
            / self.adjacency.len().max(1) as f64;

        GraphStats {
            total_entities: self.entities.len(),
            total_relations: self.relations.len(),
            entity_types,
            avg_connections,
        }
    }

    // Snapshot plumbing — see snapshot.rs for the wire format.

    pub(super) fn snapshot_parts(
        &self,
    ) -> (
        &HashMap<String, Entity>,
        &HashMap<String, Relation>,
        &HashMap<(String, String), u64>,
        &HashMap<String, u64>,
    ) {
        (
            &self.entities,
            &self.relations,
            &self.cooccurrence,
            &self.entity_mentions,
        )
    }

    /// Replace graph contents from snapshot collections. Adjacency and the
    /// lookup indices are reconstructed purely from the relations.
    pub(super) fn restore(
        &mut self,
        entities: HashMap<String, Entity>,
        relations: HashMap<String, Relation>,
        cooccurrence: HashMap<(String, String), u64>,
        entity_mentions: HashMap<String, u64>,
    ) {
        self.adjacency.clear();
        self.name_index.clear();
        self.relation_index.clear();

        for (id, entity) in &entities {
            self.name_index
                .insert(entity.name.to_lowercase(), id.clone());
        }
        for (id, relation) in &relations {
            self.adjacency
                .entry(relation.source_id.clone())
                .or_default()
                .insert(relation.target_id.clone());
            self.adjacency
                .entry(relation.target_id.clone())
                .or_default()
                .insert(relation.source_id.clone());
            self.relation_index
                .entry(relation.source_id.clone())
                .or_default()
                .push(id.clone());
            self.relation_index
                .entry(relation.target_id.clone())
                .or_default()
                .push(id.clone());
        }

        self.entities = entities;
        self.relations = relations;
        self.cooccurrence = cooccurrence;
        self.entity_mentions = entity_mentions;
        self.native.mark_dirty();
    }
}

/// Unordered entity pair, sorted for use as a co-occurrence key.
fn sorted_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl GraphBackend for KnowledgeGraph {
    fn add_entity(&mut self, entity: Entity) -> Result<String> {
        Ok(KnowledgeGraph::add_entity(self, entity))
    }

    fn add_relation(&mut self, relation: Relation) -> Result<String> {
        Ok(KnowledgeGraph::add_relation(self, relation))
    }

    fn get_entity(&self, entity_id: &str) -> Result<Option<Entity>> {
        Ok(KnowledgeGraph::get_entity(self, entity_id).cloned())
    }

    fn find_entities_by_name(&self, name: &str) -> Result<Vec<Entity>> {
        Ok(KnowledgeGraph::find_entities_by_name(self, name))
    }

    fn find_entities_by_names_batch(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, Vec<Entity>>> {
        Ok(KnowledgeGraph::find_entities_by_names_batch(self, names))
    }

    fn find_entities_by_type(&self, entity_type: &str) -> Result<Vec<Entity>> {
        Ok(KnowledgeGraph::find_entities_by_type(self, entity_type))
    }

    fn get_neighbors(&mut self, entity_id: &str, depth: usize) -> Result<HashSet<String>> {
        Ok(KnowledgeGraph::get_neighbors(self, entity_id, depth))
    }

    fn get_relations_for_entity(&self, entity_id: &str) -> Result<Vec<Relation>> {
        Ok(KnowledgeGraph::get_relations_for_entity(self, entity_id))
    }

    fn find_path(&self, source_id: &str, target_id: &str, max_depth: usize) -> Result<Vec<String>> {
        Ok(KnowledgeGraph::find_path(self, source_id, target_id, max_depth))
    }

    fn recalculate_weights(&mut self) -> Result<RecalcReport> {
        Ok(KnowledgeGraph::recalculate_weights(self))
    }

    fn get_stats(&self) -> Result<GraphStats> {
        Ok(KnowledgeGraph::get_stats(self))
    }

    fn touch_entity(&mut self, entity_id: &str) -> Result<()> {
        KnowledgeGraph::touch_entity(self, entity_id);
        Ok(())
    }

    fn connection_count(&self, entity_id: &str) -> Result<usize> {
        Ok(KnowledgeGraph::connection_count(self, entity_id))
    }

    fn persist(&self) -> Result<()> {
        match &self.snapshot_path {
            Some(path) => super::snapshot::save(self, path),
            None => Ok(()),
        }
    }
}

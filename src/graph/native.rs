//! Dense integer projection of the string-keyed graph for accelerated BFS.
//!
//! Arena+index pattern: the string-keyed graph is the source of truth; this
//! index is a derived, disposable projection. Any graph mutation marks it
//! dirty, and the next large-graph traversal rebuilds it wholesale — it is
//! never patched incrementally.

use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Lazily-rebuilt bijection between string entity ids and dense integers,
/// plus an integer-keyed adjacency list.
#[derive(Debug)]
pub struct NativeIndex {
    node_to_idx: HashMap<String, u32>,
    idx_to_node: Vec<String>,
    adjacency: Vec<Vec<u32>>,
    dirty: bool,
}

impl Default for NativeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeIndex {
    pub fn new() -> Self {
        Self {
            node_to_idx: HashMap::new(),
            idx_to_node: Vec::new(),
            adjacency: Vec::new(),
            dirty: true,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Called on every graph mutation. The next rebuild happens on demand.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Rebuild the integer arena from the authoritative adjacency map.
    pub fn rebuild<'a>(
        &mut self,
        entity_ids: impl Iterator<Item = &'a String>,
        adjacency: &HashMap<String, HashSet<String>>,
    ) {
        self.node_to_idx.clear();
        self.idx_to_node.clear();

        for id in entity_ids {
            let idx = self.idx_to_node.len() as u32;
            self.node_to_idx.insert(id.clone(), idx);
            self.idx_to_node.push(id.clone());
        }

        self.adjacency = vec![Vec::new(); self.idx_to_node.len()];
        let mut edges = 0usize;
        for (node, neighbors) in adjacency {
            if let Some(&idx) = self.node_to_idx.get(node) {
                let ints: Vec<u32> = neighbors
                    .iter()
                    .filter_map(|n| self.node_to_idx.get(n).copied())
                    .collect();
                edges += ints.len();
                self.adjacency[idx as usize] = ints;
            }
        }

        self.dirty = false;
        debug!(nodes = self.idx_to_node.len(), edges, "native graph index rebuilt");
    }

    /// BFS over the integer arena up to `depth` hops. Returns string ids with
    /// the start node excluded, or `None` if the start id is not indexed.
    pub fn bfs_neighbors(&self, start: &str, depth: usize) -> Option<HashSet<String>> {
        let start_idx = *self.node_to_idx.get(start)?;

        let mut visited = vec![false; self.idx_to_node.len()];
        visited[start_idx as usize] = true;
        let mut frontier = vec![start_idx];

        for _ in 0..depth {
            let mut next = Vec::new();
            for &node in &frontier {
                for &neighbor in &self.adjacency[node as usize] {
                    if !visited[neighbor as usize] {
                        visited[neighbor as usize] = true;
                        next.push(neighbor);
                    }
                }
            }
            frontier = next;
        }

        let result = visited
            .iter()
            .enumerate()
            .filter(|&(idx, &seen)| seen && idx != start_idx as usize)
            .map(|(idx, _)| self.idx_to_node[idx].clone())
            .collect();
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency(edges: &[(&str, &str)]) -> HashMap<String, HashSet<String>> {
        let mut adj: HashMap<String, HashSet<String>> = HashMap::new();
        for (a, b) in edges {
            adj.entry(a.to_string()).or_default().insert(b.to_string());
            adj.entry(b.to_string()).or_default().insert(a.to_string());
        }
        adj
    }

    fn rebuild_from(edges: &[(&str, &str)]) -> NativeIndex {
        let adj = adjacency(edges);
        let ids: Vec<String> = adj.keys().cloned().collect();
        let mut index = NativeIndex::new();
        index.rebuild(ids.iter(), &adj);
        index
    }

    #[test]
    fn bfs_excludes_start_node() {
        let index = rebuild_from(&[("a", "b"), ("b", "c")]);
        let result = index.bfs_neighbors("a", 1).unwrap();
        assert_eq!(result, HashSet::from(["b".to_string()]));
    }

    #[test]
    fn bfs_respects_depth() {
        let index = rebuild_from(&[("a", "b"), ("b", "c"), ("c", "d")]);
        let depth2 = index.bfs_neighbors("a", 2).unwrap();
        assert_eq!(
            depth2,
            HashSet::from(["b".to_string(), "c".to_string()])
        );
        let depth3 = index.bfs_neighbors("a", 3).unwrap();
        assert!(depth3.contains("d"));
    }

    #[test]
    fn bfs_unknown_start_is_none() {
        let index = rebuild_from(&[("a", "b")]);
        assert!(index.bfs_neighbors("zzz", 2).is_none());
    }

    #[test]
    fn rebuild_clears_dirty_flag() {
        let mut index = NativeIndex::new();
        assert!(index.is_dirty());
        let adj = adjacency(&[("a", "b")]);
        let ids: Vec<String> = adj.keys().cloned().collect();
        index.rebuild(ids.iter(), &adj);
        assert!(!index.is_dirty());
        index.mark_dirty();
        assert!(index.is_dirty());
    }
}

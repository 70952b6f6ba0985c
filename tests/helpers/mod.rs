#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mnema::extract::llm::CompletionProvider;
use mnema::extract::ExtractError;
use mnema::graph::store::KnowledgeGraph;
use mnema::graph::types::{Entity, Relation};

/// Completion provider that replays a fixed response queue and counts calls.
pub struct ScriptedProvider {
    responses: Vec<Result<String, String>>,
    cursor: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: responses.iter().map(|s| Ok(s.to_string())).collect(),
            cursor: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    /// Provider whose every call fails with a service error.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            responses: Vec::new(),
            cursor: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, _prompt: &str) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(i) {
            Some(Ok(s)) => Ok(s.clone()),
            _ => Err(ExtractError::Service("scripted failure".into())),
        }
    }
}

/// Build a small in-memory graph: alice --uses--> python --powers--> django,
/// bob --maintains--> django.
pub fn sample_graph() -> KnowledgeGraph {
    let mut g = KnowledgeGraph::default();
    for (name, entity_type) in [
        ("Alice", "person"),
        ("Bob", "person"),
        ("Python", "tool"),
        ("Django", "tool"),
    ] {
        g.add_entity(Entity::new(name, entity_type));
    }
    g.add_relation(Relation::new("alice", "python", "uses"));
    g.add_relation(Relation::new("python", "django", "powers"));
    g.add_relation(Relation::new("bob", "django", "maintains"));
    g
}

/// Linear chain n0 - n1 - ... - n{len-1}.
pub fn chain_graph(len: usize) -> KnowledgeGraph {
    let mut g = KnowledgeGraph::default();
    for i in 0..len {
        g.add_entity(Entity::new(format!("N{i}"), "concept"));
    }
    for i in 0..len.saturating_sub(1) {
        g.add_relation(Relation::new(format!("n{i}"), format!("n{}", i + 1), "r"));
    }
    g
}

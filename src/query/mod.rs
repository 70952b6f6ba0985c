//! Graph query engine.
//!
//! Resolves seed entities from a natural-language question (completion
//! provider when available, keyword matching otherwise), expands their
//! neighborhoods, collects relations and pairwise paths, and formats the
//! result as an agent-readable context block with a relevance score.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::config::QueryConfig;
use crate::extract::llm::{strip_code_fences, CompletionProvider};
use crate::graph::types::{Entity, Relation};
use crate::graph::GraphBackend;

/// Seed extraction and relevance evaluation share this bound.
const QUERY_TIMEOUT_SECS: u64 = 30;

/// Paths rendered in the context block.
const MAX_FORMAT_PATHS: usize = 3;

/// Everything a query returns. Always well-formed: a query that matches
/// nothing yields empty collections and an explanatory context, not an error.
#[derive(Debug, Serialize)]
pub struct GraphQueryResult {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    /// Entity-id chains, shortest first hop to hop.
    pub paths: Vec<Vec<String>>,
    pub context: String,
    pub relevance_score: f64,
}

impl GraphQueryResult {
    fn empty(context: &str) -> Self {
        Self {
            entities: Vec::new(),
            relations: Vec::new(),
            paths: Vec::new(),
            context: context.to_string(),
            relevance_score: 0.0,
        }
    }
}

pub struct GraphQueryEngine {
    graph: Box<dyn GraphBackend>,
    provider: Option<Arc<dyn CompletionProvider>>,
    config: QueryConfig,
}

impl GraphQueryEngine {
    pub fn new(
        graph: Box<dyn GraphBackend>,
        provider: Option<Arc<dyn CompletionProvider>>,
        config: QueryConfig,
    ) -> Self {
        Self {
            graph,
            provider,
            config,
        }
    }

    pub fn graph(&self) -> &dyn GraphBackend {
        self.graph.as_ref()
    }

    /// Full query path: provider-assisted seed resolution, neighborhood
    /// expansion, relations, pairwise paths, formatted context.
    pub async fn query(&mut self, text: &str) -> Result<GraphQueryResult> {
        let mut seeds = match &self.provider {
            Some(provider) => self.extract_query_seeds(provider.clone(), text).await?,
            None => Vec::new(),
        };
        if seeds.is_empty() {
            seeds = self.keyword_seeds(text)?;
        }
        if seeds.is_empty() {
            return Ok(GraphQueryResult::empty(
                "No matching entities found in the memory graph.",
            ));
        }

        let (entities, relations) = self.expand(&seeds)?;
        let paths = self.pairwise_paths(&entities)?;
        let context = self.format_context(&entities, &relations, &paths)?;

        let relevance_score = match &self.provider {
            Some(provider) => self
                .evaluate_relevance(provider.clone(), text, &context)
                .await
                .unwrap_or_else(|| arithmetic_relevance(entities.len())),
            None => arithmetic_relevance(entities.len()),
        };

        Ok(GraphQueryResult {
            entities,
            relations,
            paths,
            context,
            relevance_score,
        })
    }

    /// Keyword-only query. Never touches the provider and skips path search.
    pub fn query_sync(&mut self, text: &str) -> Result<GraphQueryResult> {
        let seeds = self.keyword_seeds(text)?;
        if seeds.is_empty() {
            return Ok(GraphQueryResult::empty(
                "No matching entities found in the memory graph.",
            ));
        }

        let (entities, relations) = self.expand(&seeds)?;
        let context = self.format_context(&entities, &relations, &[])?;
        let relevance_score = arithmetic_relevance(entities.len());

        Ok(GraphQueryResult {
            entities,
            relations,
            paths: Vec::new(),
            context,
            relevance_score,
        })
    }

    /// Ask the provider for the query's key entity names and resolve them to
    /// graph ids. Any failure degrades to an empty list and the keyword path.
    async fn extract_query_seeds(
        &self,
        provider: Arc<dyn CompletionProvider>,
        text: &str,
    ) -> Result<Vec<String>> {
        let prompt = format!(
            r#"Extract the key entities (names, concepts, tools) from this question.

Question: "{text}"

Respond with a JSON array of entity names only:
["entity1", "entity2"]"#
        );

        let raw = match timeout(
            Duration::from_secs(QUERY_TIMEOUT_SECS),
            provider.complete(&prompt),
        )
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error = %e, "query entity extraction failed");
                return Ok(Vec::new());
            }
            Err(_) => {
                warn!("query entity extraction timed out");
                return Ok(Vec::new());
            }
        };

        let names: Vec<String> = match serde_json::from_str(strip_code_fences(&raw)) {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "query entity extraction returned malformed JSON");
                return Ok(Vec::new());
            }
        };

        let mut seen = HashSet::new();
        let mut seeds = Vec::new();
        for name in names {
            if let Some(hit) = self.graph.find_entities_by_name(&name)?.into_iter().next() {
                if seen.insert(hit.id.clone()) {
                    seeds.push(hit.id);
                }
            }
        }
        debug!(seeds = seeds.len(), "query seeds resolved via provider");
        Ok(seeds)
    }

    /// Naive seed resolution: every word longer than 2 chars, up to 2 name
    /// matches each.
    fn keyword_seeds(&self, text: &str) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut seeds = Vec::new();
        for word in text.to_lowercase().split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if word.len() <= 2 {
                continue;
            }
            for hit in self.graph.find_entities_by_name(word)?.into_iter().take(2) {
                if seen.insert(hit.id.clone()) {
                    seeds.push(hit.id);
                }
            }
        }
        Ok(seeds)
    }

    /// Expand seed neighborhoods and collect the surrounding relations.
    /// Seeds come first in the result; neighbors follow in sorted order so
    /// the entity cap cuts deterministically.
    fn expand(&mut self, seeds: &[String]) -> Result<(Vec<Entity>, Vec<Relation>)> {
        let mut ordered: Vec<String> = Vec::new();
        let mut included: HashSet<String> = HashSet::new();
        let mut neighbors: Vec<String> = Vec::new();

        for seed in seeds.iter().take(self.config.max_query_entities) {
            if included.insert(seed.clone()) {
                ordered.push(seed.clone());
            }
            for neighbor in self.graph.get_neighbors(seed, self.config.max_depth)? {
                if included.insert(neighbor.clone()) {
                    neighbors.push(neighbor);
                }
            }
        }
        neighbors.sort();
        ordered.extend(neighbors);
        ordered.truncate(self.config.max_entities);

        let mut entities = Vec::new();
        for id in &ordered {
            if let Some(entity) = self.graph.get_entity(id)? {
                entities.push(entity);
            }
        }
        for entity in &entities {
            self.graph.touch_entity(&entity.id)?;
        }

        let mut relation_ids = HashSet::new();
        let mut relations = Vec::new();
        for entity in &entities {
            for relation in self.graph.get_relations_for_entity(&entity.id)? {
                if relation_ids.insert(relation.id()) {
                    relations.push(relation);
                }
            }
        }
        relations.truncate(self.config.max_relations);

        Ok((entities, relations))
    }

    /// Shortest paths between the leading result entities, pairwise.
    fn pairwise_paths(&self, entities: &[Entity]) -> Result<Vec<Vec<String>>> {
        let limit = self.config.max_query_entities;
        let ids: Vec<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        let mut paths = Vec::new();

        for (i, source) in ids.iter().enumerate().take(limit) {
            for target in ids.iter().skip(i + 1).take(limit) {
                let path = self.graph.find_path(source, target, 3)?;
                if path.len() > 1 {
                    paths.push(path);
                }
                if paths.len() >= self.config.max_paths {
                    return Ok(paths);
                }
            }
        }
        Ok(paths)
    }

    fn format_context(
        &self,
        entities: &[Entity],
        relations: &[Relation],
        paths: &[Vec<String>],
    ) -> Result<String> {
        let mut parts: Vec<String> = Vec::new();

        if !entities.is_empty() {
            parts.push("### Related entities:".to_string());
            for entity in entities.iter().take(self.config.max_format_entities) {
                let mut props: Vec<String> = entity
                    .properties
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                props.sort();
                let suffix = if props.is_empty() {
                    String::new()
                } else {
                    format!(": {}", props.join(", "))
                };
                parts.push(format!(
                    "- **{}** ({}){suffix}",
                    entity.name, entity.entity_type
                ));
            }
        }

        if !relations.is_empty() {
            parts.push("\n### Relations:".to_string());
            for relation in relations.iter().take(self.config.max_format_relations) {
                let source = self.graph.get_entity(&relation.source_id)?;
                let target = self.graph.get_entity(&relation.target_id)?;
                if let (Some(source), Some(target)) = (source, target) {
                    parts.push(format!(
                        "- {} --[{}]--> {}",
                        source.name, relation.relation_type, target.name
                    ));
                }
            }
        }

        if !paths.is_empty() {
            parts.push("\n### Connection paths:".to_string());
            for path in paths.iter().take(MAX_FORMAT_PATHS) {
                let mut names = Vec::new();
                for id in path {
                    let name = self
                        .graph
                        .get_entity(id)?
                        .map(|e| e.name)
                        .unwrap_or_else(|| id.clone());
                    names.push(name);
                }
                parts.push(format!("- {}", names.join(" → ")));
            }
        }

        Ok(parts.join("\n"))
    }

    /// Provider-evaluated relevance in `[0, 1]`. `None` on any failure.
    async fn evaluate_relevance(
        &self,
        provider: Arc<dyn CompletionProvider>,
        text: &str,
        context: &str,
    ) -> Option<f64> {
        let prompt = format!(
            r#"Rate how relevant this memory context is to the question, from 0.0 to 1.0.

Question: "{text}"

Context:
{context}

Respond with a single number only."#
        );

        let raw = timeout(
            Duration::from_secs(QUERY_TIMEOUT_SECS),
            provider.complete(&prompt),
        )
        .await
        .ok()?
        .ok()?;
        let score: f64 = strip_code_fences(&raw).trim().parse().ok()?;
        Some(score.clamp(0.0, 1.0))
    }
}

/// Fallback score: each result entity is worth 0.2, capped at 1.0.
fn arithmetic_relevance(entity_count: usize) -> f64 {
    (entity_count as f64 * 0.2).min(1.0)
}

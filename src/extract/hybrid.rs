//! Extraction orchestration: NER baseline, decision gate, refinement merge.
//!
//! The gate is a tagged branch with three outcomes carried in
//! [`Provenance`](super::Provenance), not an extractor class hierarchy. Graph
//! mutation happens only after a complete candidate set exists, so a
//! cancelled or failed refinement call leaves the store untouched.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

use anyhow::Result;

use super::llm::{extraction_prompt, parse_payload, CompletionProvider};
use super::{ner, CandidateEntity, CandidateRelation, ExtractError, ExtractReport, Provenance};
use crate::config::ExtractionConfig;
use crate::graph::types::{entity_id_for, Entity, Relation};
use crate::graph::GraphBackend;

/// Forced extraction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Gate decides between NER-only and refinement.
    Auto,
    /// Local baseline only; the completion service is never invoked.
    NerOnly,
}

/// Complete candidate set, produced before any graph mutation.
#[derive(Debug)]
pub struct Extraction {
    pub entities: Vec<CandidateEntity>,
    pub relations: Vec<CandidateRelation>,
    pub mode: Provenance,
}

pub struct RelationshipExtractor {
    provider: Option<Arc<dyn CompletionProvider>>,
    config: ExtractionConfig,
}

impl RelationshipExtractor {
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>, config: ExtractionConfig) -> Self {
        Self { provider, config }
    }

    /// Run the two-stage pipeline without touching any store.
    pub async fn extract(&self, text: &str, mode: ExtractionMode) -> Extraction {
        let (ner_entities, ner_confidence) = ner::extract(text);

        let needs_refinement = text.len() >= self.config.min_text_len
            || ner_confidence < self.config.ner_confidence_threshold
            || ner_entities.is_empty();

        let provider = match (&self.provider, mode) {
            (Some(p), ExtractionMode::Auto) if needs_refinement => p,
            _ => {
                info!(
                    mode = "ner_only",
                    entities_found = ner_entities.len(),
                    refinement_skipped = true,
                    "entity extraction"
                );
                return Extraction {
                    entities: ner_entities,
                    relations: Vec::new(),
                    mode: Provenance::NerOnly,
                };
            }
        };

        info!(
            mode = if ner_entities.is_empty() { "llm_only" } else { "hybrid" },
            ner_entities = ner_entities.len(),
            "entity extraction"
        );

        match self.refine(provider.as_ref(), text).await {
            Ok(payload) => {
                let mode = if ner_entities.is_empty() {
                    Provenance::LlmOnly
                } else {
                    Provenance::Merged
                };
                Extraction {
                    entities: merge_candidates(ner_entities, payload.entities),
                    relations: payload.relations,
                    mode,
                }
            }
            Err(e) => {
                warn!(error = %e, "extraction refinement failed, using baseline");
                Extraction {
                    entities: ner_entities,
                    relations: Vec::new(),
                    mode: Provenance::NerOnly,
                }
            }
        }
    }

    async fn refine(
        &self,
        provider: &dyn CompletionProvider,
        text: &str,
    ) -> Result<super::llm::ExtractionPayload, ExtractError> {
        let prompt = extraction_prompt(text, self.config.max_prompt_chars);
        let secs = self.config.timeout_secs;
        let raw = timeout(Duration::from_secs(secs), provider.complete(&prompt))
            .await
            .map_err(|_| ExtractError::Timeout(secs))??;
        parse_payload(&raw)
    }

    /// Extract from `text` and apply the result to the graph. Entities below
    /// the importance threshold are filtered before insertion; relations are
    /// only stored when both endpoints survived the filter.
    pub async fn extract_and_store(
        &self,
        graph: &mut dyn GraphBackend,
        text: &str,
        mode: ExtractionMode,
    ) -> Result<ExtractReport> {
        let extraction = self.extract(text, mode).await;
        self.store(graph, extraction)
    }

    fn store(
        &self,
        graph: &mut dyn GraphBackend,
        extraction: Extraction,
    ) -> Result<ExtractReport> {
        let threshold = self.config.importance_threshold;
        let mut added = Vec::new();
        let mut filtered = 0usize;
        // candidate name → canonical stored id, for relation endpoint lookup
        let mut id_by_name: HashMap<String, String> = HashMap::new();

        for candidate in extraction.entities {
            if candidate.importance < threshold {
                filtered += 1;
                continue;
            }
            let entity = Entity {
                id: entity_id_for(&candidate.name),
                name: candidate.name.clone(),
                entity_type: candidate.entity_type,
                properties: HashMap::from([(
                    "importance".to_string(),
                    serde_json::json!(candidate.importance),
                )]),
                mentions: 1,
                created_at: String::new(),
                last_accessed: String::new(),
            };
            let stored_id = graph.add_entity(entity)?;
            if stored_id.is_empty() {
                filtered += 1;
                continue;
            }
            id_by_name.insert(candidate.name.to_lowercase(), stored_id.clone());
            added.push(stored_id);
        }

        let mut relations_added = Vec::new();
        for candidate in extraction.relations {
            let source = id_by_name.get(&candidate.source.to_lowercase());
            let target = id_by_name.get(&candidate.target.to_lowercase());
            if let (Some(source_id), Some(target_id)) = (source, target) {
                let mut relation =
                    Relation::new(source_id.clone(), target_id.clone(), candidate.relation_type);
                relation.context = candidate.context;
                let stored = graph.add_relation(relation)?;
                if !stored.is_empty() {
                    relations_added.push(stored);
                }
            }
        }

        info!(
            entities = added.len(),
            relations = relations_added.len(),
            "graph extraction stored"
        );
        Ok(ExtractReport {
            entities_added: added.len(),
            entities_filtered: filtered,
            relations_added: relations_added.len(),
            entities: added,
            relations: relations_added,
            mode: extraction.mode,
        })
    }
}

/// Merge baseline and refinement candidates: refinement wins on exact
/// lowercase name match, non-overlapping baseline entities are preserved.
fn merge_candidates(
    ner_entities: Vec<CandidateEntity>,
    llm_entities: Vec<CandidateEntity>,
) -> Vec<CandidateEntity> {
    let llm_names: std::collections::HashSet<String> =
        llm_entities.iter().map(|e| e.name.to_lowercase()).collect();
    let mut merged = llm_entities;
    for candidate in ner_entities {
        if !llm_names.contains(&candidate.name.to_lowercase()) {
            merged.push(candidate);
        }
    }
    merged
}

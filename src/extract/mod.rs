//! Hybrid entity/relationship extraction.
//!
//! Two-stage pipeline: a fast local named-entity baseline ([`ner`]), a
//! decision gate, and an external completion-service refinement ([`llm`]).
//! Short, confidently-tagged text skips the expensive path; any refinement
//! failure falls back to the local baseline. Orchestration lives in
//! [`hybrid::RelationshipExtractor`].

pub mod hybrid;
pub mod llm;
pub mod ner;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Typed extraction failure. Always recoverable — the caller falls back to
/// the NER baseline or an empty result, never a crash.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction timed out after {0}s")]
    Timeout(u64),
    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),
    #[error("extraction service error: {0}")]
    Service(String),
}

/// A candidate entity produced by either extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEntity {
    pub name: String,
    #[serde(rename = "type", default = "default_entity_type")]
    pub entity_type: String,
    #[serde(default = "default_importance")]
    pub importance: f64,
}

fn default_entity_type() -> String {
    "concept".into()
}

fn default_importance() -> f64 {
    0.5
}

/// A candidate relation between two named candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRelation {
    pub source: String,
    pub target: String,
    #[serde(rename = "relation", default = "default_relation_type")]
    pub relation_type: String,
    #[serde(default)]
    pub context: String,
}

fn default_relation_type() -> String {
    "related_to".into()
}

/// Which stage produced the final candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Local baseline only — the gate skipped refinement, or it failed.
    NerOnly,
    /// Refinement only — the baseline found nothing.
    LlmOnly,
    /// Baseline and refinement merged (refinement wins on name match).
    Merged,
}

/// Result of an extract-and-store call.
#[derive(Debug, Serialize)]
pub struct ExtractReport {
    pub entities_added: usize,
    pub entities_filtered: usize,
    pub relations_added: usize,
    /// Canonical ids of the stored entities.
    pub entities: Vec<String>,
    /// Ids of the stored relations.
    pub relations: Vec<String>,
    pub mode: Provenance,
}

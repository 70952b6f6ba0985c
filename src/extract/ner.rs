//! Local named-entity baseline: fast, no external call.
//!
//! A rule-based recognizer over a bounded prefix of the input. Capitalized
//! token spans become candidates; a small lexicon tags well-known tools and
//! languages. Recognizer labels map to the domain entity-type vocabulary and
//! every candidate carries a fixed confidence.

use super::CandidateEntity;
use crate::graph::types::is_stopword;

/// Only the first slice of the text is scanned.
const SCAN_PREFIX_CHARS: usize = 1000;

/// Confidence assigned to every baseline candidate.
pub const NER_CONFIDENCE: f64 = 0.85;

/// Importance assigned to every baseline candidate.
const NER_IMPORTANCE: f64 = 0.7;

/// Well-known tools and languages, tagged `tool` regardless of casing.
const TOOL_LEXICON: &[&str] = &[
    "python", "rust", "javascript", "typescript", "java", "kotlin", "swift", "docker", "git",
    "github", "linux", "postgres", "postgresql", "sqlite", "redis", "kubernetes", "vscode",
    "vs code", "vim", "emacs", "node", "react", "tokio",
];

/// Coarse recognizer label, mapped to the entity-type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NerLabel {
    Person,
    Org,
    Product,
}

fn map_label(label: NerLabel) -> &'static str {
    match label {
        NerLabel::Person => "person",
        NerLabel::Org => "project",
        NerLabel::Product => "tool",
    }
}

/// Extract baseline candidates and their average confidence.
///
/// Candidates are deduplicated by lowercase name; the average confidence is
/// 0.0 when nothing was found.
pub fn extract(text: &str) -> (Vec<CandidateEntity>, f64) {
    let prefix: String = text.chars().take(SCAN_PREFIX_CHARS).collect();
    let mut entities = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for span in capitalized_spans(&prefix) {
        let lower = span.to_lowercase();
        if is_stopword(&lower) || !seen.insert(lower.clone()) {
            continue;
        }
        let label = classify(&span, &lower);
        entities.push(CandidateEntity {
            name: span,
            entity_type: map_label(label).to_string(),
            importance: NER_IMPORTANCE,
        });
    }

    // Lexicon hits that appear lowercased in running text.
    for word in prefix.split(|c: char| !c.is_alphanumeric()) {
        let lower = word.to_lowercase();
        if word.len() > 2 && TOOL_LEXICON.contains(&lower.as_str()) && seen.insert(lower) {
            entities.push(CandidateEntity {
                name: word.to_string(),
                entity_type: "tool".into(),
                importance: NER_IMPORTANCE,
            });
        }
    }

    let confidence = if entities.is_empty() {
        0.0
    } else {
        NER_CONFIDENCE
    };
    (entities, confidence)
}

/// Group consecutive capitalized words into spans. Sentence-leading function
/// words are handled by the stopword filter, not here.
fn capitalized_spans(text: &str) -> Vec<String> {
    let mut spans = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for raw in text.split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
        if !word.is_empty() && is_capitalized(word) {
            current.push(word);
        } else {
            flush_span(&mut spans, &mut current);
        }
        if raw.ends_with(['.', '!', '?']) {
            flush_span(&mut spans, &mut current);
        }
    }
    flush_span(&mut spans, &mut current);
    spans
}

fn flush_span(spans: &mut Vec<String>, current: &mut Vec<&str>) {
    if !current.is_empty() {
        spans.push(current.join(" "));
        current.clear();
    }
}

fn is_capitalized(word: &str) -> bool {
    word.chars()
        .next()
        .map(|c| c.is_uppercase())
        .unwrap_or(false)
}

fn classify(span: &str, lower: &str) -> NerLabel {
    if TOOL_LEXICON.contains(&lower) {
        return NerLabel::Product;
    }
    if span.split(' ').count() > 1 || span.chars().all(|c| c.is_uppercase() || !c.is_alphabetic()) {
        return NerLabel::Org;
    }
    NerLabel::Person
}

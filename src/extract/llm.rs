//! External completion-service refinement.
//!
//! Provides the [`CompletionProvider`] seam and the default HTTP
//! implementation against an OpenAI-style chat endpoint. The service returns
//! a JSON object with `entities` and `relations` arrays; anything that is
//! not valid JSON is a typed [`ExtractError`], never a crash.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{CandidateEntity, CandidateRelation, ExtractError};
use crate::config::ExtractionConfig;

/// Text-completion seam. Implementations must resolve or fail — the caller
/// wraps every call in a timeout.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ExtractError>;
}

/// Structured payload expected back from the refinement prompt.
#[derive(Debug, Deserialize, Default)]
pub struct ExtractionPayload {
    #[serde(default)]
    pub entities: Vec<CandidateEntity>,
    #[serde(default)]
    pub relations: Vec<CandidateRelation>,
}

/// Parse a completion response into the extraction payload, tolerating
/// markdown code fences around the JSON body.
pub fn parse_payload(raw: &str) -> Result<ExtractionPayload, ExtractError> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(cleaned)
        .map_err(|e| ExtractError::MalformedResponse(format!("{e}: {:.100}", cleaned)))
}

/// Strip ```json fences the completion service tends to wrap output in.
pub fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Build the refinement prompt for a bounded slice of the input text.
pub fn extraction_prompt(text: &str, max_chars: usize) -> String {
    let bounded: String = text.chars().take(max_chars).collect();
    format!(
        r#"Extract the entities and relationships from the following text that are
worth remembering long-term about the user and their world.

Text: "{bounded}"

Scoring guidance (importance, 0.0-1.0):
- personal facts, habits, health: 0.9+
- active projects: 0.85+
- frequently used tools and technologies: 0.8+
- important people: 0.8+
- recurring preferences: 0.7+
- transient concepts, code snippets, protocol details: 0

Respond with JSON only (no explanation):
{{
    "entities": [
        {{"name": "entity name", "type": "person/concept/tool/preference/project", "importance": 0.0}}
    ],
    "relations": [
        {{"source": "entity1", "target": "entity2", "relation": "uses/likes/knows/manages"}}
    ]
}}"#
    )
}

// ── HTTP provider ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Completion provider for an OpenAI-style `/chat/completions` endpoint.
pub struct HttpCompletionProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpCompletionProvider {
    /// Build from config. Returns `None` when no endpoint is configured —
    /// extraction then runs NER-only.
    pub fn from_config(config: &ExtractionConfig) -> Option<Self> {
        if config.endpoint.is_empty() {
            return None;
        }
        let api_key = std::env::var(&config.api_key_env).ok();
        Some(Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ExtractError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExtractError::Service(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Service(format!(
                "completion endpoint returned {status}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::MalformedResponse(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ExtractError::MalformedResponse("empty choices".into()))?;

        debug!(chars = content.len(), "completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_json() {
        let payload = parse_payload(
            r#"{"entities": [{"name": "Alice", "type": "person", "importance": 0.9}],
                "relations": [{"source": "Alice", "target": "Python", "relation": "uses"}]}"#,
        )
        .unwrap();
        assert_eq!(payload.entities.len(), 1);
        assert_eq!(payload.entities[0].entity_type, "person");
        assert_eq!(payload.relations[0].relation_type, "uses");
    }

    #[test]
    fn parse_fenced_json() {
        let raw = "```json\n{\"entities\": [], \"relations\": []}\n```";
        let payload = parse_payload(raw).unwrap();
        assert!(payload.entities.is_empty());
    }

    #[test]
    fn parse_defaults_for_missing_fields() {
        let payload = parse_payload(r#"{"entities": [{"name": "thing"}]}"#).unwrap();
        assert_eq!(payload.entities[0].entity_type, "concept");
        assert!((payload.entities[0].importance - 0.5).abs() < 1e-9);
        let payload =
            parse_payload(r#"{"relations": [{"source": "a", "target": "b"}]}"#).unwrap();
        assert_eq!(payload.relations[0].relation_type, "related_to");
    }

    #[test]
    fn malformed_json_is_typed_failure() {
        let err = parse_payload("definitely not json").unwrap_err();
        assert!(matches!(err, ExtractError::MalformedResponse(_)));
    }

    #[test]
    fn prompt_truncates_text() {
        let text = "x".repeat(5000);
        let prompt = extraction_prompt(&text, 800);
        assert!(prompt.contains(&"x".repeat(800)));
        assert!(!prompt.contains(&"x".repeat(801)));
    }
}

//! Memory decay: importance erosion over time with forgetting resistance.
//!
//! [`engine`] holds the core decay formula, [`dynamic`] tunes its parameters
//! from observed user behavior, and [`consolidate`] runs the periodic sweep
//! that applies decay to stored memories and fades the ones below threshold.

pub mod consolidate;
pub mod dynamic;
pub mod engine;

use serde::{Deserialize, Serialize};

/// Memory classification, ordered roughly by how fast each kind fades.
/// Conversations decay at the full base rate; facts barely decay at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Conversation,
    Fact,
    Preference,
    Insight,
}

impl MemoryType {
    /// Decay-rate multiplier applied on top of the base rate.
    pub fn decay_multiplier(self) -> f64 {
        match self {
            MemoryType::Conversation => 1.0,
            MemoryType::Fact => 0.3,
            MemoryType::Preference => 0.5,
            MemoryType::Insight => 0.7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MemoryType::Conversation => "conversation",
            MemoryType::Fact => "fact",
            MemoryType::Preference => "preference",
            MemoryType::Insight => "insight",
        }
    }

    /// Parse a stored type tag. Unknown tags fall back to `Conversation`,
    /// the fastest-decaying class, so bad data never over-preserves.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "fact" => MemoryType::Fact,
            "preference" => MemoryType::Preference,
            "insight" => MemoryType::Insight,
            _ => MemoryType::Conversation,
        }
    }
}

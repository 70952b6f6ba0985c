//! Long-term relational memory for conversational agents.
//!
//! Mnema ingests free-form text, extracts entities and relationships, stores
//! them in a weighted knowledge graph, answers graph-shaped queries ("what is
//! connected to X"), and continuously decays the importance of stored memories
//! so that stale information fades while frequently-accessed or
//! richly-connected information persists.
//!
//! # Architecture
//!
//! - **Graph**: deduplicated entity/relation store with O(1) name and relation
//!   lookups, TF-IDF weight recalculation, JSON snapshot persistence, and an
//!   optional SQLite backend behind the same [`graph::GraphBackend`] contract
//! - **Extraction**: hybrid pipeline — a fast local named-entity baseline, a
//!   decision gate, and an external completion-service refinement that falls
//!   back to the local result on any service failure
//! - **Decay**: forgetting-curve model moderated by access frequency, graph
//!   connectivity, channel diversity, and a recency-paradox boost; per-user
//!   dynamic tuning from behavior metrics is feature-gated
//! - **Query**: seed resolution, neighborhood expansion (direct BFS or the
//!   dense integer arena for large graphs), path discovery, and context
//!   assembly
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`graph`] — Entity graph store, acceleration bridge, snapshot, SQLite backend
//! - [`extract`] — Hybrid entity/relationship extraction
//! - [`decay`] — Decay engine, dynamic tuner, and consolidation sweep
//! - [`query`] — Graph query engine and context formatting

pub mod config;
pub mod decay;
pub mod extract;
pub mod graph;
pub mod query;

//! Periodic consolidation sweep.
//!
//! Walks every stored memory record, preserves the heavily repeated ones,
//! applies the decay engine to the rest (connection counts pulled from the
//! knowledge graph), writes the decayed importance back, and fades records
//! that dropped below the deletion threshold without enough repetitions or
//! accesses to justify keeping them.

use anyhow::{Context, Result};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::DecayConfig;
use crate::graph::GraphBackend;

use super::dynamic::DynamicDecayTuner;
use super::engine::{DecayEngine, DecayInput};
use super::MemoryType;

/// One consolidation subject. `id` doubles as the graph entity id for
/// connection-count lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub importance: f64,
    /// RFC 3339. Unparseable timestamps leave the importance untouched.
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub access_count: u64,
    /// RFC 3339, empty when never accessed.
    #[serde(default)]
    pub last_accessed: String,
    #[serde(default = "default_memory_type")]
    pub memory_type: MemoryType,
    #[serde(default)]
    pub channel_mentions: u64,
    /// Preserved records are exempt from decay and deletion forever.
    #[serde(default)]
    pub preserved: bool,
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
}

fn default_memory_type() -> MemoryType {
    MemoryType::Conversation
}

fn default_repetitions() -> u32 {
    1
}

/// Counts from one consolidation sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ConsolidationReport {
    /// Records examined (preserved ones included).
    pub checked: usize,
    /// Surviving records whose importance was updated.
    pub changed: usize,
    /// Records newly marked preserved this sweep.
    pub preserved: usize,
    /// Records removed for having faded below the deletion threshold.
    pub faded: usize,
}

/// Delta below which a decayed importance does not count as changed.
const IMPORTANCE_CHANGE_EPSILON: f64 = 1e-6;

pub struct Consolidator {
    engine: DecayEngine,
    config: DecayConfig,
}

impl Consolidator {
    pub fn new(config: DecayConfig) -> Self {
        Self {
            engine: DecayEngine::new(config.clone()),
            config,
        }
    }

    /// Run one sweep over `records`, mutating them in place and removing the
    /// faded ones. When the tuner is enabled its current parameters override
    /// the engine's base rate and recency boost for this sweep.
    pub fn sweep(
        &mut self,
        records: &mut Vec<MemoryRecord>,
        graph: &dyn GraphBackend,
        tuner: &DynamicDecayTuner,
    ) -> Result<ConsolidationReport> {
        if tuner.enabled() {
            let params = tuner.params(self.config.base_decay_rate);
            self.engine.set_rates(params.base_rate, params.recency_boost);
            info!(
                base_rate = params.base_rate,
                recency_boost = params.recency_boost,
                "dynamic decay parameters applied"
            );
        }

        let now = Utc::now();
        let mut report = ConsolidationReport {
            checked: records.len(),
            ..ConsolidationReport::default()
        };

        let mut connections: HashMap<String, usize> = HashMap::new();
        for record in records.iter() {
            if !connections.contains_key(&record.id) {
                connections.insert(record.id.clone(), graph.connection_count(&record.id)?);
            }
        }

        records.retain_mut(|record| {
            if record.preserved {
                return true;
            }
            if record.repetitions >= self.config.preserve_repetitions {
                record.preserved = true;
                report.preserved += 1;
                debug!(id = %record.id, repetitions = record.repetitions, "memory preserved");
                return true;
            }

            let last_access_hours = age_hours(&record.last_accessed, now);
            let access_count = match last_accessed_hour(&record.last_accessed) {
                Some(hour) => tuner.effective_access_count(record.access_count, hour),
                None => record.access_count,
            };
            let decayed = self.engine.calculate(&DecayInput {
                importance: record.importance,
                hours_elapsed: age_hours(&record.created_at, now),
                access_count,
                connection_count: connections.get(&record.id).copied().unwrap_or(0),
                last_access_hours,
                memory_type: record.memory_type,
                channel_mentions: record.channel_mentions,
            });

            if decayed < self.config.delete_threshold
                && record.repetitions < 2
                && record.access_count < 3
            {
                report.faded += 1;
                debug!(id = %record.id, decayed, "memory faded");
                return false;
            }
            if (decayed - record.importance).abs() > IMPORTANCE_CHANGE_EPSILON {
                record.importance = decayed;
                report.changed += 1;
            }
            true
        });

        info!(
            checked = report.checked,
            changed = report.changed,
            preserved = report.preserved,
            faded = report.faded,
            "consolidation sweep complete"
        );
        Ok(report)
    }
}

/// Load memory records from a JSON file. A missing file is an empty store;
/// a corrupt file is logged and treated as empty rather than blocking the
/// sweep.
pub fn load_records(path: &Path) -> Vec<MemoryRecord> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return Vec::new(),
    };
    match serde_json::from_str(&contents) {
        Ok(records) => records,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt memory records, starting empty");
            Vec::new()
        }
    }
}

/// Persist memory records. Write failures propagate to the caller.
pub fn save_records(records: &[MemoryRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("failed to create records directory")?;
    }
    let json = serde_json::to_string_pretty(records).context("failed to serialize records")?;
    std::fs::write(path, json).context("failed to write records file")?;
    Ok(())
}

/// Hours between `timestamp` and `now`. Returns `-1.0` for empty or
/// unparseable timestamps, which the decay engine treats as "skip".
pub fn age_hours(timestamp: &str, now: DateTime<Utc>) -> f64 {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(parsed) => (now - parsed.with_timezone(&Utc)).num_seconds() as f64 / 3600.0,
        Err(_) => -1.0,
    }
}

/// Hour of day (0-23) a timestamp falls in, for circadian adjustment.
fn last_accessed_hour(timestamp: &str) -> Option<usize> {
    DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).hour() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DynamicDecayConfig;
    use crate::graph::store::KnowledgeGraph;
    use chrono::Duration;

    fn rfc3339_hours_ago(hours: i64) -> String {
        (Utc::now() - Duration::hours(hours)).to_rfc3339()
    }

    fn record(id: &str, importance: f64, age_h: i64) -> MemoryRecord {
        MemoryRecord {
            id: id.to_string(),
            importance,
            created_at: rfc3339_hours_ago(age_h),
            access_count: 0,
            last_accessed: String::new(),
            memory_type: MemoryType::Conversation,
            channel_mentions: 0,
            preserved: false,
            repetitions: 1,
        }
    }

    fn sweep(records: &mut Vec<MemoryRecord>) -> ConsolidationReport {
        let mut consolidator = Consolidator::new(DecayConfig::default());
        let graph = KnowledgeGraph::default();
        let tuner = DynamicDecayTuner::new(DynamicDecayConfig::default());
        consolidator.sweep(records, &graph, &tuner).unwrap()
    }

    #[test]
    fn preserved_records_are_untouched() {
        let mut records = vec![MemoryRecord {
            preserved: true,
            ..record("kept", 0.001, 100_000)
        }];
        let report = sweep(&mut records);
        assert_eq!(report.checked, 1);
        assert_eq!(report.faded, 0);
        assert_eq!(report.changed, 0);
        assert!((records[0].importance - 0.001).abs() < 1e-12);
    }

    #[test]
    fn high_repetition_records_become_preserved() {
        let mut records = vec![MemoryRecord {
            repetitions: 5,
            ..record("repeated", 0.8, 500)
        }];
        let report = sweep(&mut records);
        assert_eq!(report.preserved, 1);
        assert!(records[0].preserved);
        // Importance is not decayed in the sweep that preserves.
        assert!((records[0].importance - 0.8).abs() < 1e-12);
    }

    #[test]
    fn surviving_records_get_decayed_importance() {
        let mut records = vec![record("aging", 0.8, 720)];
        let report = sweep(&mut records);
        assert_eq!(report.changed, 1);
        assert_eq!(report.faded, 0);
        assert!(records[0].importance < 0.8);
        assert!(records[0].importance >= 0.8 * 0.3);
    }

    #[test]
    fn fresh_records_are_unchanged() {
        let mut records = vec![record("fresh", 0.8, 0)];
        let report = sweep(&mut records);
        assert_eq!(report.changed, 0);
        assert!((records[0].importance - 0.8).abs() < 1e-9);
    }

    #[test]
    fn repetitions_and_accesses_block_fading() {
        // min_retention floors decay at 0.3·importance, so only records whose
        // original importance is tiny can fall below the 0.03 threshold.
        let mut records = vec![
            record("fades", 0.05, 100_000),
            MemoryRecord {
                repetitions: 2,
                ..record("repeated", 0.05, 100_000)
            },
            MemoryRecord {
                access_count: 3,
                ..record("accessed", 0.05, 100_000)
            },
        ];
        let report = sweep(&mut records);
        assert_eq!(report.faded, 1);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["repeated", "accessed"]);
    }

    #[test]
    fn graph_connections_slow_record_decay() {
        use crate::graph::types::{Entity, Relation};

        let mut graph = KnowledgeGraph::default();
        graph.add_entity(Entity::new("hub", "concept"));
        for i in 0..5 {
            graph.add_entity(Entity::new(format!("n{i}"), "concept"));
            graph.add_relation(Relation::new("hub", format!("n{i}"), "r"));
        }

        let mut consolidator = Consolidator::new(DecayConfig::default());
        let tuner = DynamicDecayTuner::new(DynamicDecayConfig::default());
        let mut connected = vec![record("hub", 0.8, 2000)];
        let mut isolated = vec![record("loner", 0.8, 2000)];
        consolidator.sweep(&mut connected, &graph, &tuner).unwrap();
        consolidator.sweep(&mut isolated, &graph, &tuner).unwrap();
        assert!(connected[0].importance > isolated[0].importance);
    }

    #[test]
    fn invalid_created_at_leaves_importance_alone() {
        let mut records = vec![MemoryRecord {
            created_at: "not a timestamp".into(),
            ..record("odd", 0.7, 0)
        }];
        let report = sweep(&mut records);
        assert_eq!(report.changed, 0);
        assert!((records[0].importance - 0.7).abs() < 1e-12);
    }

    #[test]
    fn records_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("memories.json");

        assert!(load_records(&path).is_empty());

        let records = vec![record("alpha", 0.8, 10), record("beta", 0.4, 200)];
        save_records(&records, &path).unwrap();
        let loaded = load_records(&path);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "alpha");
        assert!((loaded[1].importance - 0.4).abs() < 1e-12);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_records(&path).is_empty());
    }

    #[test]
    fn age_hours_parses_and_rejects() {
        let now = Utc::now();
        let two_hours = age_hours(&rfc3339_hours_ago(2), now);
        assert!((two_hours - 2.0).abs() < 0.01);
        assert_eq!(age_hours("", now), -1.0);
        assert_eq!(age_hours("garbage", now), -1.0);
    }
}

//! Consolidation sweeps against a populated graph.

mod helpers;

use chrono::{Duration, Utc};

use mnema::config::{DecayConfig, DynamicDecayConfig};
use mnema::decay::consolidate::{
    load_records, save_records, Consolidator, MemoryRecord,
};
use mnema::decay::dynamic::DynamicDecayTuner;
use mnema::decay::MemoryType;

fn hours_ago(hours: i64) -> String {
    (Utc::now() - Duration::hours(hours)).to_rfc3339()
}

fn record(id: &str, importance: f64, age_hours: i64, memory_type: MemoryType) -> MemoryRecord {
    MemoryRecord {
        id: id.to_string(),
        importance,
        created_at: hours_ago(age_hours),
        access_count: 0,
        last_accessed: String::new(),
        memory_type,
        channel_mentions: 0,
        preserved: false,
        repetitions: 1,
    }
}

#[test]
fn sweep_preserves_fades_and_updates() {
    let mut records = vec![
        MemoryRecord {
            repetitions: 6,
            ..record("pinned", 0.9, 1000, MemoryType::Fact)
        },
        record("fading", 0.05, 100_000, MemoryType::Conversation),
        record("aging", 0.8, 720, MemoryType::Conversation),
    ];

    let graph = helpers::sample_graph();
    let mut consolidator = Consolidator::new(DecayConfig::default());
    let tuner = DynamicDecayTuner::new(DynamicDecayConfig::default());
    let report = consolidator.sweep(&mut records, &graph, &tuner).unwrap();

    assert_eq!(report.checked, 3);
    assert_eq!(report.preserved, 1);
    assert_eq!(report.faded, 1);
    assert_eq!(report.changed, 1);

    assert_eq!(records.len(), 2);
    assert!(records[0].preserved);
    assert!((records[0].importance - 0.9).abs() < 1e-12);
    assert_eq!(records[1].id, "aging");
    assert!(records[1].importance < 0.8);
}

#[test]
fn graph_connectivity_protects_memories() {
    // "alice" has relations in the sample graph; "hermit" has none.
    let graph = helpers::sample_graph();
    let mut consolidator = Consolidator::new(DecayConfig::default());
    let tuner = DynamicDecayTuner::new(DynamicDecayConfig::default());

    let mut records = vec![
        record("alice", 0.8, 1000, MemoryType::Conversation),
        record("hermit", 0.8, 1000, MemoryType::Conversation),
    ];
    consolidator.sweep(&mut records, &graph, &tuner).unwrap();

    let alice = records.iter().find(|r| r.id == "alice").unwrap();
    let hermit = records.iter().find(|r| r.id == "hermit").unwrap();
    assert!(alice.importance > hermit.importance);
}

#[test]
fn enabled_tuner_changes_sweep_rates() {
    let graph = helpers::sample_graph();
    let config = DynamicDecayConfig {
        enabled: true,
        ..DynamicDecayConfig::default()
    };
    let mut tuner = DynamicDecayTuner::new(config);
    // A hyperactive user: decay should run at the upper end of the band.
    for _ in 0..20 {
        tuner.record_interaction(100.0, 5.0, 3600.0, 9, 6.0);
    }

    let mut tuned_records = vec![record("aging", 0.8, 800, MemoryType::Conversation)];
    let mut default_records = tuned_records.clone();

    let mut tuned = Consolidator::new(DecayConfig::default());
    tuned.sweep(&mut tuned_records, &graph, &tuner).unwrap();

    let neutral = DynamicDecayTuner::new(DynamicDecayConfig::default());
    let mut plain = Consolidator::new(DecayConfig::default());
    plain.sweep(&mut default_records, &graph, &neutral).unwrap();

    // Tuned base rate differs from the static default, so the decayed
    // importances diverge.
    assert!((tuned_records[0].importance - default_records[0].importance).abs() > 1e-9);
}

#[test]
fn sweep_survives_record_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memories.json");

    let records = vec![
        record("alpha", 0.9, 10, MemoryType::Fact),
        record("beta", 0.4, 5000, MemoryType::Conversation),
    ];
    save_records(&records, &path).unwrap();

    let mut loaded = load_records(&path);
    assert_eq!(loaded.len(), 2);

    let graph = helpers::sample_graph();
    let mut consolidator = Consolidator::new(DecayConfig::default());
    let tuner = DynamicDecayTuner::new(DynamicDecayConfig::default());
    consolidator.sweep(&mut loaded, &graph, &tuner).unwrap();
    save_records(&loaded, &path).unwrap();

    let reloaded = load_records(&path);
    assert_eq!(reloaded.len(), loaded.len());
    assert_eq!(reloaded[0].memory_type, MemoryType::Fact);
}

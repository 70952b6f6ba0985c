use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mnema::config::MnemaConfig;
use mnema::decay::consolidate;
use mnema::decay::dynamic::DynamicDecayTuner;
use mnema::extract::hybrid::{ExtractionMode, RelationshipExtractor};
use mnema::extract::llm::{CompletionProvider, HttpCompletionProvider};
use mnema::graph::relational::RelationalGraph;
use mnema::graph::snapshot;
use mnema::graph::store::KnowledgeGraph;
use mnema::graph::GraphBackend;
use mnema::query::GraphQueryEngine;

#[derive(Parser)]
#[command(name = "mnema", version, about = "Relational long-term memory for AI agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract entities and relations from text into the memory graph
    Ingest {
        text: String,
        /// Skip the completion-service refinement stage
        #[arg(long)]
        ner_only: bool,
    },
    /// Query the memory graph with a natural-language question
    Query {
        text: String,
        /// Keyword matching only, no completion calls
        #[arg(long)]
        sync: bool,
    },
    /// Run a decay sweep: preserve, fade, and update stored memories
    Consolidate,
    /// Recalculate relation weights from co-occurrence statistics
    Recalc,
    /// Print graph statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MnemaConfig::load()?;

    // Log to stderr so stdout stays clean for the command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut graph: Box<dyn GraphBackend> = match config.storage.backend.as_str() {
        "sqlite" => Box::new(RelationalGraph::open(
            config.resolved_db_path(),
            config.graph.clone(),
        )?),
        _ => {
            let snapshot_path = config.resolved_snapshot_path();
            let mut g = KnowledgeGraph::new(config.graph.clone());
            snapshot::load(&mut g, &snapshot_path);
            g.set_snapshot_path(snapshot_path);
            Box::new(g)
        }
    };

    let provider: Option<Arc<dyn CompletionProvider>> =
        HttpCompletionProvider::from_config(&config.extraction)
            .map(|p| Arc::new(p) as Arc<dyn CompletionProvider>);

    match cli.command {
        Command::Ingest { text, ner_only } => {
            let extractor = RelationshipExtractor::new(provider, config.extraction.clone());
            let mode = if ner_only {
                ExtractionMode::NerOnly
            } else {
                ExtractionMode::Auto
            };
            let report = extractor
                .extract_and_store(graph.as_mut(), &text, mode)
                .await?;
            graph.persist()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Query { text, sync } => {
            let mut engine = GraphQueryEngine::new(graph, provider, config.query.clone());
            let result = if sync {
                engine.query_sync(&text)?
            } else {
                engine.query(&text).await?
            };
            // Queries touch access timestamps, so persist them.
            engine.graph().persist()?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Consolidate => {
            let records_path = config.resolved_records_path();
            let mut records = consolidate::load_records(&records_path);
            let mut consolidator = consolidate::Consolidator::new(config.decay.clone());
            let tuner = DynamicDecayTuner::new(config.dynamic_decay.clone());
            let report = consolidator.sweep(&mut records, graph.as_ref(), &tuner)?;
            consolidate::save_records(&records, &records_path)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Recalc => {
            let report = graph.recalculate_weights()?;
            graph.persist()?;
            info!(total = report.total, changed = report.changed, "recalculation done");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Stats => {
            let stats = graph.get_stats()?;
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).context("failed to serialize stats")?
            );
        }
    }

    Ok(())
}

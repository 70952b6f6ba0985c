use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MnemaConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub graph: GraphConfig,
    pub extraction: ExtractionConfig,
    pub query: QueryConfig,
    pub decay: DecayConfig,
    pub dynamic_decay: DynamicDecayConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Graph backend: `"memory"` (JSON snapshot) or `"sqlite"`.
    pub backend: String,
    pub snapshot_path: String,
    pub db_path: String,
    /// Memory records swept by consolidation.
    pub records_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GraphConfig {
    /// Minimum entity count before BFS dispatches to the dense integer arena.
    pub native_threshold: usize,
    /// Naive weight bump applied when a relation triple is re-added.
    pub weight_increment: f64,
    /// TF-IDF share of the recalculated relation weight.
    pub tfidf_weight: f64,
    /// Previous-weight share of the recalculated relation weight.
    pub baseline_weight: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Text shorter than this with a confident NER result skips the completion call.
    pub min_text_len: usize,
    /// NER confidence below this forces refinement.
    pub ner_confidence_threshold: f64,
    /// Entities below this importance are filtered before graph insertion.
    pub importance_threshold: f64,
    pub timeout_secs: u64,
    /// Prompt text is truncated to this many characters.
    pub max_prompt_chars: usize,
    /// Completion endpoint URL. Empty disables the refinement stage.
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub max_entities: usize,
    pub max_depth: usize,
    pub max_relations: usize,
    pub max_paths: usize,
    pub max_query_entities: usize,
    pub max_format_entities: usize,
    pub max_format_relations: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DecayConfig {
    pub base_decay_rate: f64,
    pub min_retention: f64,
    pub access_stability_k: f64,
    pub relation_resistance_k: f64,
    pub channel_diversity_k: f64,
    /// Age in hours beyond which a memory counts as "old" for the recency paradox.
    pub recency_age_hours: f64,
    /// Last-access window in hours that counts as "just revisited".
    pub recency_access_hours: f64,
    pub recency_boost: f64,
    /// Decayed importance below this marks a memory as faded.
    pub delete_threshold: f64,
    /// Repetition count at which a memory is permanently preserved.
    pub preserve_repetitions: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DynamicDecayConfig {
    pub enabled: bool,
    /// Base EMA smoothing factor for behavior signals.
    pub ema_alpha: f64,
}

impl Default for MnemaConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            graph: GraphConfig::default(),
            extraction: ExtractionConfig::default(),
            query: QueryConfig::default(),
            decay: DecayConfig::default(),
            dynamic_decay: DynamicDecayConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let snapshot_path = default_mnema_dir()
            .join("graph.json")
            .to_string_lossy()
            .into_owned();
        let db_path = default_mnema_dir()
            .join("graph.db")
            .to_string_lossy()
            .into_owned();
        let records_path = default_mnema_dir()
            .join("memories.json")
            .to_string_lossy()
            .into_owned();
        Self {
            backend: "memory".into(),
            snapshot_path,
            db_path,
            records_path,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            native_threshold: 100,
            weight_increment: 0.1,
            tfidf_weight: 0.7,
            baseline_weight: 0.3,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_text_len: 200,
            ner_confidence_threshold: 0.8,
            importance_threshold: 0.6,
            timeout_secs: 25,
            max_prompt_chars: 800,
            endpoint: String::new(),
            model: "gpt-4o-mini".into(),
            api_key_env: "MNEMA_API_KEY".into(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_entities: 5,
            max_depth: 2,
            max_relations: 10,
            max_paths: 5,
            max_query_entities: 3,
            max_format_entities: 5,
            max_format_relations: 5,
        }
    }
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            base_decay_rate: 0.001,
            min_retention: 0.3,
            access_stability_k: 0.3,
            relation_resistance_k: 0.1,
            channel_diversity_k: 0.2,
            recency_age_hours: 168.0,
            recency_access_hours: 24.0,
            recency_boost: 1.3,
            delete_threshold: 0.03,
            preserve_repetitions: 5,
        }
    }
}

impl Default for DynamicDecayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ema_alpha: 0.3,
        }
    }
}

/// Returns `~/.mnema/`
pub fn default_mnema_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".mnema")
}

/// Returns the default config file path: `~/.mnema/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mnema_dir().join("config.toml")
}

impl MnemaConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MnemaConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MNEMA_SNAPSHOT, MNEMA_BACKEND, MNEMA_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MNEMA_SNAPSHOT") {
            self.storage.snapshot_path = val;
        }
        if let Ok(val) = std::env::var("MNEMA_BACKEND") {
            self.storage.backend = val;
        }
        if let Ok(val) = std::env::var("MNEMA_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the snapshot path, expanding `~` if needed.
    pub fn resolved_snapshot_path(&self) -> PathBuf {
        expand_tilde(&self.storage.snapshot_path)
    }

    /// Resolve the SQLite database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the memory records path, expanding `~` if needed.
    pub fn resolved_records_path(&self) -> PathBuf {
        expand_tilde(&self.storage.records_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MnemaConfig::default();
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.graph.native_threshold, 100);
        assert_eq!(config.query.max_depth, 2);
        assert!((config.decay.base_decay_rate - 0.001).abs() < 1e-12);
        assert!(!config.dynamic_decay.enabled);
        assert!(config.storage.snapshot_path.ends_with("graph.json"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
backend = "sqlite"
db_path = "/tmp/test-graph.db"

[graph]
native_threshold = 50

[decay]
base_decay_rate = 0.002
"#;
        let config: MnemaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.backend, "sqlite");
        assert_eq!(config.storage.db_path, "/tmp/test-graph.db");
        assert_eq!(config.graph.native_threshold, 50);
        assert!((config.decay.base_decay_rate - 0.002).abs() < 1e-12);
        // defaults still apply for unset fields
        assert!((config.decay.min_retention - 0.3).abs() < 1e-12);
        assert_eq!(config.query.max_entities, 5);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = MnemaConfig::default();
        std::env::set_var("MNEMA_SNAPSHOT", "/tmp/override.json");
        std::env::set_var("MNEMA_BACKEND", "sqlite");
        std::env::set_var("MNEMA_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.snapshot_path, "/tmp/override.json");
        assert_eq!(config.storage.backend, "sqlite");
        assert_eq!(config.server.log_level, "trace");

        // Clean up
        std::env::remove_var("MNEMA_SNAPSHOT");
        std::env::remove_var("MNEMA_BACKEND");
        std::env::remove_var("MNEMA_LOG_LEVEL");
    }
}

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, UltError};
use crate::memory::types::StorageTier;

/// Main configuration structure for ultmem
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Storage configuration (L0/L1/L2 tiers)
    #[serde(default)]
    pub storage: StorageConfig,
    /// Retrieval, ranking and graph configuration
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    /// Namespace layout configuration
    #[serde(default)]
    pub namespace: NamespaceConfig,
}

impl Config {
    /// Build a default configuration rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.storage.data_dir = data_dir.into();
        config
    }

    /// Load configuration from an explicit path, or from the first default
    /// location that exists, or fall back to defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        let default_paths = [
            dirs::home_dir().map(|h| h.join(".ultmem").join("config.toml")),
            dirs::config_dir().map(|c| c.join("ultmem").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            UltError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| UltError::Config(format!("Failed to parse config: {e}")))
    }
}

/// Storage tier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory holding the `L1/` and `L2/` subdirectories
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Maximum number of items kept in the in-memory L0 tier
    #[serde(default = "default_l0_max_size")]
    pub l0_max_size: usize,
    /// Maximum number of items kept in the per-file L1 tier
    #[serde(default = "default_l1_max_size")]
    pub l1_max_size: usize,
    /// Promote frequently read items to faster tiers
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,
    /// An L1 item moves to L0 once its access count exceeds this
    #[serde(default = "default_promote_l1_after")]
    pub promote_l1_after: u32,
    /// An L2 item moves to L1 once its access count exceeds this
    #[serde(default = "default_promote_l2_after")]
    pub promote_l2_after: u32,
    /// Tier new memories are written to
    #[serde(default = "default_tier")]
    pub default_tier: StorageTier,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            l0_max_size: default_l0_max_size(),
            l1_max_size: default_l1_max_size(),
            auto_migrate: default_auto_migrate(),
            promote_l1_after: default_promote_l1_after(),
            promote_l2_after: default_promote_l2_after(),
            default_tier: default_tier(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".ultmem"))
        .unwrap_or_else(|| PathBuf::from(".ultmem"))
}

fn default_l0_max_size() -> usize {
    100
}

fn default_l1_max_size() -> usize {
    1000
}

fn default_auto_migrate() -> bool {
    true
}

fn default_promote_l1_after() -> u32 {
    5
}

fn default_promote_l2_after() -> u32 {
    3
}

fn default_tier() -> StorageTier {
    StorageTier::L0
}

/// Retrieval and knowledge graph configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeConfig {
    /// Minimum cosine similarity for a vector hit
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Default number of results returned by a retrieval
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Rerank multiplier applied to phi: `1 + phi * phi_weight`
    #[serde(default = "default_phi_weight")]
    pub phi_weight: f32,
    /// Rerank multiplier for hits found by more than one method
    #[serde(default = "default_multi_method_bonus")]
    pub multi_method_bonus: f32,
    /// Weight of `keyword_match` edges
    #[serde(default = "default_keyword_edge_weight")]
    pub keyword_edge_weight: f32,
    /// Number of top TF keywords used to link a new node to older ones
    #[serde(default = "default_graph_keywords")]
    pub graph_keywords: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
            phi_weight: default_phi_weight(),
            multi_method_bonus: default_multi_method_bonus(),
            keyword_edge_weight: default_keyword_edge_weight(),
            graph_keywords: default_graph_keywords(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.5
}

fn default_top_k() -> usize {
    10
}

fn default_phi_weight() -> f32 {
    0.2
}

fn default_multi_method_bonus() -> f32 {
    1.1
}

fn default_keyword_edge_weight() -> f32 {
    0.5
}

fn default_graph_keywords() -> usize {
    5
}

/// Namespace configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceConfig {
    /// Create the `memories/`, `skills/` and `resources/` directories on startup
    #[serde(default = "default_create_layout")]
    pub create_default_layout: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            create_default_layout: default_create_layout(),
        }
    }
}

fn default_create_layout() -> bool {
    true
}

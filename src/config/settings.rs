//! Configuration settings for Svar.

use crate::chunking::{ChunkUnit, ChunkingConfig};
use crate::error::{Result, SvarError};
use crate::generation::RetryPolicy;
use crate::rag::RetrievalConfig;
use crate::vector_store::SimilarityMetric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub vector_store: VectorStoreSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.svar".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            timeout_secs: 60,
        }
    }
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Transcript chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk length, in `unit`s.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in `unit`s.
    pub overlap: usize,
    /// Unit chunk sizes are measured in (chars, tokens).
    pub unit: String,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 50,
            unit: "chars".to_string(),
        }
    }
}

impl ChunkingSettings {
    pub fn unit(&self) -> Result<ChunkUnit> {
        self.unit.parse().map_err(SvarError::Config)
    }

    /// Validated chunking parameters.
    pub fn to_config(&self) -> Result<ChunkingConfig> {
        Ok(ChunkingConfig::new(self.chunk_size, self.overlap)?.with_unit(self.unit()?))
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Similarity metric (cosine, inner_product).
    pub metric: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.svar/vectors.db".to_string(),
            metric: "cosine".to_string(),
        }
    }
}

impl VectorStoreSettings {
    pub fn metric(&self) -> Result<SimilarityMetric> {
        self.metric.parse().map_err(SvarError::Config)
    }
}

/// Retrieval (MMR) and context assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of chunks to select.
    pub k: usize,
    /// Number of candidates fetched before diversification.
    pub pool_size: usize,
    /// Relevance/diversity trade-off: 1.0 is pure relevance, 0.0 pure diversity.
    pub lambda: f32,
    /// Maximum context length in characters.
    pub max_context_length: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        let defaults = RetrievalConfig::default();
        Self {
            k: defaults.k,
            pool_size: defaults.pool_size,
            lambda: defaults.lambda,
            max_context_length: defaults.max_context_length,
        }
    }
}

impl RetrievalSettings {
    pub fn to_config(&self) -> Result<RetrievalConfig> {
        RetrievalConfig::new(self.k, self.pool_size, self.lambda, self.max_context_length)
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Generation provider (openai).
    pub provider: String,
    /// LLM model for answer generation.
    pub model: String,
    pub temperature: f32,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Initial backoff between retries in milliseconds; doubles per retry.
    pub retry_backoff_ms: u64,
    /// Conversation turns kept per chat session.
    pub history_turns: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            timeout_secs: 60,
            max_retries: 3,
            retry_backoff_ms: 500,
            history_turns: 10,
        }
    }
}

impl GenerationSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
            attempt_timeout: Duration::from_secs(self.timeout_secs),
            ..RetryPolicy::default()
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Check every section that has constraints, without touching the network or disk.
    pub fn validate(&self) -> Result<()> {
        self.chunking.to_config()?;
        self.retrieval.to_config()?;
        self.vector_store.metric()?;
        if self.embedding.dimensions == 0 {
            return Err(SvarError::Config("embedding.dimensions must be positive".to_string()));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| SvarError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("svar")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::embedding::gemini;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ProjmemConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// `sqlite` (durable) or `memory` (process lifetime only).
    pub backend: String,
    pub db_path: String,
    pub collection: String,
    pub default_project: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `local`, `gemini`, or `hashed`.
    pub provider: String,
    /// Model name; when unset each provider uses its own default.
    pub model: Option<String>,
    pub cache_dir: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Engine defaults used by the CLI.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub recall_limit: usize,
    pub min_relevance_score: f64,
    pub history_count: usize,
}

/// Defaults applied by the MCP tools.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    pub recall_limit: usize,
    pub min_relevance_score: f64,
    pub history_count: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 7411,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_projmem_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self {
            backend: "sqlite".into(),
            db_path,
            collection: "project_memories".into(),
            default_project: "default-project".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_projmem_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: None,
            cache_dir,
            api_key: None,
            base_url: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            recall_limit: crate::memory::DEFAULT_RECALL_LIMIT,
            min_relevance_score: crate::memory::DEFAULT_MIN_RELEVANCE_SCORE,
            history_count: crate::memory::DEFAULT_HISTORY_COUNT,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            recall_limit: 3,
            min_relevance_score: 0.75,
            history_count: 5,
        }
    }
}

impl EmbeddingConfig {
    /// The configured model, or the provider's default.
    pub fn model_name(&self) -> &str {
        if let Some(model) = self.model.as_deref().filter(|m| !m.is_empty()) {
            return model;
        }
        match self.provider.as_str() {
            "gemini" => gemini::DEFAULT_MODEL,
            "hashed" => crate::embedding::hashed::HASHED_MODEL_ID,
            _ => "all-mpnet-base-v2",
        }
    }
}

/// Returns `~/.projmem/`, or `./.projmem` when no home directory is known.
pub fn default_projmem_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".projmem")
}

/// Returns the default config file path: `~/.projmem/config.toml`
pub fn default_config_path() -> PathBuf {
    default_projmem_dir().join("config.toml")
}

impl ProjmemConfig {
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
            ProjmemConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PROJMEM_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("PROJMEM_BACKEND") {
            self.storage.backend = val;
        }
        if let Ok(val) = std::env::var("PROJMEM_PROJECT") {
            self.storage.default_project = val;
        }
        if let Ok(val) = std::env::var("PROJMEM_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("GEMINI_API_KEY") {
            self.embedding.api_key = Some(val);
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

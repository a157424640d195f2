//! Configuration settings for Spør.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub semantic_index: SemanticIndexSettings,
    pub embedding: EmbeddingSettings,
    pub completion: CompletionSettings,
    pub retrieval: RetrievalSettings,
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
            data_dir: "~/.spor".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Video catalog and progress storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Path to the SQLite database holding videos and student progress.
    pub database_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: "~/.spor/spor.db".to_string(),
        }
    }
}

/// Semantic index backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SemanticIndexProvider {
    /// Local SQLite file with embeddings computed by the configured embedder.
    #[default]
    Sqlite,
    /// Remote Chroma server.
    Chroma,
    /// Process-local, lost on restart.
    Memory,
}

impl std::str::FromStr for SemanticIndexProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(SemanticIndexProvider::Sqlite),
            "chroma" | "chromadb" => Ok(SemanticIndexProvider::Chroma),
            "memory" => Ok(SemanticIndexProvider::Memory),
            _ => Err(format!("Unknown semantic index provider: {}", s)),
        }
    }
}

impl std::fmt::Display for SemanticIndexProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticIndexProvider::Sqlite => write!(f, "sqlite"),
            SemanticIndexProvider::Chroma => write!(f, "chroma"),
            SemanticIndexProvider::Memory => write!(f, "memory"),
        }
    }
}

/// Semantic index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticIndexSettings {
    /// Backend (sqlite, chroma, memory).
    pub provider: SemanticIndexProvider,
    /// Path to the SQLite vector database (sqlite provider).
    pub sqlite_path: String,
    /// Chroma server URL (chroma provider). `CHROMA_URL` takes precedence.
    pub chroma_url: String,
    /// Reachability probe timeout in milliseconds.
    pub probe_timeout_ms: u64,
    /// Nearest-neighbour query timeout in milliseconds.
    pub query_timeout_ms: u64,
}

impl Default for SemanticIndexSettings {
    fn default() -> Self {
        Self {
            provider: SemanticIndexProvider::Sqlite,
            sqlite_path: "~/.spor/vectors.db".to_string(),
            chroma_url: "http://localhost:8000".to_string(),
            probe_timeout_ms: 3_000,
            query_timeout_ms: 10_000,
        }
    }
}

impl SemanticIndexSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Chroma URL, preferring the `CHROMA_URL` environment variable.
    pub fn resolved_chroma_url(&self) -> String {
        std::env::var("CHROMA_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.chroma_url.clone())
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Text-completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// Chat model used to answer questions.
    pub model: String,
    /// OpenAI-compatible API base (e.g. "https://api.groq.com/openai/v1").
    pub api_base: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum generated tokens.
    pub max_tokens: u32,
    /// Timeout for a single completion call, in seconds.
    pub timeout_seconds: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            api_key_env: crate::openai::DEFAULT_API_KEY_ENV.to_string(),
            temperature: 0.5,
            max_tokens: 1024,
            timeout_seconds: 30,
        }
    }
}

impl CompletionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Context retrieval heuristics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Assumed speaking rate used to map playback time to a word offset.
    pub words_per_second: f64,
    /// Words included before the estimated position.
    pub words_before: usize,
    /// Total words in a proximity window.
    pub window_words: usize,
    /// Semantic matches are used only when their distance is strictly below this.
    pub relevance_threshold: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            words_per_second: 2.5,
            words_before: 100,
            window_words: 200,
            relevance_threshold: 1.5,
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
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
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

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SporError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spor")
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

    /// Get the expanded catalog database path.
    pub fn database_path(&self) -> PathBuf {
        Self::expand_path(&self.storage.database_path)
    }

    /// Get the expanded SQLite vector database path.
    pub fn vector_db_path(&self) -> PathBuf {
        Self::expand_path(&self.semantic_index.sqlite_path)
    }
}

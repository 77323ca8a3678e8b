//! Configuration management for paperrag
//!
//! A single [`Config`] is loaded once (TOML file, then environment overrides,
//! then validation) and handed by reference to every component constructor.

use crate::error::{PaperRagError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub source: SourceConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub vector_store: VectorStoreConfig,
    pub indexing: IndexingConfig,
    pub query: QueryConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Local storage root for downloaded PDFs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_path: PathBuf,
}

/// Remote paper repository (arXiv) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub search_url: String,
    pub pdf_base_url: String,
    pub page_size: usize,
    pub timeout_secs: u64,
    /// Parallel downloads
    pub concurrency: usize,
}

/// Chunk window sizes, in whitespace-delimited tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub window_size: usize,
    pub overlap: usize,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String, // "fastembed" or "ollama"
    pub model: String,
    /// Base URL, only used by the "ollama" provider
    pub url: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub name: String,
    pub url: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub backend: String, // "qdrant" or "memory"
    pub url: String,
    pub collection_name: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Embedding batches in flight at once
    pub concurrency: usize,
}

/// Query defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub top_k: usize,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl VectorStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// API key read from the configured environment variable, if set and non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PaperRagError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| PaperRagError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| PaperRagError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: PAPERRAG_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        self.apply_overrides(vars);
    }

    fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("PAPERRAG_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_PATH" => self.storage.data_path = PathBuf::from(value),
            "EMBEDDING__PROVIDER" => self.embedding.provider = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__URL" => self.embedding.url = value.to_string(),
            "LLM__NAME" => self.llm.name = value.to_string(),
            "LLM__URL" => self.llm.url = value.to_string(),
            "VECTOR_STORE__BACKEND" => self.vector_store.backend = value.to_string(),
            "VECTOR_STORE__URL" => self.vector_store.url = value.to_string(),
            "VECTOR_STORE__COLLECTION_NAME" => {
                self.vector_store.collection_name = value.to_string()
            }
            "QUERY__TOP_K" => {
                self.query.top_k = value.parse().map_err(|_| PaperRagError::InvalidConfigValue {
                    path: path.to_string(),
                    message: format!("Cannot parse '{}' as an integer", value),
                })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| PaperRagError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("paperrag").join("config.toml"))
    }

    /// Data directory with `~/` expanded
    pub fn data_path(&self) -> Result<PathBuf> {
        expand_path(&self.storage.data_path)
    }
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| PaperRagError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| PaperRagError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
            },
            storage: StorageConfig {
                data_path: PathBuf::from("~/.paperrag/papers"),
            },
            source: SourceConfig {
                search_url: "http://export.arxiv.org/api/query".to_string(),
                pdf_base_url: "https://arxiv.org/pdf".to_string(),
                page_size: 100,
                timeout_secs: 30,
                concurrency: 4,
            },
            chunking: ChunkingConfig {
                window_size: 200,
                overlap: 40,
            },
            embedding: EmbeddingConfig {
                provider: "fastembed".to_string(),
                model: "all-MiniLM-L6-v2".to_string(),
                url: "http://localhost:11434".to_string(),
                batch_size: 32,
                timeout_secs: 60,
            },
            llm: LlmConfig {
                name: "llama3".to_string(),
                url: "http://localhost:11434".to_string(),
                temperature: 0.1,
                timeout_secs: 120,
            },
            vector_store: VectorStoreConfig {
                backend: "qdrant".to_string(),
                url: "http://localhost:6333".to_string(),
                collection_name: "papers".to_string(),
                api_key_env: "QDRANT_API_KEY".to_string(),
                timeout_secs: 30,
            },
            indexing: IndexingConfig { concurrency: 4 },
            query: QueryConfig { top_k: 5 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.vector_store.collection_name = "gnn_papers".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.vector_store.collection_name, "gnn_papers");
        assert_eq!(loaded.chunking.window_size, 200);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/paperrag.toml"));
        assert!(matches!(result, Err(PaperRagError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vec![
            ("PAPERRAG_LLM__NAME".to_string(), "mistral".to_string()),
            (
                "PAPERRAG_VECTOR_STORE__COLLECTION_NAME".to_string(),
                "arxiv".to_string(),
            ),
            ("PAPERRAG_QUERY__TOP_K".to_string(), "not-a-number".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ]);

        assert_eq!(config.llm.name, "mistral");
        assert_eq!(config.vector_store.collection_name, "arxiv");
        // unparseable values are logged and skipped
        assert_eq!(config.query.top_k, 5);
    }

    #[test]
    fn test_expand_path_passthrough() {
        let path = PathBuf::from("/var/lib/papers");
        assert_eq!(expand_path(&path).unwrap(), path);
    }
}

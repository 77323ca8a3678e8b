use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{PaperRagError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_source(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_vector_store(config, &mut errors);

        if config.indexing.concurrency == 0 {
            errors.push(ValidationError::new(
                "indexing.concurrency",
                "Concurrency must be greater than 0",
            ));
        }

        if config.query.top_k == 0 {
            errors.push(ValidationError::new(
                "query.top_k",
                "top_k must be greater than 0",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PaperRagError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_path",
                "Data path cannot be empty",
            ));
        }
    }

    fn validate_source(config: &Config, errors: &mut Vec<ValidationError>) {
        Self::validate_url("source.search_url", &config.source.search_url, errors);
        Self::validate_url("source.pdf_base_url", &config.source.pdf_base_url, errors);

        if !(1..=100).contains(&config.source.page_size) {
            errors.push(ValidationError::new(
                "source.page_size",
                format!(
                    "Page size must be between 1 and 100, got {}",
                    config.source.page_size
                ),
            ));
        }

        Self::validate_timeout("source.timeout_secs", config.source.timeout_secs, errors);

        if config.source.concurrency == 0 {
            errors.push(ValidationError::new(
                "source.concurrency",
                "Concurrency must be greater than 0",
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        let chunking = &config.chunking;
        if chunking.window_size == 0 {
            errors.push(ValidationError::new(
                "chunking.window_size",
                "Window size must be greater than 0",
            ));
        }

        if chunking.overlap >= chunking.window_size {
            errors.push(ValidationError::new(
                "chunking.overlap",
                format!(
                    "Overlap ({}) must be smaller than window size ({})",
                    chunking.overlap, chunking.window_size
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let provider = &config.embedding.provider;
        if provider != "fastembed" && provider != "ollama" {
            errors.push(ValidationError::new(
                "embedding.provider",
                format!(
                    "Provider must be 'fastembed' or 'ollama', got '{}'",
                    provider
                ),
            ));
        }

        if provider == "ollama" {
            Self::validate_url("embedding.url", &config.embedding.url, errors);
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        Self::validate_timeout("embedding.timeout_secs", config.embedding.timeout_secs, errors);
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.llm.name.is_empty() {
            errors.push(ValidationError::new("llm.name", "Model name cannot be empty"));
        }

        Self::validate_url("llm.url", &config.llm.url, errors);

        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        Self::validate_timeout("llm.timeout_secs", config.llm.timeout_secs, errors);
    }

    fn validate_vector_store(config: &Config, errors: &mut Vec<ValidationError>) {
        let backend = &config.vector_store.backend;
        if backend != "qdrant" && backend != "memory" {
            errors.push(ValidationError::new(
                "vector_store.backend",
                format!("Backend must be 'qdrant' or 'memory', got '{}'", backend),
            ));
        }

        if backend == "qdrant" {
            Self::validate_url("vector_store.url", &config.vector_store.url, errors);
        }

        Self::validate_timeout(
            "vector_store.timeout_secs",
            config.vector_store.timeout_secs,
            errors,
        );

        let name = &config.vector_store.collection_name;
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            errors.push(ValidationError::new(
                "vector_store.collection_name",
                format!(
                    "Collection name must be non-empty and use only [A-Za-z0-9_-], got '{}'",
                    name
                ),
            ));
        }
    }

    fn validate_timeout(path: &str, secs: u64, errors: &mut Vec<ValidationError>) {
        if secs == 0 {
            errors.push(ValidationError::new(path, "Timeout must be greater than 0"));
        }
    }

    fn validate_url(path: &str, url: &str, errors: &mut Vec<ValidationError>) {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError::new(
                path,
                format!("Must be an http(s) URL, got '{}'", url),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_empty_data_path() {
        let mut config = Config::default();
        config.storage.data_path = PathBuf::new();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        let mut config = Config::default();
        config.chunking.overlap = config.chunking.window_size;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = Config::default();
        config.embedding.provider = "invalid".to_string();
        config.vector_store.backend = "pinecone".to_string();
        config.llm.url = "localhost:11434".to_string();
        config.embedding.timeout_secs = 0;
        config.llm.timeout_secs = 0;
        config.vector_store.timeout_secs = 0;

        match ConfigValidator::validate(&config) {
            Err(PaperRagError::ConfigValidation { errors }) => {
                let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
                assert!(paths.contains(&"embedding.provider"));
                assert!(paths.contains(&"vector_store.backend"));
                assert!(paths.contains(&"llm.url"));
                assert!(paths.contains(&"embedding.timeout_secs"));
                assert!(paths.contains(&"llm.timeout_secs"));
                assert!(paths.contains(&"vector_store.timeout_secs"));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_memory_backend_skips_url_check() {
        let mut config = Config::default();
        config.vector_store.backend = "memory".to_string();
        config.vector_store.url = String::new();
        assert!(ConfigValidator::validate(&config).is_ok());
    }
}

/// Embedding providers: local FastEmbed models and an Ollama HTTP backend
use crate::config::EmbeddingConfig;
use crate::error::PaperRagError;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding request failed: {0}")]
    Request(String),
}

impl From<EmbeddingError> for PaperRagError {
    fn from(e: EmbeddingError) -> Self {
        PaperRagError::EmbeddingFailed(e.to_string())
    }
}

/// Trait for embedding providers
///
/// `embed_batch` must return exactly one vector per input, in input order,
/// or fail as a whole.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for multiple texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Embedding dimension, if known before the first call
    fn dimension(&self) -> Option<usize>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

fn reject_blank(texts: &[String]) -> Result<(), EmbeddingError> {
    if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(EmbeddingError::InvalidInput(format!(
            "text {} of {} is empty",
            pos + 1,
            texts.len()
        )));
    }
    Ok(())
}

/// FastEmbed provider for local embedding generation
///
/// The model is loaded on the first embedding call, not at construction, so
/// commands that never embed do not pay for the download.
pub struct FastEmbedProvider {
    model: OnceCell<Arc<TextEmbedding>>,
    embedding_model: EmbeddingModel,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Supported models:
    /// - all-MiniLM-L6-v2: 90MB (384 dims)
    /// - bge-small-en-v1.5: 130MB (384 dims)
    /// - bge-base-en-v1.5: 440MB (768 dims)
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension) = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                    model_name
                )));
            }
        };

        Ok(Self {
            model: OnceCell::new(),
            embedding_model,
            model_name: model_name.to_string(),
            dimension,
        })
    }

    /// Create provider with default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2")
    }

    async fn model(&self) -> Result<Arc<TextEmbedding>, EmbeddingError> {
        self.model
            .get_or_try_init(|| async {
                tracing::info!(
                    "Initializing embedding model: {} ({}D, downloaded if not cached)",
                    self.model_name,
                    self.dimension
                );
                let options =
                    InitOptions::new(self.embedding_model.clone()).with_show_download_progress(true);
                let model = tokio::task::spawn_blocking(move || TextEmbedding::try_new(options))
                    .await
                    .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?
                    .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;
                Ok::<_, EmbeddingError>(Arc::new(model))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        reject_blank(texts)?;

        let model = self.model().await?;
        let inputs = texts.to_vec();
        let embeddings = tokio::task::spawn_blocking(move || model.embed(inputs, None))
            .await
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::GenerationError(format!(
                "Embedding count mismatch: expected {}, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Embeddings served by a local Ollama instance (`/api/embed`)
pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/embed", config.url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        reject_blank(texts)?;

        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Request(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::GenerationError(format!("malformed response: {}", e)))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(EmbeddingError::GenerationError(format!(
                "Embedding count mismatch: expected {}, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        if parsed.embeddings.iter().any(|e| e.is_empty()) {
            return Err(EmbeddingError::GenerationError(
                "Ollama returned an empty vector".to_string(),
            ));
        }

        Ok(parsed.embeddings)
    }

    fn dimension(&self) -> Option<usize> {
        None
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Embedding & Indexing
///
/// - EmbeddingProvider trait for abstraction over backends
/// - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
/// - OllamaEmbedder for models served over HTTP
/// - Indexer for batched embed-and-upsert
mod indexer;
mod provider;

pub use indexer::{ChunkFailure, Indexer, IngestReport};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider, OllamaEmbedder};

use crate::config::EmbeddingConfig;
use crate::error::{PaperRagError, Result};
use std::sync::Arc;

/// Build the configured embedding backend
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "fastembed" => Ok(Arc::new(FastEmbedProvider::new(&config.model)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        other => Err(PaperRagError::Config(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

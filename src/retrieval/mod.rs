//! Query Engine
//!
//! Embeds a question with the same provider used at ingest time, pulls the
//! nearest chunks and hands them to the language backend. When generation
//! fails the retrieved chunks still travel back to the caller inside
//! [`PaperRagError::GenerationUnavailable`].

use crate::embedding::EmbeddingProvider;
use crate::error::{PaperRagError, Result};
use crate::generation::GenerationProvider;
use crate::vector_store::{SearchHit, VectorStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A retrieved chunk as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitedChunk {
    pub source_identifier: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

impl From<SearchHit> for CitedChunk {
    fn from(hit: SearchHit) -> Self {
        Self {
            source_identifier: hit.key.source_identifier,
            chunk_index: hit.key.chunk_index,
            text: hit.payload.text,
            score: hit.score,
        }
    }
}

/// Generated answer with the chunks it was grounded on, best first
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub cited_chunks: Vec<CitedChunk>,
}

pub struct QueryEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn GenerationProvider>,
    embed_timeout: Duration,
    generate_timeout: Duration,
}

impl QueryEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn GenerationProvider>,
        embed_timeout: Duration,
        generate_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            embed_timeout,
            generate_timeout,
        }
    }

    /// Nearest chunks for `question`, without generation
    pub async fn retrieve(
        &self,
        question: &str,
        collection: &str,
        top_k: usize,
    ) -> Result<Vec<CitedChunk>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PaperRagError::InvalidQuery(
                "question must not be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(PaperRagError::InvalidQuery(
                "top_k must be at least 1".to_string(),
            ));
        }

        if self.store.count(collection).await? == 0 {
            return Err(PaperRagError::EmptyCollection(collection.to_string()));
        }

        let vector = tokio::time::timeout(self.embed_timeout, self.embedder.embed(question))
            .await
            .map_err(|_| {
                PaperRagError::EmbeddingFailed(format!(
                    "question embedding timed out after {:?}",
                    self.embed_timeout
                ))
            })??;

        let hits = self.store.search(collection, &vector, top_k).await?;
        if hits.is_empty() {
            return Err(PaperRagError::EmptyCollection(collection.to_string()));
        }

        debug!("Retrieved {} chunks from '{}'", hits.len(), collection);
        Ok(hits.into_iter().map(CitedChunk::from).collect())
    }

    /// Answer `question` from the `top_k` nearest chunks of `collection`
    pub async fn query(&self, question: &str, collection: &str, top_k: usize) -> Result<Answer> {
        let cited_chunks = self.retrieve(question, collection, top_k).await?;
        let context: Vec<String> = cited_chunks.iter().map(|c| c.text.clone()).collect();

        info!(
            "Generating answer with {} from {} chunks",
            self.generator.model_name(),
            context.len()
        );

        let generated = tokio::time::timeout(
            self.generate_timeout,
            self.generator.generate(question.trim(), &context),
        )
        .await;

        let reason = match generated {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                return Ok(Answer { text, cited_chunks });
            }
            Ok(Ok(_)) => "generation returned no text".to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("generation timed out after {:?}", self.generate_timeout),
        };

        warn!("Generation failed: {}", reason);
        Err(PaperRagError::GenerationUnavailable {
            reason,
            retrieved: cited_chunks,
        })
    }
}

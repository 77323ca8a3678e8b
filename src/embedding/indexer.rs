/// Embeds chunks in batches and writes them to a vector store
use super::{EmbeddingError, EmbeddingProvider};
use crate::cancel::Cancellation;
use crate::chunking::Chunk;
use crate::vector_store::{ChunkKey, ChunkPayload, IndexedPoint, VectorStore};
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A chunk that did not make it into the store
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    pub key: ChunkKey,
    pub reason: String,
}

/// Outcome of one ingest call
#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    /// Chunks whose batch was started
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<ChunkFailure>,
    /// Chunks never attempted because of cancellation
    pub skipped: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

#[derive(Default)]
struct BatchOutcome {
    attempted: usize,
    succeeded: usize,
    failures: Vec<ChunkFailure>,
    skipped: usize,
}

/// Indexer
///
/// Processes chunks in groups of `batch_size`, at most `max_concurrent`
/// groups in flight. A group whose batch embedding fails is retried chunk
/// by chunk so one bad chunk only costs itself.
pub struct Indexer {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
    max_concurrent: usize,
    timeout: Duration,
}

impl Indexer {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        batch_size: usize,
        max_concurrent: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            batch_size: batch_size.max(1),
            max_concurrent: max_concurrent.max(1),
            timeout,
        }
    }

    /// Embed and upsert `chunks` into `collection`.
    ///
    /// Never fails as a whole; per-chunk problems are collected in the report.
    pub async fn ingest(
        &self,
        chunks: Vec<Chunk>,
        collection: &str,
        cancel: &Cancellation,
    ) -> IngestReport {
        let start = Instant::now();
        let total = chunks.len();
        info!(
            "Indexing {} chunks into '{}' with {}",
            total,
            collection,
            self.provider.model_name()
        );

        let batches: Vec<Vec<Chunk>> = chunks
            .chunks(self.batch_size)
            .map(|batch| batch.to_vec())
            .collect();

        let outcomes: Vec<BatchOutcome> = stream::iter(batches)
            .map(|batch| self.process_batch(batch, collection, cancel))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut report = IngestReport::default();
        for outcome in outcomes {
            report.attempted += outcome.attempted;
            report.succeeded += outcome.succeeded;
            report.failed += outcome.failures.len();
            report.failures.extend(outcome.failures);
            report.skipped += outcome.skipped;
        }
        report.failures.sort_by(|a, b| a.key.cmp(&b.key));
        report.cancelled = cancel.is_cancelled() && report.skipped > 0;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Indexing complete: {} succeeded, {} failed, {} skipped, {}ms",
            report.succeeded, report.failed, report.skipped, report.duration_ms
        );
        report
    }

    async fn process_batch(
        &self,
        batch: Vec<Chunk>,
        collection: &str,
        cancel: &Cancellation,
    ) -> BatchOutcome {
        if cancel.is_cancelled() {
            return BatchOutcome {
                skipped: batch.len(),
                ..Default::default()
            };
        }

        let mut outcome = BatchOutcome {
            attempted: batch.len(),
            ..Default::default()
        };

        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded: Vec<(Chunk, Vec<f32>)> = match self.embed_batch(&texts).await {
            Ok(vectors) => batch.into_iter().zip(vectors).collect(),
            Err(e) => {
                warn!(
                    "Batch of {} chunks failed ({}), retrying individually",
                    texts.len(),
                    e
                );
                let mut embedded = Vec::with_capacity(batch.len());
                for chunk in batch {
                    match self.embed_one(&chunk.text).await {
                        Ok(vector) => embedded.push((chunk, vector)),
                        Err(e) => outcome.failures.push(ChunkFailure {
                            key: ChunkKey::from(&chunk),
                            reason: e.to_string(),
                        }),
                    }
                }
                embedded
            }
        };

        if embedded.is_empty() {
            return outcome;
        }

        let keys: Vec<ChunkKey> = embedded.iter().map(|(c, _)| ChunkKey::from(c)).collect();
        let points: Vec<IndexedPoint> = embedded
            .into_iter()
            .map(|(chunk, vector)| IndexedPoint {
                key: ChunkKey::from(&chunk),
                payload: ChunkPayload::from(&chunk),
                vector,
            })
            .collect();

        match self.store.upsert(collection, points).await {
            Ok(()) => {
                debug!("Upserted {} chunks", keys.len());
                outcome.succeeded += keys.len();
            }
            Err(e) => {
                warn!("Upsert of {} chunks failed: {}", keys.len(), e);
                let reason = e.to_string();
                outcome
                    .failures
                    .extend(keys.into_iter().map(|key| ChunkFailure {
                        key,
                        reason: reason.clone(),
                    }));
            }
        }

        outcome
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let vectors = tokio::time::timeout(self.timeout, self.provider.embed_batch(texts))
            .await
            .map_err(|_| {
                EmbeddingError::Request(format!("timed out after {:?}", self.timeout))
            })??;

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::GenerationError(format!(
                "Embedding count mismatch: expected {}, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        tokio::time::timeout(self.timeout, self.provider.embed(text))
            .await
            .map_err(|_| EmbeddingError::Request(format!("timed out after {:?}", self.timeout)))?
    }
}

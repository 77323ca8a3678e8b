//! Vector store boundary
//!
//! Collections are addressed purely by name and created lazily on the first
//! upsert. Every write is keyed by [`ChunkKey`], so re-ingesting a chunk
//! overwrites its point instead of adding a second one.

mod memory;
mod qdrant;

pub use memory::MemoryVectorStore;
pub use qdrant::QdrantStore;

use crate::chunking::Chunk;
use crate::config::VectorStoreConfig;
use crate::error::{PaperRagError, Result};
use crate::storage::PdfStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a chunk across ingestion runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub source_identifier: String,
    pub chunk_index: usize,
}

impl ChunkKey {
    pub fn new(source_identifier: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            source_identifier: source_identifier.into(),
            chunk_index,
        }
    }

    /// Point id derived from the key alone, identical for every writer
    pub fn point_id(&self) -> Uuid {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.source_identifier.as_bytes());
        hasher.update(b"#");
        hasher.update(self.chunk_index.to_string().as_bytes());
        let hash = hasher.finalize();

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        Uuid::from_bytes(bytes)
    }
}

impl From<&Chunk> for ChunkKey {
    fn from(chunk: &Chunk) -> Self {
        Self::new(chunk.source_identifier.clone(), chunk.chunk_index)
    }
}

/// Payload stored next to each vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub source_identifier: String,
    pub chunk_index: usize,
    pub text: String,
    pub span_start: usize,
    pub span_end: usize,
    /// File name of the source PDF under the data directory
    pub source_file: String,
}

impl ChunkPayload {
    pub fn key(&self) -> ChunkKey {
        ChunkKey::new(self.source_identifier.clone(), self.chunk_index)
    }
}

impl From<&Chunk> for ChunkPayload {
    fn from(chunk: &Chunk) -> Self {
        Self {
            source_identifier: chunk.source_identifier.clone(),
            chunk_index: chunk.chunk_index,
            text: chunk.text.clone(),
            span_start: chunk.span.start,
            span_end: chunk.span.end,
            source_file: PdfStore::file_name_for(&chunk.source_identifier),
        }
    }
}

/// A vector ready to be written
#[derive(Debug, Clone)]
pub struct IndexedPoint {
    pub key: ChunkKey,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// Nearest-neighbour search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub key: ChunkKey,
    pub payload: ChunkPayload,
    /// Cosine similarity, higher is closer
    pub score: f32,
}

/// Abstract trait for vector storage backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite points by key. Each point is written whole or not at all.
    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()>;

    /// Top `top_k` points by similarity, best first. A missing collection yields no hits.
    async fn search(&self, collection: &str, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>>;

    /// Number of points; 0 for a missing collection
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Remove points of `source_identifier` with `chunk_index >= keep_below`
    async fn delete_stale(
        &self,
        collection: &str,
        source_identifier: &str,
        keep_below: usize,
    ) -> Result<()>;

    fn name(&self) -> &str;
}

/// Build the configured backend
pub fn store_from_config(config: &VectorStoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend.as_str() {
        "qdrant" => Ok(Arc::new(QdrantStore::new(config)?)),
        "memory" => Ok(Arc::new(MemoryVectorStore::new())),
        other => Err(PaperRagError::Config(format!(
            "Unknown vector store backend: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_stable_and_distinct() {
        let a = ChunkKey::new("2101.00001v1", 0);
        assert_eq!(a.point_id(), ChunkKey::new("2101.00001v1", 0).point_id());
        assert_ne!(a.point_id(), ChunkKey::new("2101.00001v1", 1).point_id());
        // "x#1" + "1" vs "x#11" must not collide through concatenation
        assert_ne!(
            ChunkKey::new("x", 11).point_id(),
            ChunkKey::new("x#1", 1).point_id()
        );
    }

    #[test]
    fn test_payload_from_chunk() {
        let chunk = Chunk {
            source_identifier: "hep-th/9901001v1".to_string(),
            chunk_index: 3,
            text: "strings".to_string(),
            span: 10..17,
        };
        let payload = ChunkPayload::from(&chunk);
        assert_eq!(payload.source_file, "hep-th_9901001v1.pdf");
        assert_eq!(payload.key(), ChunkKey::from(&chunk));
        assert_eq!((payload.span_start, payload.span_end), (10, 17));
    }
}

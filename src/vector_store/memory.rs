/// In-process vector store with exact cosine search
use super::{ChunkKey, ChunkPayload, IndexedPoint, SearchHit, VectorStore};
use crate::error::{PaperRagError, Result};
use ahash::AHashMap;
use async_trait::async_trait;
use tokio::sync::RwLock;

struct Collection {
    dimension: usize,
    points: AHashMap<ChunkKey, (Vec<f32>, ChunkPayload)>,
}

/// Brute-force store used for tests and single-process runs
///
/// Nothing is persisted; every collection lives as long as the store.
#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<AHashMap<String, Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()> {
        let Some(first) = points.first() else {
            return Ok(());
        };

        let mut collections = self.collections.write().await;
        let dimension = collections
            .get(collection)
            .map(|c| c.dimension)
            .unwrap_or(first.vector.len());

        // Reject the whole batch before touching anything
        if dimension == 0 {
            return Err(PaperRagError::VectorStore(
                "cannot store empty vectors".to_string(),
            ));
        }
        if let Some(bad) = points.iter().find(|p| p.vector.len() != dimension) {
            return Err(PaperRagError::VectorStore(format!(
                "Invalid dimension for {}#{}: expected {}, got {}",
                bad.key.source_identifier,
                bad.key.chunk_index,
                dimension,
                bad.vector.len()
            )));
        }

        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection {
                dimension,
                points: AHashMap::new(),
            });
        for point in points {
            entry.points.insert(point.key, (point.vector, point.payload));
        }

        Ok(())
    }

    async fn search(&self, collection: &str, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let Some(entry) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        if vector.len() != entry.dimension {
            return Err(PaperRagError::VectorStore(format!(
                "Invalid dimension: expected {}, got {}",
                entry.dimension,
                vector.len()
            )));
        }

        let mut hits: Vec<SearchHit> = entry
            .points
            .iter()
            .map(|(key, (stored, payload))| SearchHit {
                key: key.clone(),
                payload: payload.clone(),
                score: cosine_similarity(vector, stored),
            })
            .collect();

        // Ties fall back to key order so results are reproducible
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.key.cmp(&b.key))
        });
        hits.truncate(top_k);

        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0))
    }

    async fn delete_stale(
        &self,
        collection: &str,
        source_identifier: &str,
        keep_below: usize,
    ) -> Result<()> {
        if let Some(entry) = self.collections.write().await.get_mut(collection) {
            entry.points.retain(|key, _| {
                key.source_identifier != source_identifier || key.chunk_index < keep_below
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

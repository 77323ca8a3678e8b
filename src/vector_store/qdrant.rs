//! Qdrant REST backend

use super::{ChunkPayload, IndexedPoint, SearchHit, VectorStore};
use crate::config::VectorStoreConfig;
use crate::error::{PaperRagError, Result};
use ahash::AHashSet;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const MAX_ATTEMPTS: usize = 3;

/// Qdrant collection client over HTTP
pub struct QdrantStore {
    client: Client,
    base_url: String,
    /// Collections known to exist, so creation is checked once per process
    known: Mutex<AHashSet<String>>,
}

impl QdrantStore {
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key() {
            let value = HeaderValue::from_str(key.trim()).map_err(|e| {
                PaperRagError::Config(format!("invalid Qdrant API key: {}", e))
            })?;
            headers.insert("api-key", value);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| PaperRagError::Config(format!("failed to build Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            known: Mutex::new(AHashSet::new()),
        })
    }

    fn collection_url(&self, collection: &str, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, collection, suffix)
    }

    /// Send with retries on connection errors, 429 and 5xx
    async fn send(&self, build: impl Fn() -> RequestBuilder, context: &str) -> Result<Response> {
        let mut attempt = 0usize;
        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if should_retry(status) && attempt + 1 < MAX_ATTEMPTS {
                        attempt += 1;
                        warn!("{} returned {}, retrying ({})", context, status, attempt);
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(err) => {
                    if (err.is_connect() || err.is_timeout()) && attempt + 1 < MAX_ATTEMPTS {
                        attempt += 1;
                        warn!("{} failed: {}, retrying ({})", context, err, attempt);
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(PaperRagError::VectorStore(format!("{}: {}", context, err)));
                }
            }
        }
    }

    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let mut known = self.known.lock().await;
        if known.contains(collection) {
            return Ok(());
        }

        let url = self.collection_url(collection, "");
        let response = self
            .send(|| self.client.get(&url), "Qdrant collection lookup")
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                info!(
                    "Creating Qdrant collection '{}' (dimension {})",
                    collection, dimension
                );
                let body = json!({ "vectors": { "size": dimension, "distance": "Cosine" } });
                let response = self
                    .send(|| self.client.put(&url).json(&body), "Qdrant collection create")
                    .await?;
                // Another writer may have created it in between
                if response.status() != StatusCode::CONFLICT {
                    expect_success(response, "Qdrant collection create").await?;
                }
            }
            _ => {
                expect_success(response, "Qdrant collection lookup").await?;
            }
        }

        known.insert(collection.to_string());
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()> {
        let Some(first) = points.first() else {
            return Ok(());
        };
        self.ensure_collection(collection, first.vector.len()).await?;

        let body = UpsertRequest {
            points: points
                .iter()
                .map(|p| PointStruct {
                    id: p.key.point_id().to_string(),
                    vector: &p.vector,
                    payload: &p.payload,
                })
                .collect(),
        };

        let url = self.collection_url(collection, "/points?wait=true");
        let response = self
            .send(|| self.client.put(&url).json(&body), "Qdrant upsert")
            .await?;
        expect_success(response, "Qdrant upsert").await?;

        debug!("Upserted {} points into '{}'", points.len(), collection);
        Ok(())
    }

    async fn search(&self, collection: &str, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let url = self.collection_url(collection, "/points/search");
        let body = json!({ "vector": vector, "limit": top_k, "with_payload": true });
        let response = self
            .send(|| self.client.post(&url).json(&body), "Qdrant search")
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let parsed: QdrantResponse<Vec<ScoredPoint>> =
            expect_success(response, "Qdrant search").await?.json().await.map_err(|e| {
                PaperRagError::VectorStore(format!("malformed Qdrant search response: {}", e))
            })?;

        let mut hits = Vec::with_capacity(parsed.result.len());
        for point in parsed.result {
            let Some(payload) = point.payload else {
                warn!("Skipping Qdrant point without payload");
                continue;
            };
            hits.push(SearchHit {
                key: payload.key(),
                payload,
                score: point.score,
            });
        }
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let url = self.collection_url(collection, "/points/count");
        let body = json!({ "exact": true });
        let response = self
            .send(|| self.client.post(&url).json(&body), "Qdrant count")
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        let parsed: QdrantResponse<CountResult> =
            expect_success(response, "Qdrant count").await?.json().await.map_err(|e| {
                PaperRagError::VectorStore(format!("malformed Qdrant count response: {}", e))
            })?;
        Ok(parsed.result.count)
    }

    async fn delete_stale(
        &self,
        collection: &str,
        source_identifier: &str,
        keep_below: usize,
    ) -> Result<()> {
        let url = self.collection_url(collection, "/points/delete?wait=true");
        let body = json!({
            "filter": {
                "must": [
                    { "key": "source_identifier", "match": { "value": source_identifier } },
                    { "key": "chunk_index", "range": { "gte": keep_below } }
                ]
            }
        });
        let response = self
            .send(|| self.client.post(&url).json(&body), "Qdrant delete")
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        expect_success(response, "Qdrant delete").await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

async fn expect_success(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(PaperRagError::VectorStore(format!(
        "{} failed ({}): {}",
        context, status, body
    )))
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(250 * (1 << capped))
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    points: Vec<PointStruct<'a>>,
}

#[derive(Serialize)]
struct PointStruct<'a> {
    id: String,
    vector: &'a [f32],
    payload: &'a ChunkPayload,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<ChunkPayload>,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy() {
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry(StatusCode::BAD_GATEWAY));
        assert!(!should_retry(StatusCode::NOT_FOUND));
        assert!(retry_backoff(2) > retry_backoff(1));
        assert_eq!(retry_backoff(9), retry_backoff(5));
    }

    #[test]
    fn test_parse_search_response() {
        let raw = r#"{"result":[{"id":"5c56c793-69f3-4fbf-87e6-c4bf54c28c26","version":1,"score":0.87,
            "payload":{"source_identifier":"2101.00001v1","chunk_index":2,"text":"graph",
            "span_start":5,"span_end":10,"source_file":"2101.00001v1.pdf"}}],"status":"ok","time":0.001}"#;
        let parsed: QdrantResponse<Vec<ScoredPoint>> = serde_json::from_str(raw).unwrap();
        let payload = parsed.result[0].payload.clone().unwrap();
        assert_eq!(payload.chunk_index, 2);
        assert!((parsed.result[0].score - 0.87).abs() < 1e-6);
    }

    #[test]
    fn test_point_serialization_uses_uuid_ids() {
        let payload = ChunkPayload {
            source_identifier: "a".to_string(),
            chunk_index: 0,
            text: "t".to_string(),
            span_start: 0,
            span_end: 1,
            source_file: "a.pdf".to_string(),
        };
        let point = PointStruct {
            id: payload.key().point_id().to_string(),
            vector: &[0.5, 0.5],
            payload: &payload,
        };
        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["id"].as_str().unwrap().len(), 36);
        assert_eq!(value["payload"]["source_identifier"], "a");
    }
}

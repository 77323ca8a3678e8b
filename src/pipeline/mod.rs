//! End-to-end orchestration of the three user-facing flows:
//! download (locate + fetch), ingest (load + chunk + index) and ask.

pub mod signals;

pub use signals::{cancel_on_signal, SignalHandler};

use crate::cancel::Cancellation;
use crate::chunking::{self, Chunk};
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider, Indexer, IngestReport};
use crate::error::{PaperRagError, Result};
use crate::fetcher::{FetchReport, Fetcher};
use crate::generation::{self, GenerationProvider};
use crate::loader::{self, LoadFailure};
use crate::locator::{ArxivSource, Locator, PaperSource};
use crate::retrieval::{Answer, QueryEngine};
use crate::storage::PdfStore;
use crate::vector_store::{self, VectorStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of [`Pipeline::download`]
#[derive(Debug, Serialize)]
pub struct DownloadReport {
    pub located: usize,
    pub fetch: FetchReport,
}

/// Result of [`Pipeline::ingest`]
#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub documents: usize,
    /// Documents with no extractable text
    pub empty_documents: usize,
    #[serde(serialize_with = "serialize_load_failures")]
    pub unreadable: Vec<LoadFailure>,
    pub chunks: usize,
    pub index: IngestReport,
}

fn serialize_load_failures<S>(failures: &[LoadFailure], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;
    let mut seq = serializer.serialize_seq(Some(failures.len()))?;
    for failure in failures {
        seq.serialize_element(&(failure.path.display().to_string(), failure.error.to_string()))?;
    }
    seq.end()
}

/// Wires the stages together around one configuration
pub struct Pipeline {
    config: Config,
    data_path: PathBuf,
    locator: Locator,
    fetcher: Fetcher,
    indexer: Indexer,
    engine: QueryEngine,
    store: Arc<dyn VectorStore>,
}

impl Pipeline {
    /// Build a pipeline backed by arXiv and the configured model and store backends
    pub fn from_config(config: &Config) -> Result<Self> {
        let source: Arc<dyn PaperSource> = Arc::new(ArxivSource::new(&config.source)?);
        let embedder = embedding::provider_from_config(&config.embedding)?;
        let generator = generation::generator_from_config(&config.llm)?;
        let store = vector_store::store_from_config(&config.vector_store)?;
        Self::with_components(config, source, embedder, generator, store)
    }

    /// Build a pipeline from explicit components
    pub fn with_components(
        config: &Config,
        source: Arc<dyn PaperSource>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let data_path = config.data_path()?;

        let locator = Locator::new(source.clone(), config.source.page_size);
        let fetcher = Fetcher::new(source, config.source.concurrency);
        let indexer = Indexer::new(
            embedder.clone(),
            store.clone(),
            config.embedding.batch_size,
            config.indexing.concurrency,
            config.embedding.timeout(),
        );
        let engine = QueryEngine::new(
            embedder,
            store.clone(),
            generator,
            config.embedding.timeout(),
            config.llm.timeout(),
        );

        Ok(Self {
            config: config.clone(),
            data_path,
            locator,
            fetcher,
            indexer,
            engine,
            store,
        })
    }

    pub fn data_path(&self) -> &PathBuf {
        &self.data_path
    }

    fn collection(&self) -> &str {
        &self.config.vector_store.collection_name
    }

    /// Locate papers for `query` and store their PDFs in the data directory
    pub async fn download(
        &self,
        query: &str,
        max_results: usize,
        cancel: &Cancellation,
    ) -> Result<DownloadReport> {
        let records = self.locator.locate(query, max_results).await?;
        let located = records.len();

        if cancel.is_cancelled() {
            return Err(PaperRagError::Cancelled);
        }

        let fetch = self.fetcher.fetch(records, &self.data_path, cancel).await?;
        Ok(DownloadReport { located, fetch })
    }

    /// Index every stored PDF.
    ///
    /// Chunks left over from an earlier, longer version of a document are
    /// removed once the new chunks are written. The purge is skipped when the
    /// run was cancelled so a partial run never deletes live data.
    /// Leftover `.part` files are only removed once they are older than the
    /// source timeout, so a concurrent `download` keeps its in-flight files.
    pub async fn ingest(&self, cancel: &Cancellation) -> Result<IngestSummary> {
        let store = PdfStore::new(self.data_path.clone())?;
        let removed = store.remove_partials(self.config.source.timeout())?;
        if removed > 0 {
            info!("Removed {} interrupted downloads", removed);
        }

        let (documents, unreadable) =
            loader::load_dir(&self.data_path, self.config.indexing.concurrency).await?;

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut chunk_counts: Vec<(String, usize)> = Vec::with_capacity(documents.len());
        let mut empty_documents = 0;
        for doc in &documents {
            if doc.is_empty() {
                empty_documents += 1;
            }
            let doc_chunks = chunking::chunk(
                doc,
                self.config.chunking.window_size,
                self.config.chunking.overlap,
            )?;
            chunk_counts.push((doc.source_identifier.clone(), doc_chunks.len()));
            chunks.extend(doc_chunks);
        }

        let chunk_total = chunks.len();
        info!(
            "Chunked {} documents into {} chunks",
            documents.len(),
            chunk_total
        );

        let index = self.indexer.ingest(chunks, self.collection(), cancel).await;

        if cancel.is_cancelled() {
            warn!("Ingest cancelled, stale chunks left in place");
        } else {
            for (identifier, count) in &chunk_counts {
                if let Err(e) = self
                    .store
                    .delete_stale(self.collection(), identifier, *count)
                    .await
                {
                    warn!("Failed to purge stale chunks of {}: {}", identifier, e);
                }
            }
        }

        Ok(IngestSummary {
            documents: documents.len(),
            empty_documents,
            unreadable,
            chunks: chunk_total,
            index,
        })
    }

    /// Answer a question from the indexed collection
    pub async fn ask(&self, question: &str, top_k: Option<usize>) -> Result<Answer> {
        let top_k = top_k.unwrap_or(self.config.query.top_k);
        self.engine.query(question, self.collection(), top_k).await
    }
}

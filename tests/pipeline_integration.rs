// End-to-end pipeline tests with in-process fakes for every remote service
mod common;

use common::{test_config, write_pdf, FakeGenerator, FakeSource, HashEmbedder};
use paperrag::pipeline::Pipeline;
use paperrag::vector_store::{MemoryVectorStore, VectorStore};
use paperrag::{Cancellation, PaperRagError};
use std::sync::Arc;
use tempfile::TempDir;

const IDS: [&str; 5] = [
    "2101.00001v1",
    "2101.00002v1",
    "2101.00003v2",
    "hep-th/9901001v1",
    "2101.00005v1",
];

struct Harness {
    _temp: TempDir,
    pipeline: Pipeline,
    store: Arc<MemoryVectorStore>,
    data: std::path::PathBuf,
}

fn harness(generator: FakeGenerator) -> Harness {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("papers");
    let config = test_config(&data);
    let store = Arc::new(MemoryVectorStore::new());

    let pipeline = Pipeline::with_components(
        &config,
        Arc::new(FakeSource::new(&IDS)),
        Arc::new(HashEmbedder::new()),
        Arc::new(generator),
        store.clone(),
    )
    .unwrap();

    Harness {
        _temp: temp,
        pipeline,
        store,
        data,
    }
}

#[tokio::test]
async fn test_download_ingest_ask() {
    let h = harness(FakeGenerator::working());
    let cancel = Cancellation::new();

    let download = h
        .pipeline
        .download("graph neural networks", 3, &cancel)
        .await
        .unwrap();
    assert_eq!(download.located, 3);
    assert_eq!(download.fetch.downloaded, 3);

    let summary = h.pipeline.ingest(&cancel).await.unwrap();
    assert_eq!(summary.documents, 3);
    assert!(summary.unreadable.is_empty());
    assert!(summary.chunks > 3);
    assert_eq!(summary.index.failed, 0);
    assert_eq!(summary.index.succeeded, summary.chunks);
    assert_eq!(h.store.count("papers").await.unwrap(), summary.chunks);

    let answer = h
        .pipeline
        .ask("How does message passing aggregate features?", None)
        .await
        .unwrap();
    assert!(!answer.text.is_empty());
    assert_eq!(answer.cited_chunks.len(), 3);
    for chunk in &answer.cited_chunks {
        assert!(IDS[..3].contains(&chunk.source_identifier.as_str()));
    }
    assert!(answer
        .cited_chunks
        .windows(2)
        .all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_reingest_does_not_grow_collection() {
    let h = harness(FakeGenerator::working());
    let cancel = Cancellation::new();
    h.pipeline.download("graph", 3, &cancel).await.unwrap();

    let first = h.pipeline.ingest(&cancel).await.unwrap();
    let count = h.store.count("papers").await.unwrap();
    assert_eq!(count, first.chunks);

    let second = h.pipeline.ingest(&cancel).await.unwrap();
    assert_eq!(second.chunks, first.chunks);
    assert_eq!(h.store.count("papers").await.unwrap(), count);
}

#[tokio::test]
async fn test_shorter_document_purges_stale_chunks() {
    let h = harness(FakeGenerator::working());
    let cancel = Cancellation::new();
    std::fs::create_dir_all(&h.data).unwrap();
    let path = h.data.join("2201.00001v1.pdf");

    let long: Vec<String> = (0..12)
        .map(|i| format!("Sentence number {} talks about transformers and attention.", i))
        .collect();
    let long_refs: Vec<&str> = long.iter().map(|s| s.as_str()).collect();
    write_pdf(&path, &long_refs);
    let first = h.pipeline.ingest(&cancel).await.unwrap();
    assert_eq!(h.store.count("papers").await.unwrap(), first.chunks);

    write_pdf(&path, &["A much shorter revision of the paper."]);
    let second = h.pipeline.ingest(&cancel).await.unwrap();
    assert!(second.chunks < first.chunks);
    assert_eq!(h.store.count("papers").await.unwrap(), second.chunks);
}

#[tokio::test]
async fn test_cancelled_ingest_keeps_existing_chunks() {
    let h = harness(FakeGenerator::working());
    h.pipeline
        .download("graph", 2, &Cancellation::new())
        .await
        .unwrap();
    h.pipeline.ingest(&Cancellation::new()).await.unwrap();
    let count = h.store.count("papers").await.unwrap();

    let cancel = Cancellation::new();
    cancel.cancel();
    let summary = h.pipeline.ingest(&cancel).await.unwrap();

    assert!(summary.index.cancelled);
    assert_eq!(summary.index.succeeded, 0);
    assert_eq!(h.store.count("papers").await.unwrap(), count);
}

#[tokio::test]
async fn test_unreadable_pdf_skipped() {
    let h = harness(FakeGenerator::working());
    std::fs::create_dir_all(&h.data).unwrap();
    std::fs::write(h.data.join("2301.00001v1.pdf"), b"<html>rate limited</html>").unwrap();
    write_pdf(
        &h.data.join("2301.00002v1.pdf"),
        &["Readable paper about diffusion models."],
    );

    let summary = h.pipeline.ingest(&Cancellation::new()).await.unwrap();
    assert_eq!(summary.documents, 1);
    assert_eq!(summary.unreadable.len(), 1);
    assert!(matches!(
        summary.unreadable[0].error,
        PaperRagError::UnreadableDocument { .. }
    ));
    assert!(h.store.count("papers").await.unwrap() > 0);
}

#[tokio::test]
async fn test_ask_before_ingest_reports_empty_collection() {
    let h = harness(FakeGenerator::working());
    let result = h.pipeline.ask("What is a graph?", None).await;
    assert!(matches!(result, Err(PaperRagError::EmptyCollection(_))));
}

#[tokio::test]
async fn test_generation_failure_returns_retrieved_chunks() {
    let h = harness(FakeGenerator::broken());
    let cancel = Cancellation::new();
    h.pipeline.download("graph", 2, &cancel).await.unwrap();
    h.pipeline.ingest(&cancel).await.unwrap();

    match h.pipeline.ask("What do attention weights decide?", Some(2)).await {
        Err(PaperRagError::GenerationUnavailable { reason, retrieved }) => {
            assert!(reason.contains("connection refused"));
            assert_eq!(retrieved.len(), 2);
            assert!(retrieved.iter().all(|c| !c.text.is_empty()));
        }
        other => panic!("expected GenerationUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_download_bounds() {
    let h = harness(FakeGenerator::working());
    let result = h.pipeline.download("graph", 0, &Cancellation::new()).await;
    assert!(matches!(result, Err(PaperRagError::InvalidQuery(_))));
    assert!(!h.data.join("2101.00001v1.pdf").exists());
}

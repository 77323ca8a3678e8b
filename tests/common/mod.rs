// Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use paperrag::config::Config;
use paperrag::embedding::{EmbeddingError, EmbeddingProvider};
use paperrag::generation::{GenerationError, GenerationProvider};
use paperrag::locator::{PaperRecord, PaperSource};
use paperrag::storage::PdfStream;
use paperrag::{PaperRagError, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Single-page PDF with one text line per entry, Helvetica, no compression
pub fn pdf_bytes(lines: &[&str]) -> Vec<u8> {
    let mut content = String::from("BT /F1 12 Tf 72 720 Td 14 TL\n");
    for line in lines {
        let escaped = line
            .replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)");
        content.push_str(&format!("({}) Tj T*\n", escaped));
    }
    content.push_str("ET");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out: Vec<u8> = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    out
}

pub fn write_pdf(path: &Path, lines: &[&str]) {
    std::fs::write(path, pdf_bytes(lines)).unwrap();
}

/// Body text of a fake paper, long enough to span several chunks
pub fn paper_lines(identifier: &str) -> Vec<String> {
    vec![
        format!("Paper {} studies graph neural networks.", identifier),
        "Message passing aggregates features from neighbouring nodes.".to_string(),
        "Attention weights decide which neighbours matter most.".to_string(),
        "Experiments cover citation and protein interaction graphs.".to_string(),
    ]
}

pub fn record(identifier: &str) -> PaperRecord {
    PaperRecord {
        identifier: identifier.to_string(),
        title: format!("Title of {}", identifier),
        abstract_text: format!("Abstract of {}", identifier),
        pdf_url: format!("https://arxiv.org/pdf/{}", identifier),
        authors: vec!["A. Author".to_string()],
        published: None,
        local_path: None,
    }
}

/// In-process paper repository with a fixed ranking
pub struct FakeSource {
    ranking: Vec<String>,
    failing: HashSet<String>,
    pub opens: AtomicUsize,
}

impl FakeSource {
    pub fn new(ranking: &[&str]) -> Self {
        Self {
            ranking: ranking.iter().map(|s| s.to_string()).collect(),
            failing: HashSet::new(),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, identifier: &str) -> Self {
        self.failing.insert(identifier.to_string());
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaperSource for FakeSource {
    async fn search(&self, _query: &str, start: usize, page_size: usize) -> Result<Vec<PaperRecord>> {
        Ok(self
            .ranking
            .iter()
            .skip(start)
            .take(page_size)
            .map(|id| record(id))
            .collect())
    }

    async fn open_pdf(&self, record: &PaperRecord) -> Result<PdfStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&record.identifier) {
            return Err(PaperRagError::FetchFailed {
                identifier: record.identifier.clone(),
                reason: "HTTP 503 Service Unavailable".to_string(),
            });
        }

        let lines = paper_lines(&record.identifier);
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let bytes = pdf_bytes(&refs);
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        let pieces = vec![Ok(head.to_vec()), Ok(tail.to_vec())];
        Ok(stream::iter(pieces).boxed())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Bag-of-words hashing embedder; similar wording gives similar vectors
pub struct HashEmbedder {
    pub dimension: usize,
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: 64,
            calls: AtomicUsize::new(0),
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() {
                continue;
            }
            let hash = blake3::hash(word.as_bytes());
            let slot = u16::from_le_bytes([hash.as_bytes()[0], hash.as_bytes()[1]]) as usize;
            v[slot % self.dimension] += 1.0;
        }
        // keep every vector non-zero
        v[0] += 0.01;
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }
        Ok(self.vector(text))
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn model_name(&self) -> &str {
        "hash"
    }
}

/// Generator that answers with its first context passage, or always fails
pub struct FakeGenerator {
    pub fail: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn working() -> Self {
        Self {
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn broken() -> Self {
        Self {
            fail: true,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GenerationProvider for FakeGenerator {
    async fn generate(
        &self,
        prompt: &str,
        context: &[String],
    ) -> std::result::Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(GenerationError::Request("connection refused".to_string()));
        }
        Ok(format!(
            "Based on {} passages: {}",
            context.len(),
            context.first().map(|s| s.trim()).unwrap_or_default()
        ))
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}

/// Defaults tuned for small fixtures: in-memory store, short windows
pub fn test_config(data_path: &Path) -> Config {
    let mut config = Config::default();
    config.storage.data_path = data_path.to_path_buf();
    config.chunking.window_size = 8;
    config.chunking.overlap = 2;
    config.embedding.batch_size = 4;
    config.vector_store.backend = "memory".to_string();
    config.source.concurrency = 2;
    config.indexing.concurrency = 2;
    config.query.top_k = 3;
    config
}

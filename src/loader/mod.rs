//! PDF text extraction
//!
//! One [`Document`] per stored paper. Page texts are joined in page order with
//! a single newline; no layout or structure survives extraction.

use crate::error::{PaperRagError, Result};
use crate::storage::PdfStore;
use futures_util::stream::{self, StreamExt};
use pdf_oxide::PdfDocument;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extracted text of one paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source_identifier: String,
    pub full_text: String,
}

impl Document {
    pub fn is_empty(&self) -> bool {
        self.full_text.trim().is_empty()
    }
}

/// A PDF that could not be turned into a document
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: PaperRagError,
}

/// Extract the text of a stored PDF.
///
/// The source identifier is recovered from the file name. A valid PDF with no
/// extractable text yields an empty document rather than an error.
pub fn load(path: &Path) -> Result<Document> {
    let source_identifier = PdfStore::identifier_for(path).ok_or_else(|| {
        PaperRagError::UnreadableDocument {
            path: path.to_path_buf(),
            reason: "file name does not map to a paper identifier".to_string(),
        }
    })?;

    let unreadable = |reason: String| PaperRagError::UnreadableDocument {
        path: path.to_path_buf(),
        reason,
    };

    if !path.is_file() {
        return Err(unreadable("file does not exist".to_string()));
    }

    let mut pdf = PdfDocument::open(path).map_err(|e| unreadable(e.to_string()))?;
    let page_count = pdf.page_count().map_err(|e| unreadable(e.to_string()))?;

    let mut pages = Vec::with_capacity(page_count);
    for page in 0..page_count {
        match pdf.extract_text(page) {
            Ok(text) => pages.push(text.trim_end().to_string()),
            Err(e) => {
                // one broken page does not poison the rest of the paper
                warn!("{}: page {} skipped: {}", path.display(), page + 1, e);
            }
        }
    }

    let full_text = pages.join("\n");
    if full_text.trim().is_empty() {
        warn!(
            "{}: no extractable text ({} pages), indexing as empty",
            path.display(),
            page_count
        );
    } else {
        debug!(
            "Extracted {} bytes from {} pages of {}",
            full_text.len(),
            page_count,
            path.display()
        );
    }

    Ok(Document {
        source_identifier,
        full_text,
    })
}

/// Load every stored PDF under `dir`, parsing on the blocking pool.
///
/// Per-file failures are collected and returned next to the successes.
pub async fn load_dir(dir: &Path, concurrency: usize) -> Result<(Vec<Document>, Vec<LoadFailure>)> {
    let store = PdfStore::new(dir.to_path_buf())?;
    let paths = store.list()?;
    info!("Loading {} PDFs from {}", paths.len(), dir.display());

    let results: Vec<(PathBuf, Result<Document>)> = stream::iter(paths)
        .map(|path| async move {
            let task_path = path.clone();
            let result = tokio::task::spawn_blocking(move || load(&task_path))
                .await
                .unwrap_or_else(|e| {
                    Err(PaperRagError::UnreadableDocument {
                        path: path.clone(),
                        reason: format!("extraction task failed: {}", e),
                    })
                });
            (path, result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut documents = Vec::new();
    let mut failures = Vec::new();
    for (path, result) in results {
        match result {
            Ok(doc) => documents.push(doc),
            Err(error) => {
                warn!("Skipping {}: {}", path.display(), error);
                failures.push(LoadFailure { path, error });
            }
        }
    }

    Ok((documents, failures))
}

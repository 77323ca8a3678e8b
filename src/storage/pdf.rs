//! Identifier-addressed PDF storage
//!
//! Every paper lives at `<base>/<identifier>.pdf`. Downloads are streamed to a
//! `.part` sibling and renamed into place only once complete, so a final-name
//! file is always a whole download.

use crate::cancel::Cancellation;
use crate::error::{PaperRagError, Result};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const PDF_MAGIC: &[u8] = b"%PDF-";
const PART_SUFFIX: &str = ".part";

/// Byte stream of a PDF body as delivered by a paper source
pub type PdfStream = BoxStream<'static, Result<Vec<u8>>>;

/// Local store of downloaded papers
#[derive(Debug, Clone)]
pub struct PdfStore {
    base_path: PathBuf,
}

impl PdfStore {
    /// Create a store rooted at `base_path`, creating the directory if needed
    pub fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path).map_err(|e| PaperRagError::Io {
            source: e,
            context: format!("Failed to create data directory: {}", base_path.display()),
        })?;

        Ok(Self { base_path })
    }

    /// File name for an identifier; `/` in old-style arXiv ids becomes `_`
    pub fn file_name_for(identifier: &str) -> String {
        format!("{}.pdf", identifier.replace('/', "_"))
    }

    /// Identifier stored at `path`, if it is a `.pdf` file of this layout
    pub fn identifier_for(path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_suffix(".pdf")?;
        if stem.is_empty() {
            return None;
        }
        Some(stem.replacen('_', "/", 1))
    }

    /// Deterministic location of a paper
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.base_path.join(Self::file_name_for(identifier))
    }

    fn part_path(&self, identifier: &str) -> PathBuf {
        self.base_path
            .join(format!("{}{}", Self::file_name_for(identifier), PART_SUFFIX))
    }

    /// Check if a paper is already stored
    pub fn exists(&self, identifier: &str) -> bool {
        self.path_for(identifier).is_file()
    }

    /// Stream a PDF body into the store.
    ///
    /// Returns the final path and the number of bytes written. On any error
    /// (including a body that is not a PDF, or cancellation) the partial file
    /// is removed and nothing appears under the final name.
    pub async fn write_stream(
        &self,
        identifier: &str,
        body: PdfStream,
        cancel: &Cancellation,
    ) -> Result<(PathBuf, u64)> {
        let part_path = self.part_path(identifier);
        let final_path = self.path_for(identifier);

        match self.write_part(&part_path, body, cancel).await {
            Ok(written) => {
                tokio::fs::rename(&part_path, &final_path)
                    .await
                    .map_err(|e| PaperRagError::Io {
                        source: e,
                        context: format!(
                            "Failed to move download into place: {} -> {}",
                            part_path.display(),
                            final_path.display()
                        ),
                    })?;
                Ok((final_path, written))
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                Err(e)
            }
        }
    }

    async fn write_part(
        &self,
        part_path: &Path,
        mut body: PdfStream,
        cancel: &Cancellation,
    ) -> Result<u64> {
        let mut file = tokio::fs::File::create(part_path)
            .await
            .map_err(|e| PaperRagError::Io {
                source: e,
                context: format!("Failed to create {}", part_path.display()),
            })?;

        let mut written: u64 = 0;
        let mut head: Vec<u8> = Vec::with_capacity(PDF_MAGIC.len());

        while let Some(piece) = body.next().await {
            if cancel.is_cancelled() {
                return Err(PaperRagError::Cancelled);
            }
            let piece = piece?;

            if head.len() < PDF_MAGIC.len() {
                let take = (PDF_MAGIC.len() - head.len()).min(piece.len());
                head.extend_from_slice(&piece[..take]);
                if !PDF_MAGIC.starts_with(&head) {
                    return Err(PaperRagError::Other(anyhow::anyhow!(
                        "response body is not a PDF"
                    )));
                }
            }

            file.write_all(&piece).await.map_err(|e| PaperRagError::Io {
                source: e,
                context: format!("Failed to write {}", part_path.display()),
            })?;
            written += piece.len() as u64;
        }

        if head.as_slice() != PDF_MAGIC {
            return Err(PaperRagError::Other(anyhow::anyhow!(
                "response body is truncated or empty ({} bytes)",
                written
            )));
        }

        file.flush().await.map_err(|e| PaperRagError::Io {
            source: e,
            context: format!("Failed to flush {}", part_path.display()),
        })?;
        file.sync_all().await.map_err(|e| PaperRagError::Io {
            source: e,
            context: format!("Failed to sync {}", part_path.display()),
        })?;

        Ok(written)
    }

    /// Stored PDFs, sorted by file name. In-progress `.part` files are skipped.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| PaperRagError::Io {
            source: e,
            context: format!("Failed to read data directory: {}", self.base_path.display()),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PaperRagError::Io {
                source: e,
                context: "Failed to read data directory entry".to_string(),
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("pdf") {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Remove `.part` files left behind by an interrupted process.
    ///
    /// Files modified within `older_than` may belong to a download that is
    /// still running and are kept.
    pub fn remove_partials(&self, older_than: Duration) -> Result<usize> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| PaperRagError::Io {
            source: e,
            context: format!("Failed to read data directory: {}", self.base_path.display()),
        })?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_part = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(PART_SUFFIX));
            if !is_part {
                continue;
            }
            let stale = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .is_some_and(|age| age >= older_than);
            if stale && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

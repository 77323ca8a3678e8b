//! PDF Fetcher
//!
//! Downloads the PDFs behind located records into the local store. Papers
//! already on disk are reused without any network traffic, and a failure on
//! one paper never aborts the rest of the batch.

use crate::cancel::Cancellation;
use crate::error::{PaperRagError, Result};
use crate::locator::{PaperRecord, PaperSource};
use crate::storage::PdfStore;
use ahash::AHashSet;
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A record whose PDF could not be stored
#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    pub identifier: String,
    pub reason: String,
}

/// Result of a fetch batch
#[derive(Debug, Default, Serialize)]
pub struct FetchReport {
    /// Records with `local_path` set, in input order
    pub records: Vec<PaperRecord>,
    pub downloaded: usize,
    pub reused: usize,
    pub failed: Vec<FetchFailure>,
    /// Records never started because of cancellation
    pub skipped: usize,
    pub cancelled: bool,
}

enum Outcome {
    Downloaded(PaperRecord, u64),
    Reused(PaperRecord),
    Failed(FetchFailure),
    Skipped,
}

pub struct Fetcher {
    source: Arc<dyn PaperSource>,
    concurrency: usize,
}

impl Fetcher {
    pub fn new(source: Arc<dyn PaperSource>, concurrency: usize) -> Self {
        Self {
            source,
            concurrency: concurrency.max(1),
        }
    }

    /// Make sure every record has its PDF under `dest_dir`.
    ///
    /// Only fails as a whole when `dest_dir` itself cannot be used.
    pub async fn fetch(
        &self,
        records: Vec<PaperRecord>,
        dest_dir: &Path,
        cancel: &Cancellation,
    ) -> Result<FetchReport> {
        let store = PdfStore::new(dest_dir.to_path_buf())?;

        // Two workers writing the same identifier would share a `.part` file
        let mut seen = AHashSet::new();
        let records: Vec<PaperRecord> = records
            .into_iter()
            .filter(|r| seen.insert(r.identifier.clone()))
            .collect();

        info!(
            "Fetching {} papers into {} ({} at a time)",
            records.len(),
            dest_dir.display(),
            self.concurrency
        );

        // `buffered` keeps input order while running up to `concurrency` at once
        let outcomes: Vec<Outcome> = stream::iter(records)
            .map(|record| self.fetch_one(record, &store, cancel))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = FetchReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Downloaded(record, bytes) => {
                    debug!("Downloaded {} ({} bytes)", record.identifier, bytes);
                    report.downloaded += 1;
                    report.records.push(record);
                }
                Outcome::Reused(record) => {
                    report.reused += 1;
                    report.records.push(record);
                }
                Outcome::Failed(failure) => report.failed.push(failure),
                Outcome::Skipped => report.skipped += 1,
            }
        }
        report.cancelled = report.skipped > 0;

        info!(
            "Fetch complete: {} downloaded, {} reused, {} failed, {} skipped",
            report.downloaded,
            report.reused,
            report.failed.len(),
            report.skipped
        );
        Ok(report)
    }

    async fn fetch_one(
        &self,
        mut record: PaperRecord,
        store: &PdfStore,
        cancel: &Cancellation,
    ) -> Outcome {
        if cancel.is_cancelled() {
            return Outcome::Skipped;
        }

        if store.exists(&record.identifier) {
            debug!("Reusing stored copy of {}", record.identifier);
            record.local_path = Some(store.path_for(&record.identifier));
            return Outcome::Reused(record);
        }

        let result = async {
            let body = self.source.open_pdf(&record).await?;
            store.write_stream(&record.identifier, body, cancel).await
        }
        .await;

        match result {
            Ok((path, bytes)) => {
                record.local_path = Some(path);
                Outcome::Downloaded(record, bytes)
            }
            Err(PaperRagError::Cancelled) => Outcome::Skipped,
            Err(e) => {
                warn!("Failed to fetch {}: {}", record.identifier, e);
                let reason = match e {
                    PaperRagError::FetchFailed { reason, .. } => reason,
                    other => other.to_string(),
                };
                Outcome::Failed(FetchFailure {
                    identifier: record.identifier,
                    reason,
                })
            }
        }
    }
}

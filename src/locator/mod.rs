//! Paper Locator
//!
//! Turns a free-text query into an ordered, de-duplicated list of
//! [`PaperRecord`]s by paging through a [`PaperSource`].

mod arxiv;

pub use arxiv::{parse_feed, ArxivSource};

use crate::error::{PaperRagError, Result};
use crate::storage::PdfStream;
use ahash::AHashSet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on `max_results` accepted by [`Locator::locate`]
pub const MAX_RESULTS_LIMIT: usize = 100;

/// Metadata of one paper in the remote repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Stable repository identifier, e.g. `2101.00001v2`
    pub identifier: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub pdf_url: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    /// Set by the fetcher once the PDF is on disk
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

/// A remote repository of papers
///
/// Implementations own their transport details (pagination parameters,
/// timeouts); the locator and fetcher only see records and byte streams.
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// One page of search results in relevance order
    async fn search(&self, query: &str, start: usize, page_size: usize)
        -> Result<Vec<PaperRecord>>;

    /// Open the PDF body of a record for streaming
    async fn open_pdf(&self, record: &PaperRecord) -> Result<PdfStream>;

    /// Human readable name for logging
    fn name(&self) -> &str;
}

/// Paper Locator
pub struct Locator {
    source: Arc<dyn PaperSource>,
    page_size: usize,
}

impl Locator {
    pub fn new(source: Arc<dyn PaperSource>, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.clamp(1, MAX_RESULTS_LIMIT),
        }
    }

    /// Find up to `max_results` papers matching `query`, best match first.
    pub async fn locate(&self, query: &str, max_results: usize) -> Result<Vec<PaperRecord>> {
        let query = validate_query(query, max_results)?;

        info!(
            "Searching {} for '{}' (max {} results)",
            self.source.name(),
            query,
            max_results
        );

        let mut seen: AHashSet<String> = AHashSet::new();
        let mut records = Vec::with_capacity(max_results);
        let mut start = 0usize;
        let max_pages = max_results.div_ceil(self.page_size) + 2;

        for _ in 0..max_pages {
            let wanted = (max_results - records.len()).min(self.page_size);
            let page = self.source.search(query, start, wanted).await?;
            let page_len = page.len();
            debug!("Page at offset {} returned {} records", start, page_len);

            for record in page {
                if records.len() == max_results {
                    break;
                }
                if seen.insert(record.identifier.clone()) {
                    records.push(record);
                } else {
                    debug!("Dropping duplicate record {}", record.identifier);
                }
            }

            if records.len() == max_results || page_len < wanted {
                break;
            }
            start += page_len;
        }

        info!("Located {} papers", records.len());
        Ok(records)
    }
}

/// Trimmed query, or `InvalidQuery`
fn validate_query(query: &str, max_results: usize) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(PaperRagError::InvalidQuery(
            "query must not be empty".to_string(),
        ));
    }
    if !(1..=MAX_RESULTS_LIMIT).contains(&max_results) {
        return Err(PaperRagError::InvalidQuery(format!(
            "max_results must be between 1 and {}, got {}",
            MAX_RESULTS_LIMIT, max_results
        )));
    }
    Ok(trimmed)
}

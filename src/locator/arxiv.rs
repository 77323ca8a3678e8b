//! arXiv Atom API client

use super::{PaperRecord, PaperSource};
use crate::config::SourceConfig;
use crate::error::{PaperRagError, Result};
use crate::storage::PdfStream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;

/// arXiv search + PDF download over HTTP
pub struct ArxivSource {
    client: Client,
    search_url: String,
    pdf_base_url: String,
}

impl ArxivSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("paperrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PaperRagError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            search_url: config.search_url.clone(),
            pdf_base_url: config.pdf_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PaperSource for ArxivSource {
    async fn search(
        &self,
        query: &str,
        start: usize,
        page_size: usize,
    ) -> Result<Vec<PaperRecord>> {
        let start = start.to_string();
        let max_results = page_size.to_string();
        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("search_query", query),
                ("start", start.as_str()),
                ("max_results", max_results.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|e| PaperRagError::SourceUnavailable(format!("arXiv search failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaperRagError::SourceUnavailable(format!(
                "arXiv search returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response.text().await.map_err(|e| {
            PaperRagError::SourceUnavailable(format!("failed to read arXiv response: {}", e))
        })?;

        parse_feed(&body, &self.pdf_base_url)
    }

    async fn open_pdf(&self, record: &PaperRecord) -> Result<PdfStream> {
        let identifier = record.identifier.clone();
        let failed = |reason: String| PaperRagError::FetchFailed {
            identifier: record.identifier.clone(),
            reason,
        };

        let response = self
            .client
            .get(&record.pdf_url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)));
        }

        let stream = response.bytes_stream().map(move |piece| {
            piece
                .map(|bytes| bytes.to_vec())
                .map_err(|e| PaperRagError::FetchFailed {
                    identifier: identifier.clone(),
                    reason: e.to_string(),
                })
        });

        Ok(stream.boxed())
    }

    fn name(&self) -> &str {
        "arXiv"
    }
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@title", default)]
    title: Option<String>,
    #[serde(rename = "@type", default)]
    mime: Option<String>,
}

/// Parse an arXiv Atom feed into records, keeping feed order.
///
/// arXiv reports request errors in-band as a single entry whose id points at
/// `/api/errors`; that is surfaced as `SourceUnavailable`.
pub fn parse_feed(xml: &str, pdf_base_url: &str) -> Result<Vec<PaperRecord>> {
    let feed: Feed = quick_xml::de::from_str(xml)
        .map_err(|e| PaperRagError::SourceUnavailable(format!("malformed arXiv feed: {}", e)))?;

    feed.entries
        .into_iter()
        .map(|entry| entry_to_record(entry, pdf_base_url))
        .collect()
}

fn entry_to_record(entry: Entry, pdf_base_url: &str) -> Result<PaperRecord> {
    if entry.id.contains("/api/errors") {
        return Err(PaperRagError::SourceUnavailable(format!(
            "arXiv rejected the request: {}",
            collapse_whitespace(&entry.summary)
        )));
    }

    let identifier = entry
        .id
        .split_once("/abs/")
        .map(|(_, id)| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            PaperRagError::SourceUnavailable(format!("unexpected arXiv entry id: {}", entry.id))
        })?;

    let pdf_url = entry
        .links
        .iter()
        .find(|link| {
            link.title.as_deref() == Some("pdf") || link.mime.as_deref() == Some("application/pdf")
        })
        .map(|link| link.href.clone())
        .unwrap_or_else(|| format!("{}/{}", pdf_base_url, identifier));

    let published = entry
        .published
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(PaperRecord {
        identifier,
        title: collapse_whitespace(&entry.title),
        abstract_text: collapse_whitespace(&entry.summary),
        pdf_url,
        authors: entry
            .authors
            .into_iter()
            .map(|a| collapse_whitespace(&a.name))
            .collect(),
        published,
        local_path: None,
    })
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <link href="http://arxiv.org/api/query?search_query%3Dgraph" rel="self" type="application/atom+xml"/>
  <title type="html">ArXiv Query: search_query=graph neural networks</title>
  <id>http://arxiv.org/api/abc</id>
  <updated>2024-01-01T00:00:00-05:00</updated>
  <opensearch:totalResults>2</opensearch:totalResults>
  <opensearch:startIndex>0</opensearch:startIndex>
  <opensearch:itemsPerPage>2</opensearch:itemsPerPage>
  <entry>
    <id>http://arxiv.org/abs/1812.08434v6</id>
    <updated>2021-10-07T12:00:00Z</updated>
    <published>2018-12-20T15:45:25Z</published>
    <title>Graph Neural Networks: A Review of
  Methods and Applications</title>
    <summary>  Lots of learning tasks require dealing with graph data.
</summary>
    <author>
      <name>Jie Zhou</name>
    </author>
    <author>
      <name>Ganqu Cui</name>
    </author>
    <arxiv:doi>10.1016/j.aiopen.2021.01.001</arxiv:doi>
    <link title="doi" href="http://dx.doi.org/10.1016/j.aiopen.2021.01.001" rel="related"/>
    <arxiv:comment>Published in AI Open</arxiv:comment>
    <link href="http://arxiv.org/abs/1812.08434v6" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1812.08434v6" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/hep-th/9901001v1</id>
    <published>1999-01-01T00:00:00Z</published>
    <title>An old style identifier</title>
    <summary>No pdf link here.</summary>
    <author><name>A. Physicist</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let records = parse_feed(FEED, "https://arxiv.org/pdf").unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.identifier, "1812.08434v6");
        assert_eq!(
            first.title,
            "Graph Neural Networks: A Review of Methods and Applications"
        );
        assert_eq!(
            first.abstract_text,
            "Lots of learning tasks require dealing with graph data."
        );
        assert_eq!(first.pdf_url, "http://arxiv.org/pdf/1812.08434v6");
        assert_eq!(first.authors, vec!["Jie Zhou", "Ganqu Cui"]);
        assert!(first.published.is_some());
        assert!(first.local_path.is_none());

        let second = &records[1];
        assert_eq!(second.identifier, "hep-th/9901001v1");
        assert_eq!(second.pdf_url, "https://arxiv.org/pdf/hep-th/9901001v1");
    }

    #[test]
    fn test_empty_feed() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        assert!(parse_feed(xml, "https://arxiv.org/pdf").unwrap().is_empty());
    }

    #[test]
    fn test_error_entry() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/api/errors#max_results_must_be_nonnegative</id>
    <title>Error</title>
    <summary>max_results must be non-negative</summary>
  </entry>
</feed>"#;
        let result = parse_feed(xml, "https://arxiv.org/pdf");
        assert!(matches!(result, Err(PaperRagError::SourceUnavailable(_))));
    }

    #[test]
    fn test_malformed_feed() {
        let result = parse_feed("<html><body>Service Unavailable", "https://arxiv.org/pdf");
        assert!(matches!(result, Err(PaperRagError::SourceUnavailable(_))));
    }
}

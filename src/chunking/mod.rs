//! Token-window chunking of extracted documents.
//!
//! Tokens are maximal runs of non-whitespace. Each token's span runs up to the
//! start of the next token, so the whitespace between words stays inside the
//! chunks and the original text can be stitched back together from the spans.

use crate::error::{PaperRagError, Result};
use crate::loader::Document;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A bounded window of a document's text, the unit of embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source_identifier: String,
    /// 0-based, sequential within a document
    pub chunk_index: usize,
    pub text: String,
    /// Byte range of `text` inside the document's `full_text`
    pub span: Range<usize>,
}

/// Split a document into overlapping token windows.
///
/// Windows advance by `window_size - overlap` tokens and the last window may
/// be shorter. Identical arguments always produce identical output.
pub fn chunk(doc: &Document, window_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    validate_window(window_size, overlap)?;

    let starts = token_starts(&doc.full_text);
    if starts.is_empty() {
        return Ok(Vec::new());
    }

    let stride = window_size - overlap;
    let token_count = starts.len();
    let mut chunks = Vec::with_capacity(token_count.div_ceil(stride));
    let mut first = 0usize;

    loop {
        let last = (first + window_size).min(token_count);
        let start = if first == 0 { 0 } else { starts[first] };
        let end = if last == token_count {
            doc.full_text.len()
        } else {
            starts[last]
        };

        chunks.push(Chunk {
            source_identifier: doc.source_identifier.clone(),
            chunk_index: chunks.len(),
            text: doc.full_text[start..end].to_string(),
            span: start..end,
        });

        if last == token_count {
            break;
        }
        first += stride;
    }

    Ok(chunks)
}

/// Rebuild the original text from chunks in index order, dropping overlaps.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut text = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let keep = match chunks.get(i + 1) {
            Some(next) => next.span.start.saturating_sub(chunk.span.start),
            None => chunk.text.len(),
        };
        text.push_str(&chunk.text[..keep.min(chunk.text.len())]);
    }
    text
}

fn validate_window(window_size: usize, overlap: usize) -> Result<()> {
    if window_size == 0 {
        return Err(PaperRagError::InvalidConfig(
            "window_size must be greater than 0".to_string(),
        ));
    }
    if overlap >= window_size {
        return Err(PaperRagError::InvalidConfig(format!(
            "overlap ({}) must be smaller than window_size ({})",
            overlap, window_size
        )));
    }
    Ok(())
}

/// Byte offsets where each non-whitespace run begins
fn token_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut in_token = false;
    for (offset, c) in text.char_indices() {
        if c.is_whitespace() {
            in_token = false;
        } else if !in_token {
            starts.push(offset);
            in_token = true;
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document {
            source_identifier: "2101.00001v1".to_string(),
            full_text: text.to_string(),
        }
    }

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_windows_advance_by_stride() {
        let chunks = chunk(&doc(&words(10)), 4, 1).unwrap();

        // token windows: 0-3, 3-6, 6-9, 9
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "w0 w1 w2 w3 ");
        assert_eq!(chunks[1].text, "w3 w4 w5 w6 ");
        assert_eq!(chunks[2].text, "w6 w7 w8 w9");
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.source_identifier, "2101.00001v1");
        }
    }

    #[test]
    fn test_final_window_may_be_short() {
        let chunks = chunk(&doc(&words(5)), 3, 0).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "w3 w4");
    }

    #[test]
    fn test_short_document_single_chunk() {
        let chunks = chunk(&doc("  graph neural networks\n"), 200, 40).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].span, 0..24);
        assert_eq!(chunks[0].text, "  graph neural networks\n");
    }

    #[test]
    fn test_empty_document() {
        assert!(chunk(&doc(""), 10, 2).unwrap().is_empty());
        assert!(chunk(&doc(" \n\t "), 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            chunk(&doc("a b"), 4, 4),
            Err(PaperRagError::InvalidConfig(_))
        ));
        assert!(matches!(
            chunk(&doc("a b"), 0, 0),
            Err(PaperRagError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_reconstruction() {
        let text = "Graph  neural networks\n(GNNs) operate on\tgraphs.\n\nPage two: message passing — über alles ✓ ";
        for (window, overlap) in [(1, 0), (2, 1), (3, 2), (4, 0), (5, 3), (50, 10)] {
            let chunks = chunk(&doc(text), window, overlap).unwrap();
            assert_eq!(reconstruct(&chunks), text, "window={window} overlap={overlap}");
            for c in &chunks {
                assert_eq!(&text[c.span.clone()], c.text);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let text = words(523);
        let a = chunk(&doc(&text), 64, 16).unwrap();
        let b = chunk(&doc(&text), 64, 16).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_overlap_shares_tokens() {
        let chunks = chunk(&doc(&words(20)), 8, 3).unwrap();
        for pair in chunks.windows(2) {
            let tail: Vec<&str> = pair[0].text.split_whitespace().rev().take(3).collect();
            let head: Vec<&str> = pair[1].text.split_whitespace().take(3).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            assert_eq!(tail, head);
        }
    }
}

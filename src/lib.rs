//! paperrag - retrieval-augmented question answering over arXiv papers
//!
//! The pipeline runs Locator → Fetcher → Loader → Chunker → Indexer, and the
//! Query Engine answers questions from the resulting vector collection.

pub mod cancel;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod fetcher;
pub mod generation;
pub mod loader;
pub mod locator;
pub mod pipeline;
pub mod retrieval;
pub mod storage;
pub mod vector_store;

pub use cancel::Cancellation;
pub use error::{PaperRagError, Result};

//! Storage layer for paperrag
//!
//! Downloaded PDFs are the only state the pipeline persists locally.

pub mod pdf;

pub use pdf::{PdfStore, PdfStream};

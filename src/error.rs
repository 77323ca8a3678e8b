use crate::retrieval::CitedChunk;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for paperrag
#[derive(Error, Debug)]
pub enum PaperRagError {
    /// Query text or result bound rejected before any remote call
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Remote search API unreachable or answered with something unparseable
    #[error("Paper source unavailable: {0}")]
    SourceUnavailable(String),

    /// Download of a single paper failed
    #[error("Fetch failed for {identifier}: {reason}")]
    FetchFailed { identifier: String, reason: String },

    /// PDF could not be opened or parsed
    #[error("Unreadable document {path}: {reason}")]
    UnreadableDocument { path: PathBuf, reason: String },

    /// Chunking parameters out of range
    #[error("Invalid chunking configuration: {0}")]
    InvalidConfig(String),

    /// Embedding a single chunk (or the question) failed
    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),

    /// Collection missing or holding no vectors
    #[error("Collection '{0}' has no vectors")]
    EmptyCollection(String),

    /// Language backend failed after retrieval succeeded
    #[error("Generation unavailable: {reason} ({} chunks retrieved)", retrieved.len())]
    GenerationUnavailable {
        reason: String,
        retrieved: Vec<CitedChunk>,
    },

    /// Vector store request failed
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Operation stopped by a cancellation request
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for paperrag operations
pub type Result<T> = std::result::Result<T, PaperRagError>;

//! Answer generation backends

mod ollama;

pub use ollama::OllamaGenerator;

use crate::config::LlmConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    Request(String),

    #[error("Generation backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed generation response: {0}")]
    Malformed(String),

    #[error("Generation returned no text")]
    Empty,
}

/// A language model that answers from supplied context
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Answer `prompt` using only `context` passages
    async fn generate(&self, prompt: &str, context: &[String]) -> std::result::Result<String, GenerationError>;

    fn model_name(&self) -> &str;
}

/// Lay out numbered context passages followed by the question
pub fn render_prompt(question: &str, context: &[String]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the context passages below. \
         If the context does not contain the answer, say so.\n\nContext:\n",
    );
    for (i, passage) in context.iter().enumerate() {
        let _ = writeln!(prompt, "[{}] {}", i + 1, passage.trim());
    }
    let _ = write!(prompt, "\nQuestion: {}\nAnswer:", question.trim());
    prompt
}

/// Build the configured generator
pub fn generator_from_config(config: &LlmConfig) -> Result<Arc<dyn GenerationProvider>> {
    Ok(Arc::new(OllamaGenerator::new(config)?))
}

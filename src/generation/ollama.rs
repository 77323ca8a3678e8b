/// Ollama `/api/generate` client
use super::{render_prompt, GenerationError, GenerationProvider};
use crate::config::LlmConfig;
use crate::error::{PaperRagError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub struct OllamaGenerator {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PaperRagError::Config(format!("failed to build LLM client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", config.url.trim_end_matches('/')),
            model: config.name.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    async fn generate(&self, prompt: &str, context: &[String]) -> std::result::Result<String, GenerationError> {
        let full_prompt = render_prompt(prompt, context);
        debug!(
            "Sending {} char prompt to {} ({})",
            full_prompt.len(),
            self.endpoint,
            self.model
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                model: &self.model,
                prompt: &full_prompt,
                stream: false,
                options: GenerateOptions {
                    temperature: self.temperature,
                },
            })
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

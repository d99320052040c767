//! Embedding and completion providers for a local Ollama server.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::{CompletionOptions, CompletionProvider};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, StudyError};

/// Where `ollama serve` listens by default.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// The default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Dimensionality of `nomic-embed-text`.
const DEFAULT_DIMENSIONS: usize = 768;

/// The default generation model.
pub const DEFAULT_COMPLETION_MODEL: &str = "llama3.2";

const PROVIDER: &str = "Ollama";

/// An [`EmbeddingProvider`] backed by Ollama's `/api/embeddings` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use study_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl Default for OllamaEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaEmbeddingProvider {
    /// Provider for `nomic-embed-text` on the default local server.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Point at another server, e.g. `http://gpu-box:11434`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use another embedding model. `dimensions` must match its output size.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }
}

/// A [`CompletionProvider`] backed by Ollama's non-streaming `/api/generate`.
pub struct OllamaCompletionProvider {
    client: reqwest::Client,
    base_url: String,
}

impl Default for OllamaCompletionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaCompletionProvider {
    /// Provider for the default local server. The model comes from each call's options.
    pub fn new() -> Self {
        Self { client: reqwest::Client::new(), base_url: DEFAULT_BASE_URL.into() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
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
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Send `body` to `url` and decode a successful response.
///
/// `wrap` turns a message into the caller's error variant.
async fn post_json<B, R>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    wrap: fn(String) -> StudyError,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: for<'de> Deserialize<'de>,
{
    let response = client.post(url).json(body).send().await.map_err(|e| {
        error!(provider = PROVIDER, url, error = %e, "request failed");
        wrap(format!("request failed: {e}"))
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);

        error!(provider = PROVIDER, %status, url, "API error");
        return Err(wrap(format!("API returned {status}: {detail}")));
    }

    response.json().await.map_err(|e| {
        error!(provider = PROVIDER, error = %e, "failed to parse response");
        wrap(format!("failed to parse response: {e}"))
    })
}

fn embedding_error(message: String) -> StudyError {
    StudyError::Embedding { provider: PROVIDER.into(), message }
}

fn completion_error(message: String) -> StudyError {
    StudyError::Completion { provider: PROVIDER.into(), message }
}

// ── Provider implementations ───────────────────────────────────────

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), model = %self.model, "embedding text");

        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbeddingRequest { model: &self.model, prompt: text };
        let response: EmbeddingResponse =
            post_json(&self.client, &url, &request, embedding_error).await?;

        if response.embedding.len() != self.dimensions {
            return Err(embedding_error(format!(
                "model {} returned {} dimensions, expected {}",
                self.model,
                response.embedding.len(),
                self.dimensions
            )));
        }
        Ok(response.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletionProvider {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        debug!(provider = PROVIDER, model = %options.model, prompt_len = prompt.len(), "generating");

        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &options.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
            },
        };
        let response: GenerateResponse =
            post_json(&self.client, &url, &request, completion_error).await?;
        Ok(response.response)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_uses_ollama_option_names() {
        let request = GenerateRequest {
            model: "llama3.2",
            prompt: "hi",
            stream: false,
            options: GenerateOptions { num_predict: 64, temperature: Some(0.5) },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 64);
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let provider = OllamaEmbeddingProvider::new().with_base_url("http://host:11434/");
        assert_eq!(provider.base_url, "http://host:11434");
        assert_eq!(provider.dimensions(), DEFAULT_DIMENSIONS);
    }
}

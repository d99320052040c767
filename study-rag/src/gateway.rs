//! Bounded, retrying access to the external model capabilities.
//!
//! Every provider call is wrapped in `tokio::time::timeout`. A transient
//! failure (timeout or provider error) is retried once with identical input;
//! a second failure is surfaced to the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::completion::{CompletionOptions, CompletionProvider};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, StudyError};

const MAX_ATTEMPTS: u32 = 2;

async fn call_with_retry<T, F, Fut>(
    gateway: &str,
    provider: &str,
    timeout: Duration,
    op: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        let outcome = match tokio::time::timeout(timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(StudyError::GatewayTimeout { gateway: gateway.to_string(), timeout }),
        };
        match outcome {
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                warn!(gateway, provider, attempt, error = %e, "gateway call failed, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Embedding capability with input checks, a time bound and one retry.
#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl EmbeddingGateway {
    /// Wrap `provider`, bounding every call by `timeout`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Dimensionality reported by the provider.
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Embedding`] for empty input, a provider failure
    /// or a vector whose length differs from
    /// [`dimensions`](Self::dimensions), [`StudyError::GatewayTimeout`] if
    /// both attempts time out.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let provider = self.provider.name();
        if text.trim().is_empty() {
            return Err(StudyError::Embedding {
                provider: provider.to_string(),
                message: "input text is empty".to_string(),
            });
        }
        debug!(provider, text_len = text.len(), "embedding text");
        let vector =
            call_with_retry("embedding", provider, self.timeout, || self.provider.embed(text))
                .await?;
        self.check_dimensions(&vector)?;
        Ok(vector)
    }

    /// Embed several texts, preserving order.
    ///
    /// # Errors
    ///
    /// As [`embed`](Self::embed); also fails if the provider returns a
    /// different number of vectors than inputs.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let provider = self.provider.name();
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(StudyError::Embedding {
                provider: provider.to_string(),
                message: format!("input text at position {pos} is empty"),
            });
        }
        debug!(provider, batch_size = texts.len(), "embedding batch");
        let vectors =
            call_with_retry("embedding", provider, self.timeout, || self.provider.embed_batch(texts))
                .await?;
        if vectors.len() != texts.len() {
            return Err(StudyError::Embedding {
                provider: provider.to_string(),
                message: format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            });
        }
        for vector in &vectors {
            self.check_dimensions(vector)?;
        }
        Ok(vectors)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        let expected = self.dimensions();
        if vector.len() == expected {
            return Ok(());
        }
        Err(StudyError::Embedding {
            provider: self.provider.name().to_string(),
            message: format!("expected {expected} dimensions, got {}", vector.len()),
        })
    }
}

/// Completion capability with option checks, a time bound and one retry.
#[derive(Clone)]
pub struct CompletionGateway {
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
}

impl CompletionGateway {
    /// Wrap `provider`, bounding every call by `timeout`.
    pub fn new(provider: Arc<dyn CompletionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Generate text for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Completion`] for malformed options (not retried)
    /// or a persistent provider failure, [`StudyError::GatewayTimeout`] if
    /// both attempts time out.
    pub async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        options.validate()?;
        let provider = self.provider.name();
        debug!(provider, model = %options.model, prompt_len = prompt.len(), "requesting completion");
        call_with_retry("completion", provider, self.timeout, || {
            self.provider.complete(prompt, options)
        })
        .await
    }
}

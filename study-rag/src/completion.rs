//! Completion provider trait for prompt-to-text generation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};

/// Per-call generation options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionOptions {
    /// Model selector understood by the provider.
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionOptions {
    /// Options for `model` with a 512 token limit and provider-default temperature.
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), max_tokens: 512, temperature: None }
    }

    /// Set the maximum output length.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Check the options before they are sent to a provider.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Completion`] for an empty model, a zero token
    /// limit, or a temperature outside `0.0..=2.0`.
    pub fn validate(&self) -> Result<()> {
        let malformed = |message: String| StudyError::Completion {
            provider: "options".to_string(),
            message,
        };
        if self.model.trim().is_empty() {
            return Err(malformed("model must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(malformed("max_tokens must be greater than zero".to_string()));
        }
        match self.temperature {
            Some(t) if !(0.0..=2.0).contains(&t) => {
                Err(malformed(format!("temperature {t} outside 0.0..=2.0")))
            }
            _ => Ok(()),
        }
    }
}

/// A provider that turns a prompt into generated text.
///
/// # Example
///
/// ```rust,ignore
/// use study_rag::{CompletionOptions, CompletionProvider};
///
/// let text = provider.complete("Say hi", &CompletionOptions::new("llama3.2")).await?;
/// ```
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate text for `prompt`.
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;

    /// Short provider name used in logs and errors.
    fn name(&self) -> &str {
        "completion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_options() {
        assert!(CompletionOptions::new("llama3.2").validate().is_ok());
        assert!(CompletionOptions::new("").validate().is_err());
        assert!(CompletionOptions::new("m").max_tokens(0).validate().is_err());
        assert!(CompletionOptions::new("m").temperature(3.5).validate().is_err());
    }
}

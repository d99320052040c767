//! Configuration for the study pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::completion::CompletionOptions;
use crate::error::{Result, StudyError};

/// Configuration parameters shared by every pipeline component.
///
/// Components receive this value at construction time; nothing is read from
/// the process environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StudyConfig {
    /// Maximum chunk size in bytes.
    pub chunk_size: usize,
    /// Number of overlapping bytes between consecutive chunks.
    pub chunk_overlap: usize,
    /// Minimum length of a non-final chunk when a natural boundary exists.
    pub min_chunk_size: usize,
    /// Number of chunks retrieved for question answering.
    pub top_k: usize,
    /// Number of chunks retrieved for summaries and definitions.
    pub summary_top_k: usize,
    /// Number of chunks retrieved for quiz generation.
    pub quiz_top_k: usize,
    /// Hits scoring at or below this similarity are not treated as context.
    pub min_similarity: f32,
    /// Maximum characters of context embedded in answer, summary and definition prompts.
    pub context_char_budget: usize,
    /// Maximum characters of context embedded in quiz prompts.
    pub quiz_context_char_budget: usize,
    /// Smallest quiz that may be requested.
    pub quiz_min_questions: usize,
    /// Largest quiz that may be requested.
    pub quiz_max_questions: usize,
    /// Upper bound on a single gateway call.
    pub gateway_timeout: Duration,
    /// Completion options for grounded answers.
    pub answer_options: CompletionOptions,
    /// Completion options for summaries and definition extraction.
    pub summary_options: CompletionOptions,
    /// Completion options for quiz generation.
    pub quiz_options: CompletionOptions,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 100,
            top_k: 5,
            summary_top_k: 10,
            quiz_top_k: 15,
            min_similarity: 0.0,
            context_char_budget: 4000,
            quiz_context_char_budget: 3000,
            quiz_min_questions: 3,
            quiz_max_questions: 10,
            gateway_timeout: Duration::from_secs(120),
            answer_options: CompletionOptions::new("llama3.2").max_tokens(512).temperature(0.3),
            summary_options: CompletionOptions::new("llama3.2").max_tokens(1024).temperature(0.3),
            quiz_options: CompletionOptions::new("llama3.2").max_tokens(2048).temperature(0.7),
        }
    }
}

impl StudyConfig {
    /// Create a new builder for constructing a [`StudyConfig`].
    pub fn builder() -> StudyConfigBuilder {
        StudyConfigBuilder::default()
    }

    /// Validate that the parameters are mutually consistent.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Config`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `min_chunk_size > chunk_size`
    /// - any `top_k` is zero
    /// - the quiz bounds are empty or start at zero
    /// - `gateway_timeout` is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(StudyError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(StudyError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.min_chunk_size > self.chunk_size {
            return Err(StudyError::Config(format!(
                "min_chunk_size ({}) must not exceed chunk_size ({})",
                self.min_chunk_size, self.chunk_size
            )));
        }
        if self.top_k == 0 || self.summary_top_k == 0 || self.quiz_top_k == 0 {
            return Err(StudyError::Config("top_k values must be greater than zero".to_string()));
        }
        if self.quiz_min_questions == 0 || self.quiz_min_questions > self.quiz_max_questions {
            return Err(StudyError::Config(format!(
                "invalid quiz bounds {}..={}",
                self.quiz_min_questions, self.quiz_max_questions
            )));
        }
        if self.gateway_timeout.is_zero() {
            return Err(StudyError::Config("gateway_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`StudyConfig`].
#[derive(Debug, Clone, Default)]
pub struct StudyConfigBuilder {
    config: StudyConfig,
}

impl StudyConfigBuilder {
    /// Set the maximum chunk size in bytes.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in bytes.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the minimum size of a non-final chunk.
    pub fn min_chunk_size(mut self, size: usize) -> Self {
        self.config.min_chunk_size = size;
        self
    }

    /// Set the number of chunks retrieved for question answering.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the number of chunks retrieved for summaries and definitions.
    pub fn summary_top_k(mut self, k: usize) -> Self {
        self.config.summary_top_k = k;
        self
    }

    /// Set the number of chunks retrieved for quiz generation.
    pub fn quiz_top_k(mut self, k: usize) -> Self {
        self.config.quiz_top_k = k;
        self
    }

    /// Set the similarity a hit must exceed to count as context.
    pub fn min_similarity(mut self, threshold: f32) -> Self {
        self.config.min_similarity = threshold;
        self
    }

    /// Set the context budget for answer, summary and definition prompts.
    pub fn context_char_budget(mut self, chars: usize) -> Self {
        self.config.context_char_budget = chars;
        self
    }

    /// Set the context budget for quiz prompts.
    pub fn quiz_context_char_budget(mut self, chars: usize) -> Self {
        self.config.quiz_context_char_budget = chars;
        self
    }

    /// Set the inclusive bounds on requested quiz size.
    pub fn quiz_question_bounds(mut self, min: usize, max: usize) -> Self {
        self.config.quiz_min_questions = min;
        self.config.quiz_max_questions = max;
        self
    }

    /// Set the upper bound on a single gateway call.
    pub fn gateway_timeout(mut self, timeout: Duration) -> Self {
        self.config.gateway_timeout = timeout;
        self
    }

    /// Set the completion options used for grounded answers.
    pub fn answer_options(mut self, options: CompletionOptions) -> Self {
        self.config.answer_options = options;
        self
    }

    /// Set the completion options used for summaries and definitions.
    pub fn summary_options(mut self, options: CompletionOptions) -> Self {
        self.config.summary_options = options;
        self
    }

    /// Set the completion options used for quiz generation.
    pub fn quiz_options(mut self, options: CompletionOptions) -> Self {
        self.config.quiz_options = options;
        self
    }

    /// Use one model for every generation task.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.config.answer_options.model = model.clone();
        self.config.summary_options.model = model.clone();
        self.config.quiz_options.model = model;
        self
    }

    /// Build the [`StudyConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`StudyConfig::validate`].
    pub fn build(self) -> Result<StudyConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(StudyConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk() {
        let err = StudyConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, StudyError::Config(_)));
    }

    #[test]
    fn rejects_inverted_quiz_bounds() {
        let err = StudyConfig::builder().quiz_question_bounds(8, 4).build().unwrap_err();
        assert!(matches!(err, StudyError::Config(_)));
    }

    #[test]
    fn model_applies_to_every_task() {
        let config = StudyConfig::builder().model("mistral").build().unwrap();
        assert_eq!(config.answer_options.model, "mistral");
        assert_eq!(config.summary_options.model, "mistral");
        assert_eq!(config.quiz_options.model, "mistral");
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let config: StudyConfig = serde_json::from_str(r#"{"chunk_size": 500, "chunk_overlap": 50}"#)
            .unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, StudyConfig::default().top_k);
    }
}

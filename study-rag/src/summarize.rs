//! Format-specific summaries over retrieved or corpus-wide context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::completion::CompletionOptions;
use crate::error::{Result, StudyError};
use crate::gateway::CompletionGateway;
use crate::prompts;
use crate::retriever::{Retriever, unique_sources};

/// The shape of a generated summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFormat {
    /// 5-7 bullet points.
    #[default]
    Bullets,
    /// 2-3 sentences.
    Short,
    /// Comprehensive paragraphs.
    Detailed,
    /// Plain language for a younger reader.
    #[serde(alias = "eli15")]
    Simplified,
}

impl fmt::Display for SummaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bullets => "bullets",
            Self::Short => "short",
            Self::Detailed => "detailed",
            Self::Simplified => "simplified",
        };
        f.write_str(name)
    }
}

impl FromStr for SummaryFormat {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullets" | "bullet" => Ok(Self::Bullets),
            "short" => Ok(Self::Short),
            "detailed" => Ok(Self::Detailed),
            "simplified" | "eli15" => Ok(Self::Simplified),
            other => Err(StudyError::InvalidInput(format!("unknown summary format '{other}'"))),
        }
    }
}

/// A generated summary and the documents it was drawn from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub text: String,
    pub format: SummaryFormat,
    pub sources: Vec<String>,
}

/// Summarizes a topic, or the whole corpus when no topic is given.
#[derive(Clone)]
pub struct Summarizer {
    retriever: Retriever,
    completion: CompletionGateway,
    options: CompletionOptions,
    top_k: usize,
    context_char_budget: usize,
}

impl Summarizer {
    pub fn new(
        retriever: Retriever,
        completion: CompletionGateway,
        options: CompletionOptions,
        top_k: usize,
        context_char_budget: usize,
    ) -> Self {
        Self { retriever, completion, options, top_k, context_char_budget }
    }

    /// Summarize `topic` (or everything indexed) in the requested format.
    ///
    /// The format only changes the generation template, never retrieval.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InsufficientContext`] when nothing is indexed or
    /// nothing relates to the topic, or a gateway error.
    pub async fn summarize(&self, topic: Option<&str>, format: SummaryFormat) -> Result<Summary> {
        let chunks =
            self.retriever.gather_context(topic, self.top_k, self.context_char_budget).await?;

        let context = prompts::plain_context(&chunks, self.context_char_budget);
        let chunks = &chunks[..context.chunk_count];
        let prompt =
            prompts::render(prompts::summary_template(format), &[("context", context.text.as_str())]);
        let text = self.completion.complete(&prompt, &self.options).await?;

        info!(topic = topic.unwrap_or(""), %format, chunk_count = chunks.len(), "summary generated");
        Ok(Summary { text: text.trim().to_string(), format, sources: unique_sources(chunks) })
    }
}

//! Grounded question answering with citations.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::completion::CompletionOptions;
use crate::document::ScoredChunk;
use crate::error::{Result, StudyError};
use crate::gateway::CompletionGateway;
use crate::prompts::{self, INSUFFICIENT_CONTEXT_ANSWER, QA_TEMPLATE};
use crate::retriever::Retriever;

/// A source reference attached to an answer.
///
/// Built from the retrieval result, never parsed out of model output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// The `[n]` marker used for this chunk in the prompt.
    pub marker: usize,
    pub document_id: String,
    pub source: String,
    pub chunk_id: String,
    pub sequence: usize,
    pub page: usize,
    /// Byte offset of the cited span in the document text.
    pub start: usize,
    /// Byte offset one past the cited span.
    pub end: usize,
    pub score: f32,
    pub excerpt: String,
}

impl Citation {
    fn from_hit(marker: usize, hit: &ScoredChunk) -> Self {
        let chunk = &hit.chunk;
        Self {
            marker,
            document_id: chunk.document_id.clone(),
            source: chunk.source.clone(),
            chunk_id: chunk.id.clone(),
            sequence: chunk.sequence,
            page: chunk.page,
            start: chunk.start,
            end: chunk.end,
            score: hit.score,
            excerpt: chunk.excerpt(),
        }
    }
}

/// The result of [`AnswerSynthesizer::answer`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
    /// `false` when no context was found and no model call was made.
    pub grounded: bool,
}

impl Answer {
    /// The fixed response for questions with no retrievable context.
    pub fn insufficient_context() -> Self {
        Self { text: INSUFFICIENT_CONTEXT_ANSWER.to_string(), citations: Vec::new(), grounded: false }
    }
}

/// Answers questions from retrieved context only.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    retriever: Retriever,
    completion: CompletionGateway,
    options: CompletionOptions,
    context_char_budget: usize,
}

impl AnswerSynthesizer {
    pub fn new(
        retriever: Retriever,
        completion: CompletionGateway,
        options: CompletionOptions,
        context_char_budget: usize,
    ) -> Self {
        Self { retriever, completion, options, context_char_budget }
    }

    /// Answer `question` from the top `k` retrieved chunks.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidInput`] for an empty question or zero
    /// `k`, or a gateway error if retrieval or generation fails after the
    /// gateway's retry.
    pub async fn answer(&self, question: &str, k: usize) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(StudyError::InvalidInput("question must not be empty".to_string()));
        }
        if k == 0 {
            return Err(StudyError::InvalidInput("k must be greater than zero".to_string()));
        }

        let hits = self.retriever.retrieve(question, k).await?;
        if hits.is_empty() {
            info!(question, "no context retrieved, returning insufficient-context answer");
            return Ok(Answer::insufficient_context());
        }

        let context =
            prompts::labelled_context(hits.iter().map(|h| &h.chunk), self.context_char_budget);
        if context.chunk_count < hits.len() {
            debug!(
                retrieved = hits.len(),
                in_prompt = context.chunk_count,
                "context budget reached, dropping trailing hits"
            );
        }
        let prompt =
            prompts::render(QA_TEMPLATE, &[("context", context.text.as_str()), ("question", question)]);
        let text = self.completion.complete(&prompt, &self.options).await.map_err(|e| {
            error!(error = %e, "answer generation failed");
            e
        })?;

        // Only chunks the model actually saw are cited.
        let citations: Vec<Citation> = hits[..context.chunk_count]
            .iter()
            .enumerate()
            .map(|(i, hit)| Citation::from_hit(i + 1, hit))
            .collect();
        info!(question, citation_count = citations.len(), "answer generated");

        Ok(Answer { text: text.trim().to_string(), citations, grounded: true })
    }
}

//! Read-side composition of the embedding gateway and the vector index.

use std::sync::Arc;

use tracing::{debug, error};

use crate::document::{Chunk, RetrievalResult};
use crate::error::{Result, StudyError};
use crate::gateway::EmbeddingGateway;
use crate::index::VectorIndex;

/// Embeds a query and returns the most similar indexed chunks.
///
/// Holds no state of its own beyond its collaborators.
#[derive(Clone)]
pub struct Retriever {
    embeddings: EmbeddingGateway,
    index: Arc<dyn VectorIndex>,
    min_similarity: f32,
}

impl Retriever {
    /// Compose a retriever. Hits scoring at or below `min_similarity` are discarded.
    pub fn new(embeddings: EmbeddingGateway, index: Arc<dyn VectorIndex>, min_similarity: f32) -> Self {
        Self { embeddings, index, min_similarity }
    }

    /// The underlying index.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Retrieve at most `k` relevant chunks for `query`.
    ///
    /// An empty index yields an empty result without calling the embedding
    /// gateway.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidInput`] for an empty query, or the
    /// gateway/index error.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if query.trim().is_empty() {
            return Err(StudyError::InvalidInput("query must not be empty".to_string()));
        }
        if self.index.is_empty().await {
            debug!(query, "index is empty, skipping retrieval");
            return Ok(Vec::new());
        }

        let vector = self.embeddings.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during retrieval");
            e
        })?;
        let mut hits = self.index.query(&vector, k).await?;
        hits.retain(|hit| hit.score > self.min_similarity);

        debug!(query, k, result_count = hits.len(), "retrieval completed");
        Ok(hits)
    }

    /// Context for corpus-wide tasks: the whole index when its text fits in
    /// `char_budget`, otherwise `sample_size` chunks spread evenly across it.
    pub async fn corpus_sample(&self, char_budget: usize, sample_size: usize) -> Vec<Chunk> {
        let chunks = self.index.chunks().await;
        let total_chars: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
        if total_chars <= char_budget || chunks.len() <= sample_size {
            return chunks;
        }
        evenly_spaced(&chunks, sample_size)
    }

    /// Context for topic-or-corpus tasks such as summaries and definitions.
    ///
    /// A non-empty `topic` retrieves the top `k` chunks; an absent or blank
    /// topic falls back to [`corpus_sample`](Self::corpus_sample).
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InsufficientContext`] when nothing is found.
    pub async fn gather_context(
        &self,
        topic: Option<&str>,
        k: usize,
        char_budget: usize,
    ) -> Result<Vec<Chunk>> {
        let chunks = match topic.map(str::trim).filter(|t| !t.is_empty()) {
            Some(topic) => {
                self.retrieve(topic, k).await?.into_iter().map(|hit| hit.chunk).collect()
            }
            None => self.corpus_sample(char_budget, k).await,
        };
        if chunks.is_empty() {
            return Err(StudyError::InsufficientContext(match topic {
                Some(topic) if !topic.trim().is_empty() => {
                    format!("no indexed content relates to '{}'", topic.trim())
                }
                _ => "no documents have been indexed".to_string(),
            }));
        }
        Ok(chunks)
    }
}

/// Unique source filenames in first-seen order.
pub(crate) fn unique_sources<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for chunk in chunks {
        if !sources.contains(&chunk.source) {
            sources.push(chunk.source.clone());
        }
    }
    sources
}

/// Pick `n` items at evenly spaced positions, starting with the first.
fn evenly_spaced<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    let len = items.len();
    (0..n.min(len)).map(|bucket| items[bucket * len / n].clone()).collect()
}

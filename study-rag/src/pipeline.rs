//! Study pipeline orchestrator.
//!
//! The [`StudyPipeline`] wires a [`Chunker`], the two gateways, a
//! [`VectorIndex`] and the generation components together from one
//! [`StudyConfig`].
//!
//! # Example
//!
//! ```rust,ignore
//! use study_rag::{StudyPipeline, StudyConfig, InMemoryVectorIndex, QuizRequest, Difficulty};
//!
//! let pipeline = StudyPipeline::builder()
//!     .config(StudyConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .completion_provider(Arc::new(my_model))
//!     .index(Arc::new(InMemoryVectorIndex::new()))
//!     .build()?;
//!
//! pipeline.ingest(&document).await?;
//! let answer = pipeline.answer("What is photosynthesis?", 3).await?;
//! let quiz = pipeline.generate_quiz(&QuizRequest::new("photosynthesis", 5, Difficulty::Easy)).await?;
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::answer::{Answer, AnswerSynthesizer};
use crate::chunking::{Chunker, RecursiveChunker};
use crate::completion::CompletionProvider;
use crate::config::StudyConfig;
use crate::definitions::{DefinitionExtractor, Definitions};
use crate::document::{Chunk, Document, DocumentSummary, IndexEntry, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, StudyError};
use crate::extract;
use crate::gateway::{CompletionGateway, EmbeddingGateway};
use crate::index::VectorIndex;
use crate::quiz::{GradedResult, Quiz, QuizEngine, QuizRequest};
use crate::retriever::Retriever;
use crate::summarize::{Summarizer, Summary, SummaryFormat};

/// Outcome of ingesting one document of a batch.
#[derive(Debug)]
pub struct IngestStatus {
    pub document_id: String,
    pub source: String,
    /// Number of chunks indexed, or why the document was rejected.
    pub outcome: Result<usize>,
}

impl IngestStatus {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// The study pipeline orchestrator.
///
/// Ingestion runs chunk → embed → index; every read operation runs
/// retrieve → prompt → generate → parse. Construct one via
/// [`StudyPipeline::builder()`].
pub struct StudyPipeline {
    config: StudyConfig,
    chunker: Arc<dyn Chunker>,
    embeddings: EmbeddingGateway,
    retriever: Retriever,
    answers: AnswerSynthesizer,
    summarizer: Summarizer,
    quiz: QuizEngine,
    definitions: DefinitionExtractor,
}

impl StudyPipeline {
    /// Create a new [`StudyPipelineBuilder`].
    pub fn builder() -> StudyPipelineBuilder {
        StudyPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Return a reference to the vector index.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        self.retriever.index()
    }

    /// Ingest a single document: chunk → embed → index.
    ///
    /// The document's chunks become visible to queries all at once. Returns
    /// the indexed chunks with embeddings attached.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidInput`] for a document with no text or an
    /// id that is already indexed, or the embedding/index error.
    pub async fn ingest(&self, document: &Document) -> Result<Vec<Chunk>> {
        if self.index().documents().await.iter().any(|d| d.document_id == document.id) {
            return Err(StudyError::InvalidInput(format!(
                "document '{}' is already indexed",
                document.id
            )));
        }

        let mut chunks = self.chunker.chunk(document).map_err(|e| {
            error!(document.id = %document.id, error = %e, "chunking failed during ingestion");
            e
        })?;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embeddings.embed_batch(&texts).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
            e
        })?;

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(&vectors)
            .map(|(chunk, vector)| IndexEntry::new(chunk.clone(), vector.clone()))
            .collect();
        self.index().upsert_batch(entries).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "upsert failed during ingestion");
            e
        })?;

        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
            chunk.embedding = Some(vector);
        }
        info!(document.id = %document.id, source = %document.source, chunk_count = chunks.len(), "ingested document");

        Ok(chunks)
    }

    /// Extract pages from an upload and ingest them as a new document.
    pub async fn ingest_bytes(&self, source: &str, bytes: &[u8], mime: &str) -> Result<Document> {
        let document = extract::document_from_bytes(source, bytes, mime)?;
        self.ingest(&document).await?;
        Ok(document)
    }

    /// Ingest several documents independently.
    ///
    /// A failing document does not stop the others; each gets its own status.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Vec<IngestStatus> {
        let mut statuses = Vec::with_capacity(documents.len());
        for document in documents {
            let outcome = self.ingest(document).await.map(|chunks| chunks.len());
            statuses.push(IngestStatus {
                document_id: document.id.clone(),
                source: document.source.clone(),
                outcome,
            });
        }
        let failed = statuses.iter().filter(|s| !s.is_ok()).count();
        info!(document_count = documents.len(), failed, "batch ingestion finished");
        statuses
    }

    /// Remove a document's chunks, returning how many were removed.
    pub async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let removed = self.index().delete_document(document_id).await.map_err(|e| {
            error!(document.id = document_id, error = %e, "delete failed");
            e
        })?;
        info!(document.id = document_id, removed, "deleted document");
        Ok(removed)
    }

    /// The indexed documents in insertion order.
    pub async fn documents(&self) -> Vec<DocumentSummary> {
        self.index().documents().await
    }

    /// Retrieve at most `k` chunks relevant to `query`.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        self.retriever.retrieve(query, k).await
    }

    /// Answer `question` from the top `k` chunks, with citations.
    pub async fn answer(&self, question: &str, k: usize) -> Result<Answer> {
        self.answers.answer(question, k).await
    }

    /// Summarize `topic`, or the whole corpus when `None`.
    pub async fn summarize(&self, topic: Option<&str>, format: SummaryFormat) -> Result<Summary> {
        self.summarizer.summarize(topic, format).await
    }

    /// Generate a multiple-choice quiz.
    pub async fn generate_quiz(&self, request: &QuizRequest) -> Result<Quiz> {
        self.quiz.generate(request).await
    }

    /// Grade a submission against `quiz`; `None` marks an unanswered question.
    pub fn grade_quiz(&self, quiz: &Quiz, submitted: &[Option<usize>]) -> Result<GradedResult> {
        self.quiz.grade(quiz, submitted)
    }

    /// Extract term definitions for `topic`, or from the whole corpus.
    pub async fn extract_definitions(&self, topic: Option<&str>) -> Result<Definitions> {
        self.definitions.extract(topic).await
    }
}

/// Builder for constructing a [`StudyPipeline`].
///
/// The config, both providers and the index are required. Without an
/// explicit chunker a [`RecursiveChunker`] is built from the config.
#[derive(Default)]
pub struct StudyPipelineBuilder {
    config: Option<StudyConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    completion_provider: Option<Arc<dyn CompletionProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl StudyPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: StudyConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the completion provider.
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`StudyPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Config`] if a required part is missing or the
    /// config is inconsistent.
    pub fn build(self) -> Result<StudyPipeline> {
        let config =
            self.config.ok_or_else(|| StudyError::Config("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| StudyError::Config("embedding_provider is required".to_string()))?;
        let completion_provider = self
            .completion_provider
            .ok_or_else(|| StudyError::Config("completion_provider is required".to_string()))?;
        let index =
            self.index.ok_or_else(|| StudyError::Config("index is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(
                RecursiveChunker::new(config.chunk_size, config.chunk_overlap)
                    .with_min_chunk_size(config.min_chunk_size),
            )
        });

        let embeddings = EmbeddingGateway::new(embedding_provider, config.gateway_timeout);
        let completion = CompletionGateway::new(completion_provider, config.gateway_timeout);
        let retriever = Retriever::new(embeddings.clone(), index, config.min_similarity);

        Ok(StudyPipeline {
            answers: AnswerSynthesizer::new(
                retriever.clone(),
                completion.clone(),
                config.answer_options.clone(),
                config.context_char_budget,
            ),
            summarizer: Summarizer::new(
                retriever.clone(),
                completion.clone(),
                config.summary_options.clone(),
                config.summary_top_k,
                config.context_char_budget,
            ),
            quiz: QuizEngine::new(
                retriever.clone(),
                completion.clone(),
                config.quiz_options.clone(),
                config.quiz_top_k,
                config.quiz_context_char_budget,
                (config.quiz_min_questions, config.quiz_max_questions),
            ),
            definitions: DefinitionExtractor::new(
                retriever.clone(),
                completion,
                config.summary_options.clone(),
                config.summary_top_k,
                config.context_char_budget,
            ),
            chunker,
            embeddings,
            retriever,
            config,
        })
    }
}

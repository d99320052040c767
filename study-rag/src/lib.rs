//! Retrieval-augmented study assistant.
//!
//! This crate provides:
//! - Boundary-aware document chunking with byte offsets and page numbers
//! - Time-bounded embedding and completion gateways with one retry
//! - In-memory and file-backed vector indexes with deterministic ranking
//! - Grounded answers with citations, summaries in four formats
//! - Multiple-choice quizzes with tolerant parsing, one repair pass and grading
//! - Definition extraction
//!
//! [`StudyPipeline`] composes all of it from a single [`StudyConfig`].
//!
//! # Features
//!
//! - `ollama` – [`ollama`] providers for a local Ollama server
//! - `pdf` – PDF text extraction in [`extract_pages`]

pub mod answer;
pub mod chunking;
pub mod completion;
pub mod config;
pub mod definitions;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod index;
pub mod inmemory;
pub mod persistent;
pub mod pipeline;
pub mod quiz;
pub mod retriever;
pub mod summarize;

mod prompts;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use answer::{Answer, AnswerSynthesizer, Citation};
pub use chunking::{Chunker, RecursiveChunker, split_spans};
pub use completion::{CompletionOptions, CompletionProvider};
pub use config::{StudyConfig, StudyConfigBuilder};
pub use definitions::{DefinitionEntry, DefinitionExtractor, Definitions, parse_definitions};
pub use document::{
    Chunk, Document, DocumentSummary, IndexEntry, PageStart, RetrievalResult, ScoredChunk,
    normalize_text, page_at,
};
pub use embedding::EmbeddingProvider;
pub use error::{Result, StudyError};
pub use extract::{ContentType, document_from_bytes, extract_pages};
pub use gateway::{CompletionGateway, EmbeddingGateway};
pub use index::VectorIndex;
pub use inmemory::{InMemoryVectorIndex, cosine_similarity};
pub use persistent::PersistentVectorIndex;
pub use pipeline::{IngestStatus, StudyPipeline, StudyPipelineBuilder};
pub use prompts::INSUFFICIENT_CONTEXT_ANSWER;
pub use quiz::{
    Difficulty, GradedResult, ParsedQuiz, QuestionResult, Quiz, QuizEngine, QuizQuestion,
    QuizReport, QuizRequest, QuizStage, Score, grade, parse_quiz_output,
};
pub use retriever::Retriever;
pub use summarize::{Summarizer, Summary, SummaryFormat};

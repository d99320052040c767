//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryVectorIndex`], a vector index backed by a
//! `BTreeMap` protected by a `tokio::sync::RwLock`. Writers are serialized
//! and readers share the lock, so a query always sees a complete state.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::document::{Chunk, DocumentSummary, IndexEntry, RetrievalResult, ScoredChunk};
use crate::error::{Result, StudyError};
use crate::index::VectorIndex;

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// The complete contents of an index; cloned and swapped as one value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub(crate) struct IndexState {
    dimensions: Option<usize>,
    next_ordinal: u64,
    /// Document id → insertion ordinal.
    documents: BTreeMap<String, u64>,
    /// Chunk id → entry.
    entries: BTreeMap<String, IndexEntry>,
}

impl IndexState {
    pub(crate) fn upsert(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut dimensions = self.dimensions;
        for entry in &entries {
            if entry.vector.is_empty() {
                return Err(StudyError::InvalidInput(format!(
                    "chunk '{}' has an empty vector",
                    entry.chunk.id
                )));
            }
            match dimensions {
                Some(dims) if dims != entry.vector.len() => {
                    return Err(StudyError::InvalidInput(format!(
                        "chunk '{}' has {} dimensions, index expects {dims}",
                        entry.chunk.id,
                        entry.vector.len()
                    )));
                }
                Some(_) => {}
                None => dimensions = Some(entry.vector.len()),
            }
        }

        self.dimensions = dimensions;
        for mut entry in entries {
            entry.chunk.embedding = None;
            if !self.documents.contains_key(&entry.chunk.document_id) {
                self.documents.insert(entry.chunk.document_id.clone(), self.next_ordinal);
                self.next_ordinal += 1;
            }
            if let Some(previous) = self.entries.insert(entry.chunk.id.clone(), entry) {
                self.forget_if_orphaned(&previous.chunk.document_id);
            }
        }
        Ok(())
    }

    pub(crate) fn delete_document(&mut self, document_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.chunk.document_id != document_id);
        self.documents.remove(document_id);
        if self.entries.is_empty() {
            self.dimensions = None;
        }
        before - self.entries.len()
    }

    pub(crate) fn query(&self, vector: &[f32], k: usize) -> Result<RetrievalResult> {
        if vector.is_empty() {
            return Err(StudyError::InvalidInput("query vector is empty".to_string()));
        }
        let Some(dims) = self.dimensions else {
            return Ok(Vec::new());
        };
        if dims != vector.len() {
            return Err(StudyError::InvalidInput(format!(
                "query vector has {} dimensions, index expects {dims}",
                vector.len()
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, u64, &IndexEntry)> = self
            .entries
            .values()
            .map(|entry| (cosine_similarity(&entry.vector, vector), self.ordinal(entry), entry))
            .collect();

        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.2.chunk.sequence.cmp(&b.2.chunk.sequence))
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.chunk.id.cmp(&b.2.chunk.id))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, _, entry)| ScoredChunk { chunk: entry.chunk.clone(), score })
            .collect())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn chunks(&self) -> Vec<Chunk> {
        let mut entries: Vec<&IndexEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| self.insertion_order(a, b));
        entries.into_iter().map(|entry| entry.chunk.clone()).collect()
    }

    pub(crate) fn documents(&self) -> Vec<DocumentSummary> {
        let mut summaries: Vec<(u64, DocumentSummary)> = self
            .documents
            .iter()
            .map(|(id, &ordinal)| {
                let mut source = String::new();
                let mut chunk_count = 0;
                for entry in self.entries.values().filter(|e| &e.chunk.document_id == id) {
                    source.clone_from(&entry.chunk.source);
                    chunk_count += 1;
                }
                (ordinal, DocumentSummary { document_id: id.clone(), source, chunk_count })
            })
            .collect();
        summaries.sort_by_key(|(ordinal, _)| *ordinal);
        summaries.into_iter().map(|(_, summary)| summary).collect()
    }

    fn ordinal(&self, entry: &IndexEntry) -> u64 {
        self.documents.get(&entry.chunk.document_id).copied().unwrap_or(u64::MAX)
    }

    fn insertion_order(&self, a: &IndexEntry, b: &IndexEntry) -> Ordering {
        self.ordinal(a)
            .cmp(&self.ordinal(b))
            .then_with(|| a.chunk.sequence.cmp(&b.chunk.sequence))
    }

    fn forget_if_orphaned(&mut self, document_id: &str) {
        if !self.entries.values().any(|e| e.chunk.document_id == document_id) {
            self.documents.remove(document_id);
        }
    }
}

/// An in-memory vector index using cosine similarity for search.
///
/// # Example
///
/// ```rust,ignore
/// use study_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.upsert(&chunk, vec![0.1, 0.2, 0.3]).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    state: RwLock<IndexState>,
}

impl InMemoryVectorIndex {
    /// Create a new empty in-memory index.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert_batch(&self, entries: Vec<IndexEntry>) -> Result<()> {
        self.state.write().await.upsert(entries)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        Ok(self.state.write().await.delete_document(document_id))
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<RetrievalResult> {
        self.state.read().await.query(vector, k)
    }

    async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    async fn chunks(&self) -> Vec<Chunk> {
        self.state.read().await.chunks()
    }

    async fn documents(&self) -> Vec<DocumentSummary> {
        self.state.read().await.documents()
    }
}

//! Vector index trait for storing chunk vectors and searching them.

use async_trait::async_trait;

use crate::document::{Chunk, DocumentSummary, IndexEntry, RetrievalResult};
use crate::error::Result;

/// A storage backend for chunk vectors with similarity search.
///
/// The index is the sole writer of its entries. Implementations must make
/// every call atomic with respect to concurrent callers: a query observes
/// either all or none of a concurrent batch upsert or document deletion.
///
/// # Example
///
/// ```rust,ignore
/// use study_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.upsert(&chunk, vector).await?;
/// let hits = index.query(&query_vector, 5).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace entries, keyed by chunk id. The batch is applied atomically.
    async fn upsert_batch(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Insert or replace one chunk's vector and metadata.
    async fn upsert(&self, chunk: &Chunk, vector: Vec<f32>) -> Result<()> {
        self.upsert_batch(vec![IndexEntry::new(chunk.clone(), vector)]).await
    }

    /// Remove every chunk of `document_id`, returning how many were removed.
    async fn delete_document(&self, document_id: &str) -> Result<usize>;

    /// Return at most `k` chunks ordered by descending cosine similarity.
    ///
    /// Ties are broken by lower chunk sequence, then earlier document
    /// insertion. An empty index yields an empty result.
    async fn query(&self, vector: &[f32], k: usize) -> Result<RetrievalResult>;

    /// Number of indexed chunks.
    async fn len(&self) -> usize;

    /// Whether the index holds no chunks.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All indexed chunks, ordered by document insertion then sequence.
    async fn chunks(&self) -> Vec<Chunk>;

    /// The indexed documents in insertion order.
    async fn documents(&self) -> Vec<DocumentSummary>;
}

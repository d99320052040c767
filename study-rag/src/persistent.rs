//! Durable vector index stored as JSON in a directory.
//!
//! [`PersistentVectorIndex`] keeps the same state as the in-memory index and
//! rewrites `index.json` after every mutation, while still holding the write
//! lock, so the file always matches what readers observe. A sibling
//! `metadata.json` lists the indexed sources for humans.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::document::{Chunk, DocumentSummary, IndexEntry, RetrievalResult};
use crate::error::{Result, StudyError};
use crate::index::VectorIndex;
use crate::inmemory::IndexState;

const INDEX_FILE: &str = "index.json";
const METADATA_FILE: &str = "metadata.json";
const FORMAT_VERSION: u32 = 1;
const BACKEND: &str = "Persistent";

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    state: IndexState,
}

#[derive(Serialize)]
struct StoreMetadata<'a> {
    num_chunks: usize,
    num_documents: usize,
    sources: Vec<&'a str>,
}

/// A vector index persisted under a stable directory.
///
/// Reopening the same directory reconstructs the index exactly: vectors
/// round-trip through JSON without loss, so queries return identical
/// results and scores.
///
/// # Example
///
/// ```rust,ignore
/// use study_rag::{PersistentVectorIndex, VectorIndex};
///
/// let index = PersistentVectorIndex::open("data/vector_store/study_materials").await?;
/// println!("{} chunks loaded", index.len().await);
/// ```
#[derive(Debug)]
pub struct PersistentVectorIndex {
    dir: PathBuf,
    state: RwLock<IndexState>,
}

impl PersistentVectorIndex {
    /// Open the index stored in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::VectorStore`] if an existing index file cannot be
    /// decoded or has an unknown format version, and [`StudyError::Io`] on
    /// filesystem failures.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(INDEX_FILE);
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => decode(&path, &bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexState::default(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %dir.display(), chunk_count = state.len(), "opened vector index");
        Ok(Self { dir, state: RwLock::new(state) })
    }

    /// The directory this index persists to.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write `state` to disk via a temporary file and an atomic rename.
    async fn persist(&self, state: &IndexState) -> Result<()> {
        let persisted = PersistedIndex { version: FORMAT_VERSION, state: state.clone() };
        let bytes = serde_json::to_vec(&persisted)?;
        let tmp = self.dir.join(format!("{INDEX_FILE}.tmp"));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, self.dir.join(INDEX_FILE)).await?;

        let documents = state.documents();
        let metadata = StoreMetadata {
            num_chunks: state.len(),
            num_documents: documents.len(),
            sources: documents.iter().map(|d| d.source.as_str()).collect(),
        };
        tokio::fs::write(self.dir.join(METADATA_FILE), serde_json::to_vec_pretty(&metadata)?)
            .await?;
        Ok(())
    }

    /// Apply `mutate` to a copy of the state, persist it, then publish it.
    async fn mutate<T>(&self, mutate: impl FnOnce(&mut IndexState) -> Result<T>) -> Result<T> {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let output = mutate(&mut next)?;
        self.persist(&next).await.map_err(|e| {
            error!(path = %self.dir.display(), error = %e, "failed to persist vector index");
            StudyError::VectorStore {
                backend: BACKEND.to_string(),
                message: format!("failed to persist index: {e}"),
            }
        })?;
        *guard = next;
        Ok(output)
    }
}

fn decode(path: &Path, bytes: &[u8]) -> Result<IndexState> {
    let persisted: PersistedIndex =
        serde_json::from_slice(bytes).map_err(|e| StudyError::VectorStore {
            backend: BACKEND.to_string(),
            message: format!("corrupt index file {}: {e}", path.display()),
        })?;
    if persisted.version != FORMAT_VERSION {
        return Err(StudyError::VectorStore {
            backend: BACKEND.to_string(),
            message: format!(
                "unsupported index format version {} in {}",
                persisted.version,
                path.display()
            ),
        });
    }
    Ok(persisted.state)
}

#[async_trait]
impl VectorIndex for PersistentVectorIndex {
    async fn upsert_batch(&self, entries: Vec<IndexEntry>) -> Result<()> {
        self.mutate(|state| state.upsert(entries)).await
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        self.mutate(|state| Ok(state.delete_document(document_id))).await
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

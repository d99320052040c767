//! Data types for documents, chunks, index entries and retrieval results.

use serde::{Deserialize, Serialize};

/// Separator placed between pages when a document's text is assembled.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// A source document: an ordered sequence of extracted pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The filename the document was uploaded as.
    pub source: String,
    /// Raw text of each page or section, in order.
    pub pages: Vec<String>,
}

impl Document {
    /// Create a document with a freshly generated identifier.
    pub fn new(source: impl Into<String>, pages: Vec<String>) -> Self {
        Self { id: uuid::Uuid::new_v4().to_string(), source: source.into(), pages }
    }

    /// Create a single-page document with a freshly generated identifier.
    pub fn from_text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(source, vec![text.into()])
    }

    /// Override the generated identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Normalize every page and join them into the text chunk offsets refer to.
    ///
    /// Also returns, for each retained page, the byte offset where it starts
    /// and its 1-based number in [`pages`](Self::pages). Pages that are empty
    /// after normalization are skipped but still counted.
    pub fn assemble(&self) -> (String, Vec<PageStart>) {
        let mut text = String::new();
        let mut page_starts = Vec::with_capacity(self.pages.len());
        for (index, page) in self.pages.iter().enumerate() {
            let page = normalize_text(page);
            if page.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push_str(PAGE_SEPARATOR);
            }
            page_starts.push(PageStart { offset: text.len(), number: index + 1 });
            text.push_str(&page);
        }
        (text, page_starts)
    }
}

/// Where a retained page begins in assembled document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStart {
    /// Byte offset in the assembled text.
    pub offset: usize,
    /// 1-based page number in the source document.
    pub number: usize,
}

/// The 1-based source page containing byte `offset`.
pub fn page_at(page_starts: &[PageStart], offset: usize) -> usize {
    match page_starts.partition_point(|p| p.offset <= offset) {
        0 => page_starts.first().map_or(1, |p| p.number),
        n => page_starts[n - 1].number,
    }
}

/// Clean extracted text without destroying paragraph structure.
///
/// Removes NUL characters, unifies line endings, trims trailing whitespace on
/// every line, collapses runs of blank lines into one, and trims the ends.
pub fn normalize_text(text: &str) -> String {
    let text = text.replace('\0', "").replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run > 0 {
                out.push('\n');
            }
        }
        blank_run = 0;
        out.push_str(line);
    }
    out.trim().to_string()
}

/// A bounded span of a [`Document`]'s text, the unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, `{document_id}_{sequence}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Filename of the parent document.
    pub source: String,
    /// The text content of the chunk.
    pub text: String,
    /// Position of the chunk within its document.
    pub sequence: usize,
    /// Byte offset of the chunk start in the assembled document text.
    pub start: usize,
    /// Byte offset one past the chunk end in the assembled document text.
    pub end: usize,
    /// 1-based page the chunk starts on.
    pub page: usize,
    /// The vector embedding, once computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Build the identifier for the chunk at `sequence` in `document_id`.
    pub fn make_id(document_id: &str, sequence: usize) -> String {
        format!("{document_id}_{sequence}")
    }

    /// A short excerpt for citations: the first 200 characters.
    pub fn excerpt(&self) -> String {
        const EXCERPT_CHARS: usize = 200;
        if self.text.chars().count() <= EXCERPT_CHARS {
            return self.text.clone();
        }
        let mut excerpt: String = self.text.chars().take(EXCERPT_CHARS).collect();
        excerpt.push_str("...");
        excerpt
    }
}

/// A chunk and its vector as stored by a [`VectorIndex`](crate::index::VectorIndex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The indexed chunk. Its `embedding` field is not populated inside the index.
    pub chunk: Chunk,
    /// The embedding vector used for similarity.
    pub vector: Vec<f32>,
}

impl IndexEntry {
    /// Pair a chunk with its vector, moving the vector out of the chunk if unset.
    pub fn new(mut chunk: Chunk, vector: Vec<f32>) -> Self {
        chunk.embedding = None;
        Self { chunk, vector }
    }

    /// Build an entry from a chunk that already carries its embedding.
    pub fn from_embedded(mut chunk: Chunk) -> Option<Self> {
        let vector = chunk.embedding.take()?;
        Some(Self { chunk, vector })
    }

    /// The owning document's identifier.
    pub fn document_id(&self) -> &str {
        &self.chunk.document_id
    }

    /// The owning document's filename.
    pub fn source(&self) -> &str {
        &self.chunk.source
    }

    /// The chunk's position within its document.
    pub fn sequence(&self) -> usize {
        self.chunk.sequence
    }
}

/// A retrieved [`Chunk`] paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

/// Ordered retrieval output, descending by score.
pub type RetrievalResult = Vec<ScoredChunk>;

/// Summary of one indexed document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentSummary {
    /// The document identifier.
    pub document_id: String,
    /// The document's filename.
    pub source: String,
    /// Number of chunks currently indexed for it.
    pub chunk_count: usize,
}

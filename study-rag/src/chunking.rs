//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! cuts text at the best natural boundary available inside each window:
//! paragraph, then line, then sentence, then whitespace, and only then a hard
//! cut at `chunk_size`. Every chunk records its byte range in the assembled
//! document text so citations can be reconstructed.

use std::ops::Range;

use crate::document::{Chunk, Document, page_at};
use crate::error::{Result, StudyError};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s without embeddings; embeddings are
/// attached later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidInput`] if the document has no text
    /// after normalization.
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>>;
}

/// Boundary separators, highest priority first.
const SEPARATORS: [&[&str]; 3] = [&["\n\n"], &["\n"], &[". ", "! ", "? "]];

/// Splits text hierarchically with overlap between consecutive chunks.
///
/// Chunk IDs are generated as `{document_id}_{sequence}`.
///
/// # Example
///
/// ```rust,ignore
/// use study_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 50);
/// let chunks = chunker.chunk(&document)?;
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    min_chunk_size: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of bytes per chunk
    /// * `chunk_overlap` - number of bytes shared between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap, min_chunk_size: chunk_size / 4 }
    }

    /// Set the minimum length of a non-final chunk.
    ///
    /// Boundaries closer than this to the chunk start are ignored.
    pub fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.min_chunk_size = min_chunk_size.min(self.chunk_size);
        self
    }

    /// Compute chunk byte ranges for already-normalized text.
    pub fn spans(&self, text: &str) -> Result<Vec<Range<usize>>> {
        split_spans(text, self.chunk_size, self.chunk_overlap, self.min_chunk_size)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        let (text, page_starts) = document.assemble();
        if text.is_empty() {
            return Err(StudyError::InvalidInput(format!(
                "document '{}' has no text after normalization",
                document.source
            )));
        }

        let chunks = self
            .spans(&text)?
            .into_iter()
            .enumerate()
            .map(|(sequence, span)| Chunk {
                id: Chunk::make_id(&document.id, sequence),
                document_id: document.id.clone(),
                source: document.source.clone(),
                text: text[span.clone()].to_string(),
                sequence,
                page: page_at(&page_starts, span.start),
                start: span.start,
                end: span.end,
                embedding: None,
            })
            .collect();

        Ok(chunks)
    }
}

/// Split `text` into overlapping byte ranges.
///
/// Every range starts and ends on a `char` boundary, each range after the
/// first starts at or before the previous range's end, and the final range
/// ends at `text.len()`.
///
/// # Errors
///
/// Returns [`StudyError::InvalidInput`] if `text` is empty, `chunk_size` is
/// zero, or `chunk_overlap >= chunk_size`.
pub fn split_spans(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    min_chunk_size: usize,
) -> Result<Vec<Range<usize>>> {
    if text.trim().is_empty() {
        return Err(StudyError::InvalidInput("cannot chunk empty text".to_string()));
    }
    if chunk_size == 0 {
        return Err(StudyError::InvalidInput("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(StudyError::InvalidInput(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }

    let len = text.len();
    let mut spans = Vec::new();
    let mut start = 0;

    loop {
        if len - start <= chunk_size {
            spans.push(start..len);
            break;
        }

        let mut hard_end = floor_boundary(text, start + chunk_size);
        if hard_end <= start {
            // A single char wider than chunk_size.
            hard_end = ceil_boundary(text, start + 1);
        }
        let lower = floor_boundary(
            text,
            (start + min_chunk_size.max(chunk_overlap + 1)).min(hard_end),
        )
        .max(start);
        let end = find_break(text, lower, hard_end).unwrap_or(hard_end);
        spans.push(start..end);

        if chunk_overlap == 0 {
            start = end;
            continue;
        }

        let mut next = ceil_boundary(text, end.saturating_sub(chunk_overlap));
        if next <= start {
            next = ceil_boundary(text, start + 1);
        }
        start = align_to_word(text, next, end);
        // The next window must reach past `end` without exceeding chunk_size.
        if floor_boundary(text, start + chunk_size) <= end {
            start = end;
        }
    }

    Ok(spans)
}

/// Find the best cut point in `(lower, upper]`.
///
/// Returns the position just after the last separator of the highest
/// priority kind that occurs in `text[lower..upper]`.
fn find_break(text: &str, lower: usize, upper: usize) -> Option<usize> {
    if lower >= upper {
        return None;
    }
    let window = &text[lower..upper];

    for group in SEPARATORS {
        let best = group
            .iter()
            .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
            .max();
        if let Some(cut) = best {
            return Some(lower + cut);
        }
    }

    window
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(pos, c)| lower + pos + c.len_utf8())
}

/// Move an overlap start forward to the beginning of a word when one
/// begins before `end`.
fn align_to_word(text: &str, start: usize, end: usize) -> usize {
    let at_word_start = text[..start].chars().next_back().is_none_or(char::is_whitespace);
    if at_word_start {
        return start;
    }
    text[start..end]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(pos, c)| start + pos + c.len_utf8())
        .filter(|&aligned| aligned < end)
        .unwrap_or(start)
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

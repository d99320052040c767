//! Turning uploaded bytes into document pages.

use tracing::debug;

use crate::document::Document;
use crate::error::{Result, StudyError};

/// Content types [`extract_pages`] understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    PlainText,
    Markdown,
    Pdf,
}

impl ContentType {
    /// Map a MIME type, ignoring parameters such as `charset`.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidInput`] for anything unsupported.
    pub fn from_mime(mime: &str) -> Result<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match essence.as_str() {
            "text/plain" => Ok(Self::PlainText),
            "text/markdown" | "text/x-markdown" => Ok(Self::Markdown),
            "application/pdf" => Ok(Self::Pdf),
            _ => Err(StudyError::InvalidInput(format!("unsupported content type '{mime}'"))),
        }
    }
}

/// Extract the pages of an uploaded file.
///
/// Text formats yield a single page. PDFs yield one entry per PDF page, blank
/// pages included, and need the `pdf` feature.
///
/// # Errors
///
/// Returns [`StudyError::InvalidInput`] for an unsupported type, text that is
/// not UTF-8, an unreadable PDF, or a PDF when the `pdf` feature is off.
pub fn extract_pages(bytes: &[u8], mime: &str) -> Result<Vec<String>> {
    let content_type = ContentType::from_mime(mime)?;
    let pages = match content_type {
        ContentType::PlainText | ContentType::Markdown => {
            let text = std::str::from_utf8(bytes).map_err(|e| {
                StudyError::InvalidInput(format!("document is not valid UTF-8: {e}"))
            })?;
            vec![text.strip_prefix('\u{feff}').unwrap_or(text).to_string()]
        }
        ContentType::Pdf => extract_pdf(bytes)?,
    };
    debug!(?content_type, byte_len = bytes.len(), page_count = pages.len(), "pages extracted");
    Ok(pages)
}

/// Build a [`Document`] straight from an upload.
pub fn document_from_bytes(source: impl Into<String>, bytes: &[u8], mime: &str) -> Result<Document> {
    Ok(Document::new(source, extract_pages(bytes, mime)?))
}

#[cfg(feature = "pdf")]
fn extract_pdf(bytes: &[u8]) -> Result<Vec<String>> {
    pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| StudyError::InvalidInput(format!("PDF parse error: {e}")))
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_bytes: &[u8]) -> Result<Vec<String>> {
    Err(StudyError::InvalidInput("PDF support requires the `pdf` feature".to_string()))
}

//! PDF text extraction for uploaded documents.
//!
//! Parsing is delegated to `pdf-extract`; this module only validates the
//! upload, runs the parser off the async runtime and normalizes the text.

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, error};

/// Largest accepted upload.
pub const MAX_PDF_BYTES: usize = 10 * 1024 * 1024;

const PDF_MIME: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{0} is empty")]
    Empty(String),

    #[error("{0} must be a PDF")]
    NotPdf(String),

    #[error("{field} is too large. Maximum size is {} MB", MAX_PDF_BYTES / (1024 * 1024))]
    TooLarge { field: String },

    #[error("Failed to extract text from {field}: {reason}")]
    Unreadable { field: String, reason: String },

    #[error("{0} appears to be empty or contains no extractable text")]
    NoText(String),
}

/// One uploaded file, as received from a multipart field.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    /// Form field the file arrived in; used in error messages.
    pub field: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl PdfUpload {
    fn looks_like_pdf(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) => ct.eq_ignore_ascii_case(PDF_MIME),
            None => self.bytes.starts_with(PDF_MAGIC),
        }
    }
}

pub fn validate_pdf(upload: &PdfUpload) -> Result<(), ExtractionError> {
    if upload.bytes.is_empty() {
        return Err(ExtractionError::Empty(upload.field.clone()));
    }
    if !upload.looks_like_pdf() {
        return Err(ExtractionError::NotPdf(upload.field.clone()));
    }
    if upload.bytes.len() > MAX_PDF_BYTES {
        return Err(ExtractionError::TooLarge {
            field: upload.field.clone(),
        });
    }
    Ok(())
}

/// Validates the upload and returns its cleaned text.
pub async fn extract_text(upload: PdfUpload) -> Result<String, ExtractionError> {
    validate_pdf(&upload)?;

    let PdfUpload { field, bytes, .. } = upload;

    // pdf-extract is CPU-bound and panics on some malformed inputs.
    let parsed = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
    })
    .await;

    let raw = match parsed {
        Ok(Ok(text)) => text,
        Ok(Err(reason)) => {
            error!("PDF extraction error for {field}: {reason}");
            return Err(ExtractionError::Unreadable { field, reason });
        }
        Err(join_error) => {
            error!("PDF parser aborted for {field}: {join_error}");
            return Err(ExtractionError::Unreadable {
                field,
                reason: "the document could not be parsed".to_string(),
            });
        }
    };

    let text = clean_text(&raw);
    if text.is_empty() {
        return Err(ExtractionError::NoText(field));
    }

    debug!("Extracted {} characters from {field}", text.chars().count());
    Ok(text)
}

/// Keeps letters, digits, `_`, whitespace and `-.,!?@()`; collapses every
/// whitespace run to one space and trims the ends.
pub fn clean_text(text: &str) -> String {
    let kept = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || "_-.,!?@()".contains(*c));

    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in kept {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}

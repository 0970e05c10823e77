//! PDF text extraction utilities.
//!
//! Extraction runs on the blocking thread pool: `pdf-extract` is CPU-bound and
//! may panic on malformed documents, which surfaces here as an error instead of
//! tearing down the worker.

use thiserror::Error;

/// Errors that can occur during PDF extraction
#[derive(Debug, Error)]
pub enum PdfExtractError {
    #[error("Document is empty")]
    Empty,

    #[error("Not a PDF document")]
    NotPdf,

    #[error("Failed to extract text from PDF: {0}")]
    ExtractionFailed(String),
}

/// Extract text from an in-memory PDF, keeping at most `max_chars` characters.
pub async fn extract_text(bytes: Vec<u8>, max_chars: usize) -> Result<String, PdfExtractError> {
    if bytes.is_empty() {
        return Err(PdfExtractError::Empty);
    }
    if !bytes.starts_with(b"%PDF") {
        return Err(PdfExtractError::NotPdf);
    }

    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| PdfExtractError::ExtractionFailed(format!("extractor aborted: {}", e)))?
        .map_err(|e| PdfExtractError::ExtractionFailed(e.to_string()))?;

    if text.trim().is_empty() {
        // Scanned or image-only PDFs extract to nothing
        tracing::debug!("Extracted empty text from PDF");
        return Err(PdfExtractError::Empty);
    }

    Ok(crate::utils::truncate_chars(&text, max_chars).to_string())
}

//! Utility modules supporting the digest pipeline.
//!
//! - [`HttpClient`]: shared HTTP client with per-collaborator timeouts
//! - [`with_retry`]: execute an operation with automatic retry on transient errors
//! - [`RetryConfig`]: configuration for retry logic with exponential backoff
//! - [`extract_text`]: extract text content from an in-memory PDF
//! - text helpers: whitespace normalisation, word/char truncation, JSON span extraction
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use paper_digest::sources::SourceError;
//! use paper_digest::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::default().max_attempts(3);
//! let result = with_retry(config, || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod pdf;
mod retry;
mod text;

pub use http::{HttpClient, DEFAULT_TIMEOUT};
pub use pdf::{extract_text, PdfExtractError};
pub use retry::{
    delivery_retry_config, enrichment_retry_config, llm_retry_config, source_retry_config,
    with_retry, RetryConfig, Retryable, TransientError,
};
pub use text::{
    extract_json_array, extract_json_object, normalize_whitespace, truncate_chars,
    truncate_words, word_count,
};

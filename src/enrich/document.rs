//! Full-text retrieval: download a paper's PDF and extract its text.

use async_trait::async_trait;
use std::time::Duration;

use crate::models::Paper;
use crate::utils::{
    enrichment_retry_config, extract_text, with_retry, HttpClient, PdfExtractError, RetryConfig,
    Retryable, TransientError,
};

/// Default cap on extracted characters per paper
pub const DEFAULT_MAX_CHARS: usize = 50_000;

/// Supplies the full text of a paper
#[async_trait]
pub trait FullTextSource: Send + Sync + std::fmt::Debug {
    async fn full_text(&self, paper: &Paper) -> Result<String, DocumentError>;
}

/// Errors while fetching or reading a paper's document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Paper has no PDF link")]
    NoDocument,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Download timed out after {0:?}")]
    Timeout(Duration),

    #[error("Download failed with status {0}")]
    Http(u16),

    #[error(transparent)]
    Extract(#[from] PdfExtractError),
}

impl Retryable for DocumentError {
    fn transient(&self) -> Option<TransientError> {
        match self {
            DocumentError::Network(_) => Some(TransientError::Network),
            DocumentError::Timeout(_) => Some(TransientError::Timeout),
            DocumentError::Http(status) => reqwest::StatusCode::from_u16(*status)
                .ok()
                .and_then(TransientError::from_status),
            DocumentError::NoDocument | DocumentError::Extract(_) => None,
        }
    }

    fn timed_out(after: Duration) -> Self {
        DocumentError::Timeout(after)
    }
}

impl From<reqwest::Error> for DocumentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DocumentError::Timeout(crate::utils::DEFAULT_TIMEOUT)
        } else {
            DocumentError::Network(err.to_string())
        }
    }
}

/// Downloads PDFs over HTTP and extracts their text
#[derive(Debug, Clone)]
pub struct PdfDownloader {
    client: HttpClient,
    max_chars: usize,
    retry: RetryConfig,
}

impl PdfDownloader {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            max_chars: DEFAULT_MAX_CHARS,
            retry: enrichment_retry_config(),
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, DocumentError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DocumentError::Http(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl FullTextSource for PdfDownloader {
    async fn full_text(&self, paper: &Paper) -> Result<String, DocumentError> {
        let url = paper.pdf_url.as_deref().ok_or(DocumentError::NoDocument)?;

        tracing::debug!("Downloading PDF for {}: {}", paper.paper_id, url);
        let bytes = with_retry(self.retry, || self.download(url)).await?;
        tracing::debug!("Downloaded {} bytes for {}", bytes.len(), paper.paper_id);

        Ok(extract_text(bytes, self.max_chars).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::make_paper;
    use chrono::Utc;

    fn downloader() -> PdfDownloader {
        PdfDownloader::new(HttpClient::new().unwrap()).with_retry_config(
            RetryConfig::default()
                .max_attempts(2)
                .delays(Duration::from_millis(1), Duration::from_millis(5)),
        )
    }

    #[tokio::test]
    async fn test_missing_pdf_link() {
        let mut paper = make_paper("2401.00001", Utc::now());
        paper.pdf_url = None;
        let result = downloader().full_text(&paper).await;
        assert!(matches!(result, Err(DocumentError::NoDocument)));
    }

    #[tokio::test]
    async fn test_non_pdf_body_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pdf/2401.00001")
            .with_status(200)
            .with_body("<html>captcha</html>")
            .create_async()
            .await;

        let mut paper = make_paper("2401.00001", Utc::now());
        paper.pdf_url = Some(format!("{}/pdf/2401.00001", server.url()));

        let result = downloader().full_text(&paper).await;
        assert!(matches!(
            result,
            Err(DocumentError::Extract(PdfExtractError::NotPdf))
        ));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pdf/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let mut paper = make_paper("missing", Utc::now());
        paper.pdf_url = Some(format!("{}/pdf/missing", server.url()));

        let result = downloader().full_text(&paper).await;
        mock.assert_async().await;
        assert!(matches!(result, Err(DocumentError::Http(404))));
    }
}

//! Preprint sources.
//!
//! A [`Source`] answers one question: which papers matching a topic were
//! published inside a date window. [`fetch_candidates`] fans that out over every
//! configured topic and merges the results into one deduplicated candidate list.

mod arxiv;
pub mod mock;

pub use arxiv::ArxivSource;
pub use mock::MockSource;

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

use crate::models::{DateWindow, FetchQuery, Paper};
use crate::utils::{Retryable, TransientError};

/// The Source trait defines the interface for preprint sources.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "arxiv")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Papers matching `topic` published inside `window`, newest first.
    ///
    /// `categories` is an allow-list; empty admits every category.
    async fn search_window(
        &self,
        topic: &str,
        window: &DateWindow,
        categories: &[String],
    ) -> Result<Vec<Paper>, SourceError>;
}

/// Fetch candidates for every topic and merge them.
///
/// Papers are deduplicated by identifier; the first occurrence wins, so the
/// merged list keeps fetch order (topic order, then source order). Any topic
/// failing after the source's own retries fails the whole fetch.
pub async fn fetch_candidates(
    source: &dyn Source,
    query: &FetchQuery,
) -> Result<Vec<Paper>, SourceError> {
    tracing::info!("Fetching {} papers published {}", source.name(), query.window);

    let mut seen = HashSet::new();
    let mut papers = Vec::new();

    for topic in &query.topics {
        let found = source
            .search_window(topic, &query.window, &query.categories)
            .await?;
        tracing::info!("Topic '{}': {} papers in date range", topic, found.len());

        for paper in found {
            if !query.window.contains(paper.published) {
                continue;
            }
            if seen.insert(paper.paper_id.clone()) {
                papers.push(paper);
            }
        }
    }

    tracing::info!(
        "Fetched {} unique papers from {}",
        papers.len(),
        source.name()
    );
    Ok(papers)
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// A single request exceeded its timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Parsing error (Atom feed, JSON)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// API error from the source
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl Retryable for SourceError {
    fn transient(&self) -> Option<TransientError> {
        match self {
            SourceError::Network(_) => Some(TransientError::Network),
            SourceError::Timeout(_) => Some(TransientError::Timeout),
            SourceError::RateLimit => Some(TransientError::RateLimit(None)),
            SourceError::Api { status, .. } => reqwest::StatusCode::from_u16(*status)
                .ok()
                .and_then(TransientError::from_status),
            SourceError::Parse(_) | SourceError::InvalidRequest(_) => None,
        }
    }

    fn timed_out(after: Duration) -> Self {
        SourceError::Timeout(after)
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(crate::utils::DEFAULT_TIMEOUT)
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

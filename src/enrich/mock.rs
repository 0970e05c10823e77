//! Canned enrichment collaborators for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{DocumentError, FullTextSource, SearchError, SearchHit, WebSearch};
use crate::models::Paper;

/// Web search returning the same hits for every query
#[derive(Debug, Clone, Default)]
pub struct StaticSearch {
    hits: Vec<SearchHit>,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl StaticSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Default::default()
        }
    }

    /// Fail every query with a network error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearch for StaticSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SearchError::Network("search unreachable".to_string()));
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

/// Full-text source returning fixed text, or failing when given none
#[derive(Debug, Clone, Default)]
pub struct StaticFullText {
    text: Option<String>,
}

impl StaticFullText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn failing() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl FullTextSource for StaticFullText {
    async fn full_text(&self, _paper: &Paper) -> Result<String, DocumentError> {
        self.text.clone().ok_or(DocumentError::Http(503))
    }
}

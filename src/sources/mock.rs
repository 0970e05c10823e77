//! Mock source for testing purposes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::{Author, DateWindow, Paper, PaperBuilder};
use crate::sources::{Source, SourceError};

/// A mock source that returns predefined papers per topic.
#[derive(Debug, Default)]
pub struct MockSource {
    papers: HashMap<String, Vec<Paper>>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockSource {
    /// Create a new mock source with no papers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Papers to return for `topic`.
    pub fn with_topic(mut self, topic: &str, papers: Vec<Paper>) -> Self {
        self.papers.insert(topic.to_string(), papers);
        self
    }

    /// Make every search fail as if the API were unreachable.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Number of searches issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    async fn search_window(
        &self,
        topic: &str,
        _window: &DateWindow,
        categories: &[String],
    ) -> Result<Vec<Paper>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SourceError::Network("connection refused".to_string()));
        }
        Ok(self
            .papers
            .get(topic)
            .map(|papers| {
                papers
                    .iter()
                    .filter(|p| p.in_categories(categories))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Helper function to create a mock paper for testing.
pub fn make_paper(paper_id: &str, published: DateTime<Utc>) -> Paper {
    PaperBuilder::new(
        paper_id,
        format!("Paper {}", paper_id),
        format!("https://arxiv.org/abs/{}", paper_id),
        published,
    )
    .abstract_text(format!("Abstract of paper {}.", paper_id))
    .author(Author::new("Ada Lovelace"))
    .pdf_url(format!("https://arxiv.org/pdf/{}.pdf", paper_id))
    .build()
}

//! Best-effort enrichment of selected papers.
//!
//! Each selected paper gets community feedback from a web search and its full
//! text from the PDF. Both are optional: a missing collaborator or a failed
//! call degrades the paper to abstract-only analysis and never stops the run.

mod document;
pub mod mock;
mod search;

pub use document::{DocumentError, FullTextSource, PdfDownloader, DEFAULT_MAX_CHARS};
pub use search::{
    feedback_query, format_feedback, SearchError, SearchHit, TavilySearch, WebSearch,
    SNIPPET_CHARS,
};

use std::sync::Arc;
use std::time::Duration;

use crate::config::EnrichmentConfig;
use crate::models::{EnrichedPaper, ScoredPaper};
use crate::utils::{enrichment_retry_config, HttpClient};

/// Outcome of enriching one paper
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub paper: EnrichedPaper,
    /// Reasons enrichment fell short, for the run report
    pub degraded: Vec<String>,
}

/// Gathers community feedback and full text for selected papers
#[derive(Debug, Clone)]
pub struct Enricher {
    search: Option<Arc<dyn WebSearch>>,
    documents: Option<Arc<dyn FullTextSource>>,
    max_search_results: usize,
    max_feedback_chars: usize,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}

impl Enricher {
    /// Enricher with no collaborators; every paper passes through bare
    pub fn new() -> Self {
        Self {
            search: None,
            documents: None,
            max_search_results: 5,
            max_feedback_chars: 2000,
        }
    }

    /// Build the configured collaborators
    ///
    /// Web search is enabled only with an API key; full text only when
    /// `full_text` is set.
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, reqwest::Error> {
        let mut enricher = Self::new().limits(config.max_search_results, config.max_feedback_chars);

        match &config.tavily_api_key {
            Some(key) => {
                let timeout = Duration::from_secs(config.search_timeout_secs);
                let search = TavilySearch::new(HttpClient::with_timeout(timeout)?, key.clone())
                    .with_endpoint(config.tavily_endpoint.clone())
                    .with_retry_config(enrichment_retry_config().attempt_timeout(timeout));
                enricher = enricher.with_search(Arc::new(search));
            }
            None => tracing::info!("No web search API key configured; skipping community feedback"),
        }

        if config.full_text {
            let timeout = Duration::from_secs(config.download_timeout_secs);
            let downloader = PdfDownloader::new(HttpClient::with_timeout(timeout)?)
                .with_max_chars(config.max_full_text_chars)
                .with_retry_config(enrichment_retry_config().attempt_timeout(timeout));
            enricher = enricher.with_documents(Arc::new(downloader));
        }

        Ok(enricher)
    }

    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_documents(mut self, documents: Arc<dyn FullTextSource>) -> Self {
        self.documents = Some(documents);
        self
    }

    /// Cap results per query and total feedback characters
    pub fn limits(mut self, max_search_results: usize, max_feedback_chars: usize) -> Self {
        self.max_search_results = max_search_results;
        self.max_feedback_chars = max_feedback_chars;
        self
    }

    /// Enrich one paper. Never fails.
    pub async fn enrich(&self, scored: ScoredPaper) -> Enrichment {
        let paper = &scored.paper;
        let mut degraded = Vec::new();

        let (feedback, full_text) = tokio::join!(
            async {
                let search = self.search.as_ref()?;
                Some(
                    search
                        .search(&feedback_query(paper), self.max_search_results)
                        .await,
                )
            },
            async {
                let documents = self.documents.as_ref()?;
                Some(documents.full_text(paper).await)
            }
        );

        let community_feedback = match feedback {
            Some(Ok(hits)) => format_feedback(&hits, self.max_feedback_chars),
            Some(Err(e)) => {
                tracing::warn!("Community feedback unavailable for {}: {}", paper.paper_id, e);
                degraded.push(format!("web search: {}", e));
                String::new()
            }
            None => String::new(),
        };

        let full_text = match full_text {
            Some(Ok(text)) => Some(text),
            Some(Err(e)) => {
                tracing::warn!(
                    "Full text unavailable for {}, using abstract only: {}",
                    paper.paper_id,
                    e
                );
                degraded.push(format!("full text: {}", e));
                None
            }
            None => None,
        };

        Enrichment {
            paper: EnrichedPaper {
                scored,
                community_feedback,
                full_text,
            },
            degraded,
        }
    }
}

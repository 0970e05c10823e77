//! arXiv research source implementation.

use async_trait::async_trait;
use feed_rs::parser;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

use crate::models::{Author, DateWindow, Paper, PaperBuilder};
use crate::sources::{Source, SourceError};
use crate::utils::{normalize_whitespace, source_retry_config, with_retry, HttpClient, RetryConfig};

/// Base URL for arXiv API
const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";
/// Base URL for arXiv PDFs
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";
/// Base URL for arXiv abstract pages
const ARXIV_ABS_URL: &str = "https://arxiv.org/abs";

/// arXiv caps a single response at this many entries
const PAGE_SIZE: usize = 200;
/// Never page deeper than this per topic
const MAX_PAGES: usize = 10;
/// arXiv asks clients to leave a few seconds between requests
const PAGE_DELAY: Duration = Duration::from_secs(3);

/// arXiv research source
///
/// Queries the Atom export API sorted by submission date (newest first) and
/// pages backwards until the window start is passed.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: HttpClient,
    base_url: String,
    retry: RetryConfig,
    page_size: usize,
    page_delay: Duration,
}

impl ArxivSource {
    /// Create a new arXiv source
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: ARXIV_API_URL.to_string(),
            retry: source_retry_config(),
            page_size: PAGE_SIZE,
            page_delay: PAGE_DELAY,
        }
    }

    /// Point at a different API endpoint (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the retry policy
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Override paging (for testing)
    pub fn with_paging(mut self, page_size: usize, page_delay: Duration) -> Self {
        self.page_size = page_size.clamp(1, PAGE_SIZE);
        self.page_delay = page_delay;
        self
    }

    /// Parse an arXiv ID from an entry id or URL, dropping the version suffix
    ///
    /// Handles formats like:
    /// - "2301.12345"
    /// - "2301.12345v1"
    /// - "http://arxiv.org/abs/2301.12345v2"
    /// - "http://arxiv.org/abs/math.GT/0104020v1"
    pub fn parse_id(id: &str) -> Result<String, SourceError> {
        static VERSION: OnceLock<Regex> = OnceLock::new();
        let version = VERSION.get_or_init(|| Regex::new(r"v\d+$").expect("static regex"));

        let id = id.trim();
        let id = match id.find("/abs/") {
            Some(pos) => &id[pos + 5..],
            None => id.strip_prefix("arXiv:").unwrap_or(id),
        };
        let id = version.replace(id, "");

        if id.is_empty() {
            return Err(SourceError::Parse("Empty arXiv ID".to_string()));
        }

        Ok(id.into_owned())
    }

    /// Build the query URL for one page of a topic search
    fn build_url(&self, topic: &str, start: usize) -> String {
        let search_query = format!("all:\"{}\"", topic.trim());
        format!(
            "{}?search_query={}&start={}&max_results={}&sortBy=submittedDate&sortOrder=descending",
            self.base_url,
            urlencoding::encode(&search_query),
            start,
            self.page_size
        )
    }

    /// Parse arXiv Atom feed entry into Paper
    fn parse_entry(entry: &feed_rs::model::Entry) -> Result<Paper, SourceError> {
        let paper_id = Self::parse_id(&entry.id)?;

        let published = entry
            .published
            .or(entry.updated)
            .ok_or_else(|| SourceError::Parse(format!("Missing publish date for {}", paper_id)))?;

        let title = entry
            .title
            .as_ref()
            .map(|t| normalize_whitespace(&t.content))
            .unwrap_or_default();

        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| normalize_whitespace(&s.content))
            .unwrap_or_default();

        let authors = entry
            .authors
            .iter()
            .map(|a| Author::new(normalize_whitespace(&a.name)))
            .collect();

        let pdf_url = entry
            .links
            .iter()
            .find(|l| l.media_type.as_deref() == Some("application/pdf"))
            .map(|l| l.href.clone())
            .unwrap_or_else(|| format!("{}/{}.pdf", ARXIV_PDF_URL, paper_id));

        let categories = entry
            .categories
            .iter()
            .map(|c| c.term.clone())
            .filter(|t| !t.is_empty())
            .collect();

        let mut builder = PaperBuilder::new(
            paper_id.clone(),
            title,
            format!("{}/{}", ARXIV_ABS_URL, paper_id),
            published,
        )
        .abstract_text(abstract_text)
        .authors(authors)
        .pdf_url(pdf_url)
        .categories(categories);

        if let Some(updated) = entry.updated {
            builder = builder.updated(updated);
        }

        Ok(builder.build())
    }

    /// Fetch and parse one page of results
    async fn fetch_page(&self, topic: &str, start: usize) -> Result<Vec<Paper>, SourceError> {
        let url = self.build_url(topic, start);
        tracing::debug!("arXiv query: topic='{}' start={} max={}", topic, start, self.page_size);

        let feed = with_retry(self.retry, || {
            let client = self.client.clone();
            let url = url.clone();
            async move {
                let response = client
                    .get(&url)
                    .header("Accept", "application/atom+xml")
                    .send()
                    .await?;

                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if !status.is_success() {
                    return Err(SourceError::Api {
                        status: status.as_u16(),
                        message: format!("arXiv API returned status: {}", status),
                    });
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))?;

                parser::parse(bytes.as_ref())
                    .map_err(|e| SourceError::Parse(format!("Failed to parse Atom feed: {}", e)))
            }
        })
        .await?;

        // A malformed entry should not cost the whole page
        Ok(feed
            .entries
            .iter()
            .filter_map(|entry| match Self::parse_entry(entry) {
                Ok(paper) => Some(paper),
                Err(e) => {
                    tracing::warn!("Skipping unparseable arXiv entry {}: {}", entry.id, e);
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    async fn search_window(
        &self,
        topic: &str,
        window: &DateWindow,
        categories: &[String],
    ) -> Result<Vec<Paper>, SourceError> {
        if topic.trim().is_empty() {
            return Err(SourceError::InvalidRequest("Empty search topic".to_string()));
        }

        let mut matching = Vec::new();

        for page in 0..MAX_PAGES {
            if page > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            let papers = self.fetch_page(topic, page * self.page_size).await?;
            let Some(oldest) = papers.iter().map(|p| p.published).min() else {
                break;
            };
            let exhausted = papers.len() < self.page_size;

            matching.extend(
                papers
                    .into_iter()
                    .filter(|p| window.contains(p.published) && p.in_categories(categories)),
            );

            if oldest < window.start || exhausted {
                break;
            }
        }

        Ok(matching)
    }
}

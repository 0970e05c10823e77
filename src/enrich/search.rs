//! Community feedback through web search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::Paper;
use crate::utils::{
    enrichment_retry_config, normalize_whitespace, truncate_chars, with_retry, HttpClient,
    RetryConfig, Retryable, TransientError,
};

/// Characters kept from each search result
pub const SNIPPET_CHARS: usize = 200;

/// A single web search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
        }
    }
}

/// A web search backend
#[async_trait]
pub trait WebSearch: Send + Sync + std::fmt::Debug {
    /// Return at most `max_results` hits for `query`
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Errors from the web search provider
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Search timed out after {0:?}")]
    Timeout(Duration),

    #[error("Search API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed search response: {0}")]
    Parse(String),
}

impl Retryable for SearchError {
    fn transient(&self) -> Option<TransientError> {
        match self {
            SearchError::Network(_) => Some(TransientError::Network),
            SearchError::Timeout(_) => Some(TransientError::Timeout),
            SearchError::Api { status, .. } => reqwest::StatusCode::from_u16(*status)
                .ok()
                .and_then(TransientError::from_status),
            SearchError::Parse(_) => None,
        }
    }

    fn timed_out(after: Duration) -> Self {
        SearchError::Timeout(after)
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout(crate::utils::DEFAULT_TIMEOUT)
        } else if err.is_decode() {
            SearchError::Parse(err.to_string())
        } else {
            SearchError::Network(err.to_string())
        }
    }
}

/// Query used to find discussion of a paper
pub fn feedback_query(paper: &Paper) -> String {
    format!("{} {} discussion review feedback", paper.title, paper.paper_id)
}

/// Render hits as `- title: snippet` lines, capped at `max_chars` overall
pub fn format_feedback(hits: &[SearchHit], max_chars: usize) -> String {
    let lines: Vec<String> = hits
        .iter()
        .filter(|hit| !hit.content.trim().is_empty())
        .map(|hit| {
            let content = normalize_whitespace(&hit.content);
            let title = normalize_whitespace(&hit.title);
            format!("- {}: {}", title, truncate_chars(&content, SNIPPET_CHARS))
        })
        .collect();

    truncate_chars(&lines.join("\n"), max_chars).to_string()
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Tavily search API client
#[derive(Debug, Clone)]
pub struct TavilySearch {
    client: HttpClient,
    endpoint: String,
    api_key: String,
    retry: RetryConfig,
}

impl TavilySearch {
    pub fn new(client: HttpClient, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: "https://api.tavily.com/search".to_string(),
            api_key: api_key.into(),
            retry: enrichment_retry_config(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn search_once(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let body = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: "basic",
            include_answer: false,
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message: truncate_chars(&message, 300).to_string(),
            });
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        let mut hits = parsed.results;
        hits.truncate(max_results);
        Ok(hits)
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        tracing::debug!("Web search: {}", query);
        with_retry(self.retry, || self.search_once(query, max_results)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_format_feedback_truncates_snippets() {
        let hits = vec![
            SearchHit::new("Blog", "https://a", "x".repeat(500)),
            SearchHit::new("Empty", "https://b", "  "),
            SearchHit::new("Forum", "https://c", "Great\n  results"),
        ];
        let text = format_feedback(&hits, 2000);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("- Blog: {}", "x".repeat(SNIPPET_CHARS)));
        assert_eq!(lines[1], "- Forum: Great results");
    }

    #[test]
    fn test_format_feedback_caps_total_length() {
        let hits: Vec<SearchHit> = (0..20)
            .map(|i| SearchHit::new(format!("Hit {}", i), "https://a", "y".repeat(300)))
            .collect();
        assert_eq!(format_feedback(&hits, 1000).chars().count(), 1000);
        assert_eq!(format_feedback(&[], 1000), "");
    }

    #[test]
    fn test_feedback_query() {
        let paper = crate::models::PaperBuilder::new("2401.00001", "Agents", "u", Utc::now()).build();
        assert_eq!(
            feedback_query(&paper),
            "Agents 2401.00001 discussion review feedback"
        );
    }

    #[tokio::test]
    async fn test_tavily_search_parses_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "api_key": "tvly-test",
                "search_depth": "basic"
            })))
            .with_status(200)
            .with_body(
                r#"{"results":[
                    {"title":"Thread","url":"https://x.com/1","content":"People like it","score":0.9},
                    {"title":"Review","url":"https://y.com/2","content":"Solid baseline"}
                ]}"#,
            )
            .create_async()
            .await;

        let search = TavilySearch::new(HttpClient::new().unwrap(), "tvly-test")
            .with_endpoint(format!("{}/search", server.url()));
        let hits = search.search("agents", 5).await.unwrap();

        mock.assert_async().await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Thread");
        assert_eq!(hits[1].content, "Solid baseline");
    }

    #[tokio::test]
    async fn test_tavily_auth_error_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let search = TavilySearch::new(HttpClient::new().unwrap(), "bad")
            .with_endpoint(format!("{}/search", server.url()));
        let result = search.search("agents", 5).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(SearchError::Api { status: 401, .. })));
    }
}

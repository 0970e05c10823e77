//! The digest pipeline.
//!
//! One run moves a candidate set through fixed stages:
//!
//! ```text
//! fetch -> filter (batched) -> score (batched) -> select top-K
//!       -> enrich + analyze (per paper, bounded) -> dispatch
//! ```
//!
//! Batch stages fail open: a failed filter batch keeps its papers, a failed
//! score batch gets the neutral score. Per-paper failures drop only that
//! paper. Only an unreachable source, a missing delivery channel, or delivery
//! failing on every channel fails the run as a whole.

mod analyzer;
pub mod batch;
mod filter;
mod scorer;
mod selector;

pub use analyzer::{Analyzer, EXCERPT_CHARS};
pub use batch::{BatchOutcome, BatchStats};
pub use filter::{BatchFilter, FilterReport};
pub use scorer::{BatchScorer, ScoreReport};
pub use selector::select;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::enrich::Enricher;
use crate::llm::{CompletionClient, OpenAiClient};
use crate::models::{DateWindow, DigestEntry, FetchQuery, ScoredPaper};
use crate::notify::{DispatchReport, Dispatcher, Notification};
use crate::sources::{fetch_candidates, ArxivSource, Source, SourceError};
use crate::utils::{llm_retry_config, source_retry_config, HttpClient};

/// A recoverable failure inside one stage; recorded, never fatal
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageError {
    #[error("Filter batch {batch} failed: {reason}")]
    FilterCallFailed { batch: usize, reason: String },

    #[error("Score batch {batch} failed: {reason}")]
    ScoreCallFailed { batch: usize, reason: String },

    #[error("Enrichment degraded for {paper_id}: {reason}")]
    EnrichmentDegraded { paper_id: String, reason: String },

    #[error("Analysis failed for {paper_id}: {reason}")]
    AnalysisCallFailed { paper_id: String, reason: String },
}

/// A failure that ends the run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No notification channel configured (set email or webhook settings)")]
    NoChannelConfigured,

    #[error("Paper source unavailable: {0}")]
    SourceUnavailable(#[source] SourceError),

    #[error("Delivery failed on every channel: {summary}")]
    DeliveryFailed {
        summary: String,
        report: Box<RunReport>,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// What happened during one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub window: DateWindow,
    /// Unique candidates inside the window
    pub fetched: usize,
    /// Filter survivors
    pub kept: usize,
    /// Papers chosen for analysis
    pub selected: usize,
    pub filter: BatchStats,
    pub scorer: BatchStats,
    /// Failed batches and dropped papers
    pub failures: Vec<StageError>,
    /// Papers analyzed without feedback or full text
    pub degraded: Vec<StageError>,
    /// Delivered digest, in selection order
    pub entries: Vec<DigestEntry>,
    /// Status message sent instead of a digest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DispatchReport>,
}

impl RunReport {
    fn new(window: DateWindow) -> Self {
        Self {
            window,
            fetched: 0,
            kept: 0,
            selected: 0,
            filter: BatchStats::default(),
            scorer: BatchStats::default(),
            failures: Vec::new(),
            degraded: Vec::new(),
            entries: Vec::new(),
            notice: None,
            delivery: None,
        }
    }

    /// Selected papers that did not make it into the digest
    pub fn analysis_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f, StageError::AnalysisCallFailed { .. }))
            .count()
    }

    /// Some stage lost work but the run still delivered
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Explain a run that has nothing to digest
pub fn status_message(reason: &str, report: &RunReport, neutral_score: u8) -> String {
    let mut lines = vec![
        reason.to_string(),
        String::new(),
        format!("Window: {}", report.window),
        format!("Papers fetched: {}", report.fetched),
    ];

    if report.filter.total_batches > 0 {
        lines.push(format!("Papers kept by filter: {}", report.kept));
        lines.push(format!(
            "Filter batches failed: {}/{}",
            report.filter.failed_batches, report.filter.total_batches
        ));
    }
    if report.scorer.total_batches > 0 {
        lines.push(format!(
            "Scorer batches failed: {}/{}",
            report.scorer.failed_batches, report.scorer.total_batches
        ));
        if report.scorer.failed_batches > 0 {
            lines.push(format!(
                "Papers in failed scorer batches received the neutral score of {}.",
                neutral_score
            ));
        }
    }
    if report.selected > 0 {
        lines.push(format!("Papers selected: {}", report.selected));
        lines.push(format!("Papers that failed analysis: {}", report.analysis_failures()));
    }

    lines.join("\n")
}

/// Runs the digest pipeline end to end
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    source: Arc<dyn Source>,
    llm: Arc<dyn CompletionClient>,
    enricher: Enricher,
    dispatcher: Dispatcher,
}

impl Pipeline {
    /// Pipeline with no enrichment and no delivery channels
    pub fn new(config: Config, source: Arc<dyn Source>, llm: Arc<dyn CompletionClient>) -> Self {
        Self {
            config: Arc::new(config),
            source,
            llm,
            enricher: Enricher::new(),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Wire up the production collaborators from configuration
    pub fn from_config(config: Config) -> Result<Self, PipelineError> {
        let source_timeout = Duration::from_secs(config.search.timeout_secs);
        let source = ArxivSource::new(HttpClient::with_timeout(source_timeout)?)
            .with_retry_config(source_retry_config().attempt_timeout(source_timeout));

        let llm_timeout = Duration::from_secs(config.llm.timeout_secs);
        let llm = OpenAiClient::new(
            HttpClient::with_timeout(llm_timeout)?,
            config.llm.endpoint.clone(),
            config.llm.api_key.clone(),
        )
        .with_temperature(config.llm.temperature)
        .with_retry_config(llm_retry_config().attempt_timeout(llm_timeout));

        let enricher = Enricher::from_config(&config.enrichment)?;
        let dispatcher = Dispatcher::from_config(&config.notify)?;

        Ok(Self::new(config, Arc::new(source), Arc::new(llm))
            .with_enricher(enricher)
            .with_dispatcher(dispatcher))
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute one run
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        if self.dispatcher.is_empty() {
            return Err(PipelineError::NoChannelConfigured);
        }

        let config = &self.config;
        let llm = self.llm.as_ref();

        let window = DateWindow::trailing(
            config.search.days_start,
            config.search.days_end,
            chrono::Utc::now(),
        );
        let query = FetchQuery::new(config.search.topics.clone(), window)
            .categories(config.search.categories.clone());
        let mut report = RunReport::new(window);

        let papers = fetch_candidates(self.source.as_ref(), &query)
            .await
            .map_err(PipelineError::SourceUnavailable)?;
        report.fetched = papers.len();
        if papers.is_empty() {
            return self
                .finish_empty(report, &format!("No papers found for the window {}.", window))
                .await;
        }

        let filtered = BatchFilter::new(llm, config).run(papers).await;
        report.filter = filtered.stats;
        report.kept = filtered.kept.len();
        report.failures.extend(filtered.failures);
        if filtered.kept.is_empty() {
            return self
                .finish_empty(report, "No papers passed the relevance filter.")
                .await;
        }

        let scored = BatchScorer::new(llm, config).run(filtered.kept).await;
        report.scorer = scored.stats;
        report.failures.extend(scored.failures);

        let selected = select(
            scored.scored,
            config.pipeline.score_threshold,
            config.pipeline.max_items,
        );
        report.selected = selected.len();
        tracing::info!(
            "Selected {} papers (threshold {}, max {})",
            selected.len(),
            config.pipeline.score_threshold,
            config.pipeline.max_items
        );
        if selected.is_empty() {
            let reason = format!(
                "No papers reached the score threshold of {}.",
                config.pipeline.score_threshold
            );
            return self.finish_empty(report, &reason).await;
        }

        for (paper_id, degraded, result) in self.analyze_selected(selected).await {
            report.degraded.extend(
                degraded
                    .into_iter()
                    .map(|reason| StageError::EnrichmentDegraded {
                        paper_id: paper_id.clone(),
                        reason,
                    }),
            );
            match result {
                Ok(entry) => report.entries.push(entry),
                Err(e) => {
                    tracing::warn!("Dropping paper from digest: {}", e);
                    report.failures.push(e);
                }
            }
        }

        if report.entries.is_empty() {
            let reason = format!("Analysis failed for all {} selected papers.", report.selected);
            return self.finish_empty(report, &reason).await;
        }

        let notification = Notification::Digest(report.entries.clone());
        self.deliver(report, notification).await
    }

    /// Enrich and analyze each selected paper, a bounded number at a time
    ///
    /// Results come back in selection order.
    async fn analyze_selected(
        &self,
        selected: Vec<ScoredPaper>,
    ) -> Vec<(String, Vec<String>, Result<DigestEntry, StageError>)> {
        let analyzer = Analyzer::new(self.llm.as_ref(), &self.config);
        let analyzer = &analyzer;

        stream::iter(selected)
            .map(|scored| async move {
                let paper_id = scored.paper.paper_id.clone();
                let enrichment = self.enricher.enrich(scored).await;
                let result = analyzer.analyze(&enrichment.paper).await;
                (paper_id, enrichment.degraded, result)
            })
            .buffered(self.config.pipeline.paper_concurrency.max(1))
            .collect()
            .await
    }

    async fn finish_empty(
        &self,
        mut report: RunReport,
        reason: &str,
    ) -> Result<RunReport, PipelineError> {
        tracing::info!("{}", reason);
        let message = status_message(reason, &report, self.config.pipeline.neutral_score);
        report.notice = Some(message.clone());

        if !self.config.pipeline.notify_on_empty {
            tracing::info!("Status notices disabled; nothing sent");
            return Ok(report);
        }
        self.deliver(report, Notification::Status(message)).await
    }

    async fn deliver(
        &self,
        mut report: RunReport,
        notification: Notification,
    ) -> Result<RunReport, PipelineError> {
        let delivery = self.dispatcher.dispatch(&notification).await;
        let delivered = delivery.any_succeeded();
        let summary = delivery.summary();
        report.delivery = Some(delivery);

        if delivered {
            Ok(report)
        } else {
            Err(PipelineError::DeliveryFailed {
                summary,
                report: Box::new(report),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;
    use crate::sources::MockSource;
    use chrono::Utc;

    #[tokio::test]
    async fn test_no_channel_fails_before_any_call() {
        let source = Arc::new(MockSource::new());
        let llm = Arc::new(MockLlm::unreachable());
        let pipeline = Pipeline::new(Config::template(), source.clone(), llm.clone());

        let result = pipeline.run().await;

        assert!(matches!(result, Err(PipelineError::NoChannelConfigured)));
        assert_eq!(source.calls(), 0);
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn test_status_message_counts() {
        let mut report = RunReport::new(DateWindow::trailing(7, 0, Utc::now()));
        report.fetched = 40;
        report.kept = 12;
        report.filter = BatchStats {
            total_batches: 2,
            failed_batches: 0,
        };
        report.scorer = BatchStats {
            total_batches: 2,
            failed_batches: 1,
        };

        let message = status_message("No papers reached the score threshold of 50.", &report, 50);

        assert!(message.starts_with("No papers reached the score threshold of 50."));
        assert!(message.contains("Papers fetched: 40"));
        assert!(message.contains("Papers kept by filter: 12"));
        assert!(message.contains("Filter batches failed: 0/2"));
        assert!(message.contains("Scorer batches failed: 1/2"));
        assert!(message.contains("neutral score of 50"));
        assert!(!message.contains("Papers selected"));
    }

    #[test]
    fn test_stage_error_serializes_with_kind() {
        let error = StageError::AnalysisCallFailed {
            paper_id: "2401.00001".to_string(),
            reason: "timeout".to_string(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["kind"], "analysis_call_failed");
        assert_eq!(json["paper_id"], "2401.00001");
    }
}

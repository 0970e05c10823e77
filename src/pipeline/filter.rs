//! Batch relevance filter.
//!
//! Cheap first pass: the filter model sees titles and abstracts in batches and
//! names the papers worth scoring. A batch whose call fails is kept whole, so
//! an outage never silently empties the digest.

use serde::Deserialize;

use super::batch::{matches_id, run_batches, BatchOutcome, BatchStats};
use super::StageError;
use crate::config::Config;
use crate::llm::{CompletionClient, CompletionRequest};
use crate::models::Paper;
use crate::utils::{extract_json_array, extract_json_object, normalize_whitespace};

const SYSTEM_PROMPT: &str = "You are a research assistant screening new preprints for a reader. \
Given the reader's acceptance criteria and a list of papers, decide which papers are worth a closer look. \
Be inclusive: drop only papers that are clearly unrelated to the criteria. \
Respond with JSON only, in the form {\"keep\": [\"<paper id>\", ...]}.";

#[derive(Debug, Deserialize)]
struct KeepList {
    keep: Vec<String>,
}

/// Result of the filter stage
#[derive(Debug, Clone, Default)]
pub struct FilterReport {
    /// Survivors, in input order
    pub kept: Vec<Paper>,
    pub stats: BatchStats,
    pub failures: Vec<StageError>,
}

/// Runs the filter model over candidate papers
#[derive(Debug)]
pub struct BatchFilter<'a> {
    llm: &'a dyn CompletionClient,
    config: &'a Config,
}

impl<'a> BatchFilter<'a> {
    pub fn new(llm: &'a dyn CompletionClient, config: &'a Config) -> Self {
        Self { llm, config }
    }

    pub async fn run(&self, papers: Vec<Paper>) -> FilterReport {
        let outcomes = run_batches(
            &papers,
            self.config.pipeline.filter_batch_size,
            self.config.llm.concurrency,
            |index, batch| self.filter_batch(index, batch),
        )
        .await;

        let mut report = FilterReport {
            stats: BatchStats::from_outcomes(&outcomes),
            ..Default::default()
        };

        let batches = papers.chunks(self.config.pipeline.filter_batch_size.max(1));
        for (index, (outcome, batch)) in outcomes.into_iter().zip(batches).enumerate() {
            match outcome {
                BatchOutcome::Completed(keep) => report.kept.extend(
                    batch
                        .iter()
                        .zip(keep)
                        .filter(|(_, keep)| *keep)
                        .map(|(paper, _)| paper.clone()),
                ),
                BatchOutcome::Failed { reason } => {
                    tracing::warn!(
                        "Filter batch {} failed, keeping its {} papers: {}",
                        index,
                        batch.len(),
                        reason
                    );
                    report.kept.extend(batch.iter().cloned());
                    report.failures.push(StageError::FilterCallFailed { batch: index, reason });
                }
            }
        }

        tracing::info!(
            "Filter kept {} of {} papers ({} of {} batches failed)",
            report.kept.len(),
            papers.len(),
            report.stats.failed_batches,
            report.stats.total_batches
        );
        report
    }

    /// Keep flag per paper in `batch`
    async fn filter_batch(&self, index: usize, batch: &[Paper]) -> BatchOutcome<Vec<bool>> {
        let request = CompletionRequest::new(
            &self.config.llm.filter_model,
            SYSTEM_PROMPT,
            build_prompt(&self.config.pipeline.acceptance_criteria, batch),
        );

        let response = match self.llm.complete(&request).await {
            Ok(response) => response,
            Err(e) => return BatchOutcome::Failed { reason: e.to_string() },
        };

        match parse_keep_list(&response) {
            Some(ids) => {
                let keep: Vec<bool> = batch
                    .iter()
                    .map(|paper| ids.iter().any(|id| matches_id(id, &paper.paper_id)))
                    .collect();
                tracing::debug!(
                    "Filter batch {}: kept {} of {}",
                    index,
                    keep.iter().filter(|k| **k).count(),
                    batch.len()
                );
                BatchOutcome::Completed(keep)
            }
            None => BatchOutcome::Failed {
                reason: format!(
                    "unparseable filter response: {}",
                    crate::utils::truncate_chars(&response, 200)
                ),
            },
        }
    }
}

fn build_prompt(criteria: &str, batch: &[Paper]) -> String {
    let mut prompt = format!("Acceptance criteria:\n{}\n\nPapers:\n", criteria.trim());
    for paper in batch {
        prompt.push_str(&format!(
            "\nID: {}\nTitle: {}\nAbstract: {}\n",
            paper.paper_id,
            normalize_whitespace(&paper.title),
            normalize_whitespace(&paper.r#abstract)
        ));
    }
    prompt.push_str("\nReturn the IDs of the papers to keep.");
    prompt
}

/// Accepts `{"keep": [...]}` or a bare array of IDs
fn parse_keep_list(response: &str) -> Option<Vec<String>> {
    if let Some(object) = extract_json_object(response) {
        if let Ok(list) = serde_json::from_str::<KeepList>(object) {
            return Some(list.keep);
        }
    }
    extract_json_array(response).and_then(|array| serde_json::from_str::<Vec<String>>(array).ok())
}

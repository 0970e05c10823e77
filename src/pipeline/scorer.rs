//! Batch relevance scoring.

use serde::Deserialize;
use serde_json::Value;

use super::batch::{matches_id, run_batches, BatchOutcome, BatchStats};
use super::StageError;
use crate::config::Config;
use crate::llm::{CompletionClient, CompletionRequest};
use crate::models::{clamp_score, Paper, ScoredPaper, MAX_SCORE, MIN_SCORE};
use crate::utils::{extract_json_array, normalize_whitespace, truncate_chars};

const SYSTEM_PROMPT: &str = "You are a research assistant ranking preprints for a reader. \
Score every paper from 1 (irrelevant) to 100 (must read) against the reader's acceptance criteria, \
weighing relevance, novelty and likely impact. \
Respond with a JSON array only, one object per paper: \
[{\"id\": \"<paper id>\", \"score\": <1-100>, \"justification\": \"<one sentence>\"}].";

#[derive(Debug, Deserialize)]
struct ScoreLine {
    id: String,
    #[serde(default)]
    score: Value,
    #[serde(default)]
    justification: Option<String>,
}

/// Read a score that may arrive as an integer, a float or a numeric string
pub(crate) fn numeric_score(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then(|| number.round() as i64)
}

/// Result of the scoring stage
#[derive(Debug, Clone, Default)]
pub struct ScoreReport {
    /// One entry per input paper, in input order
    pub scored: Vec<ScoredPaper>,
    pub stats: BatchStats,
    pub failures: Vec<StageError>,
    /// Papers that got the neutral score or a clamped score inside a successful batch
    pub adjusted: usize,
}

#[derive(Debug)]
struct BatchScores {
    /// Per paper: clamped score or `None` when the model left it out
    scores: Vec<Option<(u8, Option<String>)>>,
    clamped: usize,
}

/// Assigns every filter survivor a relevance score
#[derive(Debug)]
pub struct BatchScorer<'a> {
    llm: &'a dyn CompletionClient,
    config: &'a Config,
}

impl<'a> BatchScorer<'a> {
    pub fn new(llm: &'a dyn CompletionClient, config: &'a Config) -> Self {
        Self { llm, config }
    }

    pub async fn run(&self, papers: Vec<Paper>) -> ScoreReport {
        let batch_size = self.config.pipeline.scorer_batch_size.max(1);
        let neutral = self.config.pipeline.neutral_score.clamp(MIN_SCORE, MAX_SCORE);

        let outcomes = run_batches(&papers, batch_size, self.config.llm.concurrency, |index, batch| {
            self.score_batch(index, batch)
        })
        .await;

        let mut report = ScoreReport {
            stats: BatchStats::from_outcomes(&outcomes),
            ..Default::default()
        };

        let total = papers.len();
        let mut remaining = papers.into_iter();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            let batch: Vec<Paper> = remaining.by_ref().take(batch_size).collect();
            match outcome {
                BatchOutcome::Completed(result) => {
                    report.adjusted += result.clamped;
                    for (paper, score) in batch.into_iter().zip(result.scores) {
                        let scored = match score {
                            Some((score, justification)) => {
                                let scored = ScoredPaper::new(paper, score);
                                match justification {
                                    Some(j) => scored.with_justification(j),
                                    None => scored,
                                }
                            }
                            None => {
                                tracing::warn!(
                                    "Scorer omitted {}, assigning neutral score {}",
                                    paper.paper_id,
                                    neutral
                                );
                                report.adjusted += 1;
                                ScoredPaper::new(paper, neutral)
                            }
                        };
                        report.scored.push(scored);
                    }
                }
                BatchOutcome::Failed { reason } => {
                    tracing::warn!(
                        "Score batch {} failed, assigning neutral score {} to {} papers: {}",
                        index,
                        neutral,
                        batch.len(),
                        reason
                    );
                    report
                        .scored
                        .extend(batch.into_iter().map(|paper| ScoredPaper::new(paper, neutral)));
                    report.failures.push(StageError::ScoreCallFailed { batch: index, reason });
                }
            }
        }

        tracing::info!(
            "Scored {} papers ({} of {} batches failed, {} adjusted)",
            total,
            report.stats.failed_batches,
            report.stats.total_batches,
            report.adjusted
        );
        report
    }

    async fn score_batch(&self, index: usize, batch: &[Paper]) -> BatchOutcome<BatchScores> {
        let request = CompletionRequest::new(
            &self.config.llm.scorer_model,
            SYSTEM_PROMPT,
            build_prompt(&self.config.pipeline.acceptance_criteria, batch),
        );

        let response = match self.llm.complete(&request).await {
            Ok(response) => response,
            Err(e) => return BatchOutcome::Failed { reason: e.to_string() },
        };

        let Some(lines) = extract_json_array(&response)
            .and_then(|array| serde_json::from_str::<Vec<ScoreLine>>(array).ok())
        else {
            return BatchOutcome::Failed {
                reason: format!("unparseable scorer response: {}", truncate_chars(&response, 200)),
            };
        };

        let mut clamped = 0;
        let scores = batch
            .iter()
            .map(|paper| {
                let line = lines.iter().find(|line| matches_id(&line.id, &paper.paper_id))?;
                let raw = numeric_score(&line.score)?;
                let score = clamp_score(raw);
                if i64::from(score) != raw {
                    tracing::warn!(
                        "Score {} for {} out of range, clamped to {}",
                        raw,
                        paper.paper_id,
                        score
                    );
                    clamped += 1;
                }
                Some((score, line.justification.clone()))
            })
            .collect();

        tracing::debug!("Score batch {}: {} papers scored", index, batch.len());
        BatchOutcome::Completed(BatchScores { scores, clamped })
    }
}

fn build_prompt(criteria: &str, batch: &[Paper]) -> String {
    let mut prompt = format!("Acceptance criteria:\n{}\n\nPapers:\n", criteria.trim());
    for paper in batch {
        prompt.push_str(&format!(
            "\nID: {}\nTitle: {}\nAuthors: {}\nCategories: {}\nAbstract: {}\n",
            paper.paper_id,
            normalize_whitespace(&paper.title),
            paper.author_names(),
            paper.categories.join(", "),
            normalize_whitespace(&paper.r#abstract)
        ));
    }
    prompt.push_str("\nScore every paper listed above.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlm};
    use crate::sources::mock::make_paper;
    use chrono::Utc;

    fn papers(n: usize) -> Vec<Paper> {
        (0..n)
            .map(|i| make_paper(&format!("2401.{:05}", i), Utc::now()))
            .collect()
    }

    fn config(batch_size: usize) -> Config {
        let mut config = Config::template();
        config.pipeline.scorer_batch_size = batch_size;
        config.pipeline.neutral_score = 50;
        config
    }

    fn scores(report: &ScoreReport) -> Vec<(String, u8)> {
        report
            .scored
            .iter()
            .map(|s| (s.paper.paper_id.clone(), s.score))
            .collect()
    }

    #[test]
    fn test_numeric_score() {
        assert_eq!(numeric_score(&serde_json::json!(87)), Some(87));
        assert_eq!(numeric_score(&serde_json::json!(72.6)), Some(73));
        assert_eq!(numeric_score(&serde_json::json!(" 64 ")), Some(64));
        assert_eq!(numeric_score(&serde_json::json!("high")), None);
        assert_eq!(numeric_score(&Value::Null), None);
    }

    #[tokio::test]
    async fn test_scores_follow_input_order() {
        let llm = MockLlm::new(|_| {
            Ok(r#"[
                {"id": "2401.00002", "score": 91, "justification": "Core topic"},
                {"id": "2401.00000", "score": 40},
                {"id": "2401.00001", "score": "77"}
            ]"#
            .to_string())
        });
        let config = config(10);

        let report = BatchScorer::new(&llm, &config).run(papers(3)).await;

        assert_eq!(
            scores(&report),
            vec![
                ("2401.00000".to_string(), 40),
                ("2401.00001".to_string(), 77),
                ("2401.00002".to_string(), 91),
            ]
        );
        assert_eq!(report.scored[2].justification.as_deref(), Some("Core topic"));
        assert_eq!(report.adjusted, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_and_missing_scores() {
        let llm = MockLlm::new(|_| {
            Ok(r#"[{"id": "2401.00000", "score": 150}, {"id": "2401.00001", "score": -3}]"#.to_string())
        });
        let config = config(10);

        let report = BatchScorer::new(&llm, &config).run(papers(3)).await;

        assert_eq!(
            scores(&report),
            vec![
                ("2401.00000".to_string(), 100),
                ("2401.00001".to_string(), 1),
                ("2401.00002".to_string(), 50),
            ]
        );
        assert_eq!(report.adjusted, 3);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_gets_neutral_score() {
        let llm = MockLlm::new(|request| {
            if request.user.contains("ID: 2401.00000") {
                Ok(r#"[{"id": "2401.00000", "score": 80}, {"id": "2401.00001", "score": 30}]"#.to_string())
            } else {
                Err(LlmError::Timeout(std::time::Duration::from_secs(180)))
            }
        });
        let config = config(2);

        let report = BatchScorer::new(&llm, &config).run(papers(3)).await;

        assert_eq!(
            scores(&report),
            vec![
                ("2401.00000".to_string(), 80),
                ("2401.00001".to_string(), 30),
                ("2401.00002".to_string(), 50),
            ]
        );
        assert_eq!(report.stats.total_batches, 2);
        assert_eq!(report.stats.failed_batches, 1);
        assert!(matches!(
            report.failures[0],
            StageError::ScoreCallFailed { batch: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_every_paper_scored_exactly_once() {
        let llm = MockLlm::new(|_| Ok("not json".to_string()));
        let config = config(4);

        let report = BatchScorer::new(&llm, &config).run(papers(10)).await;

        assert_eq!(report.scored.len(), 10);
        assert!(report.scored.iter().all(|s| s.score == 50));
        assert_eq!(report.stats.total_batches, 3);
        assert_eq!(report.stats.failed_batches, 3);
    }
}

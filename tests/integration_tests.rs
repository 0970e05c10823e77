//! Integration tests for Paper Digest
//!
//! These tests drive the whole pipeline with in-memory collaborators: a mock
//! source, a scripted completion client and recording notifiers.

use chrono::{Duration as ChronoDuration, Utc};
use paper_digest::config::Config;
use paper_digest::enrich::mock::{StaticFullText, StaticSearch};
use paper_digest::enrich::{Enricher, SearchHit};
use paper_digest::llm::{CompletionRequest, LlmError, MockLlm};
use paper_digest::notify::{Channel, Dispatcher, MockNotifier, Notification};
use paper_digest::pipeline::{Pipeline, PipelineError, StageError};
use paper_digest::sources::mock::make_paper;
use paper_digest::sources::MockSource;
use paper_digest::utils::RetryConfig;
use paper_digest::Paper;
use std::sync::Arc;
use std::time::Duration;

const TOPIC: &str = "llm agents";

fn test_config() -> Config {
    let mut config = Config::template();
    config.search.topics = vec![TOPIC.to_string()];
    config.search.categories = Vec::new();
    config.search.days_start = 7;
    config.search.days_end = 0;
    config.llm.filter_model = "filter-model".to_string();
    config.llm.scorer_model = "scorer-model".to_string();
    config.llm.analyzer_model = "analyzer-model".to_string();
    config.pipeline.acceptance_criteria = "Autonomous LLM agents".to_string();
    config.pipeline.score_threshold = 50;
    config.pipeline.max_items = 2;
    config.pipeline.neutral_score = 50;
    config.pipeline.notify_on_empty = true;
    config
}

fn recent_papers(ids: &[&str]) -> Vec<Paper> {
    ids.iter()
        .map(|id| make_paper(id, Utc::now() - ChronoDuration::days(1)))
        .collect()
}

fn fast_retry() -> RetryConfig {
    RetryConfig::default()
        .max_attempts(2)
        .delays(Duration::from_millis(1), Duration::from_millis(2))
}

fn dispatcher(notifiers: &[&MockNotifier]) -> Dispatcher {
    notifiers.iter().fold(
        Dispatcher::new().with_retry_config(fast_retry()),
        |dispatcher, notifier| dispatcher.with_notifier(Arc::new((*notifier).clone())),
    )
}

fn analysis_json(rating: u8) -> String {
    serde_json::json!({
        "summary": "The paper proposes a planning loop for tool-using agents.",
        "authors_affiliations": "Ada Lovelace (Analytical Engines Ltd)",
        "rating": rating,
        "rating_justification": "Clear method and convincing ablations.",
        "community_reputation": "Discussed positively on forums."
    })
    .to_string()
}

/// Completion client that keeps everything, scores from `scores`, and rates
/// each analyzed paper with its score plus one. Papers listed in
/// `failing_analysis` get a transport error from the analyzer.
fn scripted_llm(scores: &'static [(&'static str, i64)], failing_analysis: &'static [&'static str]) -> MockLlm {
    MockLlm::new(move |request: &CompletionRequest| match request.model.as_str() {
        "filter-model" => {
            let ids: Vec<&str> = scores.iter().map(|(id, _)| *id).collect();
            Ok(serde_json::json!({ "keep": ids }).to_string())
        }
        "scorer-model" => {
            let lines: Vec<serde_json::Value> = scores
                .iter()
                .filter(|(id, _)| request.user.contains(&format!("ID: {}", id)))
                .map(|(id, score)| serde_json::json!({"id": id, "score": score, "justification": "fit"}))
                .collect();
            Ok(serde_json::Value::Array(lines).to_string())
        }
        "analyzer-model" => {
            for id in failing_analysis {
                if request.user.contains(&format!("Title: Paper {}", id)) {
                    return Err(LlmError::Network("connection reset".to_string()));
                }
            }
            let score = scores
                .iter()
                .find(|(id, _)| request.user.contains(&format!("Title: Paper {}\n", id)))
                .map(|(_, score)| *score as u8)
                .unwrap_or(50);
            Ok(analysis_json(score.saturating_add(1)))
        }
        other => Err(LlmError::Api {
            status: 404,
            message: format!("unknown model {}", other),
        }),
    })
}

// Scenario A: three papers, all kept, scores [90, 40, 70], threshold 50, cap 2

#[tokio::test]
async fn test_digest_contains_top_scored_papers_in_order() {
    const SCORES: &[(&str, i64)] = &[("2401.00001", 90), ("2401.00002", 40), ("2401.00003", 70)];

    let source = Arc::new(MockSource::new().with_topic(
        TOPIC,
        recent_papers(&["2401.00001", "2401.00002", "2401.00003"]),
    ));
    let llm = Arc::new(scripted_llm(SCORES, &[]));
    let email = MockNotifier::new(Channel::Email);

    let pipeline = Pipeline::new(test_config(), source, llm.clone()).with_dispatcher(dispatcher(&[&email]));
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.fetched, 3);
    assert_eq!(report.kept, 3);
    assert_eq!(report.selected, 2);
    assert!(!report.is_partial());

    let scores: Vec<u8> = report.entries.iter().map(|e| e.selection_score).collect();
    assert_eq!(scores, vec![90, 70]);
    let ids: Vec<&str> = report.entries.iter().map(|e| e.paper_id.as_str()).collect();
    assert_eq!(ids, vec!["2401.00001", "2401.00003"]);
    assert_eq!(report.entries[0].rating, 91);

    // One filter call, one scorer call, two analyses
    assert_eq!(llm.call_count(), 4);

    let sent = email.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Notification::Digest(entries) => assert_eq!(entries, &report.entries),
        other => panic!("expected digest, got {:?}", other),
    }
}

// Scenario B: nothing fetched

#[tokio::test]
async fn test_empty_fetch_sends_status_notice() {
    let source = Arc::new(MockSource::new());
    let llm = Arc::new(MockLlm::unreachable());
    let webhook = MockNotifier::new(Channel::Webhook);

    let pipeline =
        Pipeline::new(test_config(), source.clone(), llm.clone()).with_dispatcher(dispatcher(&[&webhook]));
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.fetched, 0);
    assert!(report.entries.is_empty());
    assert_eq!(source.calls(), 1);
    assert_eq!(llm.call_count(), 0);

    let sent = webhook.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Notification::Status(message) => {
            assert!(message.starts_with("No papers found"));
            assert!(message.contains("Papers fetched: 0"));
        }
        other => panic!("expected status notice, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_fetch_without_status_notice() {
    let mut config = test_config();
    config.pipeline.notify_on_empty = false;
    let webhook = MockNotifier::new(Channel::Webhook);

    let pipeline = Pipeline::new(config, Arc::new(MockSource::new()), Arc::new(MockLlm::unreachable()))
        .with_dispatcher(dispatcher(&[&webhook]));
    let report = pipeline.run().await.unwrap();

    assert!(report.notice.is_some());
    assert!(report.delivery.is_none());
    assert!(webhook.sent().is_empty());
}

// Scenario C: one analysis fails

#[tokio::test]
async fn test_failed_analysis_drops_only_that_paper() {
    const SCORES: &[(&str, i64)] = &[("2401.00001", 90), ("2401.00002", 40), ("2401.00003", 70)];

    let source = Arc::new(MockSource::new().with_topic(
        TOPIC,
        recent_papers(&["2401.00001", "2401.00002", "2401.00003"]),
    ));
    let llm = Arc::new(scripted_llm(SCORES, &["2401.00003"]));
    let email = MockNotifier::new(Channel::Email);

    let pipeline = Pipeline::new(test_config(), source, llm).with_dispatcher(dispatcher(&[&email]));
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.selected, 2);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].paper_id, "2401.00001");
    assert!(report.is_partial());
    assert_eq!(report.analysis_failures(), 1);
    assert!(matches!(
        &report.failures[0],
        StageError::AnalysisCallFailed { paper_id, .. } if paper_id == "2401.00003"
    ));
    assert!(matches!(&email.sent()[0], Notification::Digest(entries) if entries.len() == 1));
}

// Scenario D: no channel configured

#[tokio::test]
async fn test_missing_channel_fails_before_any_call() {
    let source = Arc::new(MockSource::new().with_topic(TOPIC, recent_papers(&["2401.00001"])));
    let llm = Arc::new(MockLlm::unreachable());

    let pipeline = Pipeline::new(test_config(), source.clone(), llm.clone());
    let result = pipeline.run().await;

    assert!(matches!(result, Err(PipelineError::NoChannelConfigured)));
    assert_eq!(source.calls(), 0);
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_source_outage_is_fatal() {
    let llm = Arc::new(MockLlm::unreachable());
    let webhook = MockNotifier::new(Channel::Webhook);

    let pipeline = Pipeline::new(test_config(), Arc::new(MockSource::new().failing()), llm.clone())
        .with_dispatcher(dispatcher(&[&webhook]));
    let result = pipeline.run().await;

    assert!(matches!(result, Err(PipelineError::SourceUnavailable(_))));
    assert_eq!(llm.call_count(), 0);
    assert!(webhook.sent().is_empty());
}

#[tokio::test]
async fn test_llm_outage_fails_open_until_analysis() {
    // Filter and scorer fail open; every selected paper then fails analysis
    let source = Arc::new(MockSource::new().with_topic(
        TOPIC,
        recent_papers(&["2401.00001", "2401.00002", "2401.00003"]),
    ));
    let webhook = MockNotifier::new(Channel::Webhook);

    let pipeline = Pipeline::new(test_config(), source, Arc::new(MockLlm::unreachable()))
        .with_dispatcher(dispatcher(&[&webhook]));
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.kept, 3);
    assert_eq!(report.filter.failed_batches, 1);
    assert_eq!(report.scorer.failed_batches, 1);
    // Neutral score 50 meets the threshold; the first two by input order are kept
    assert_eq!(report.selected, 2);
    assert!(report.entries.is_empty());
    assert_eq!(report.analysis_failures(), 2);

    match &webhook.sent()[0] {
        Notification::Status(message) => {
            assert!(message.contains("Analysis failed for all 2 selected papers."));
            assert!(message.contains("neutral score of 50"));
        }
        other => panic!("expected status notice, got {:?}", other),
    }
}

#[tokio::test]
async fn test_enrichment_failures_never_abort() {
    const SCORES: &[(&str, i64)] = &[("2401.00001", 80)];

    let source = Arc::new(MockSource::new().with_topic(TOPIC, recent_papers(&["2401.00001"])));
    let llm = Arc::new(scripted_llm(SCORES, &[]));
    let email = MockNotifier::new(Channel::Email);
    let enricher = Enricher::new()
        .with_search(Arc::new(StaticSearch::failing()))
        .with_documents(Arc::new(StaticFullText::failing()));

    let pipeline = Pipeline::new(test_config(), source, llm.clone())
        .with_enricher(enricher)
        .with_dispatcher(dispatcher(&[&email]));
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.degraded.len(), 2);
    assert!(report.failures.is_empty());

    let analysis = llm
        .requests()
        .into_iter()
        .find(|r| r.model == "analyzer-model")
        .unwrap();
    assert!(analysis.user.contains("Full text unavailable"));
}

#[tokio::test]
async fn test_enrichment_reaches_the_analyzer() {
    const SCORES: &[(&str, i64)] = &[("2401.00001", 80)];

    let source = Arc::new(MockSource::new().with_topic(TOPIC, recent_papers(&["2401.00001"])));
    let llm = Arc::new(scripted_llm(SCORES, &[]));
    let email = MockNotifier::new(Channel::Email);
    let enricher = Enricher::new()
        .with_search(Arc::new(StaticSearch::new(vec![SearchHit::new(
            "Reading group notes",
            "https://example.com/notes",
            "Strong baseline, weak on long horizons.",
        )])))
        .with_documents(Arc::new(StaticFullText::new("1 Introduction\nAgents that plan ...")));

    let pipeline = Pipeline::new(test_config(), source, llm.clone())
        .with_enricher(enricher)
        .with_dispatcher(dispatcher(&[&email]));
    let report = pipeline.run().await.unwrap();

    assert!(report.degraded.is_empty());
    let analysis = llm
        .requests()
        .into_iter()
        .find(|r| r.model == "analyzer-model")
        .unwrap();
    assert!(analysis
        .user
        .contains("- Reading group notes: Strong baseline, weak on long horizons."));
    assert!(analysis.user.contains("1 Introduction"));
}

#[tokio::test]
async fn test_delivery_failure_on_every_channel() {
    const SCORES: &[(&str, i64)] = &[("2401.00001", 80)];

    let source = Arc::new(MockSource::new().with_topic(TOPIC, recent_papers(&["2401.00001"])));
    let email = MockNotifier::new(Channel::Email).failing();
    let webhook = MockNotifier::new(Channel::Webhook).failing();

    let pipeline = Pipeline::new(test_config(), source, Arc::new(scripted_llm(SCORES, &[])))
        .with_dispatcher(dispatcher(&[&email, &webhook]));

    match pipeline.run().await {
        Err(PipelineError::DeliveryFailed { summary, report }) => {
            assert!(summary.contains("email: failed"));
            assert!(summary.contains("webhook: failed"));
            assert_eq!(report.entries.len(), 1);
        }
        other => panic!("expected DeliveryFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_one_channel_failing_still_succeeds() {
    const SCORES: &[(&str, i64)] = &[("2401.00001", 80)];

    let source = Arc::new(MockSource::new().with_topic(TOPIC, recent_papers(&["2401.00001"])));
    let email = MockNotifier::new(Channel::Email).failing();
    let webhook = MockNotifier::new(Channel::Webhook);

    let pipeline = Pipeline::new(test_config(), source, Arc::new(scripted_llm(SCORES, &[])))
        .with_dispatcher(dispatcher(&[&email, &webhook]));
    let report = pipeline.run().await.unwrap();

    let delivery = report.delivery.unwrap();
    assert!(delivery.any_succeeded());
    assert_eq!(delivery.failures().count(), 1);
    assert_eq!(webhook.sent().len(), 1);
}

#[tokio::test]
async fn test_papers_outside_window_are_ignored() {
    let mut papers = recent_papers(&["2401.00001"]);
    papers.push(make_paper("2301.00009", Utc::now() - ChronoDuration::days(30)));
    let source = Arc::new(MockSource::new().with_topic(TOPIC, papers));
    let webhook = MockNotifier::new(Channel::Webhook);
    const SCORES: &[(&str, i64)] = &[("2401.00001", 80)];

    let pipeline = Pipeline::new(test_config(), source, Arc::new(scripted_llm(SCORES, &[])))
        .with_dispatcher(dispatcher(&[&webhook]));
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.fetched, 1);
    assert_eq!(report.entries[0].paper_id, "2401.00001");
}

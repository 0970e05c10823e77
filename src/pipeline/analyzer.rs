//! Per-paper deep analysis with the stronger model.

use serde::Deserialize;
use serde_json::Value;

use super::scorer::numeric_score;
use super::StageError;
use crate::config::Config;
use crate::llm::{CompletionClient, CompletionRequest};
use crate::models::{clamp_score, DigestEntry, EnrichedPaper, MAX_FIELD_WORDS};
use crate::utils::{extract_json_object, normalize_whitespace, truncate_chars, truncate_words};

/// Characters of full text included in the prompt
pub const EXCERPT_CHARS: usize = 15_000;

const NO_FEEDBACK: &str = "No community discussion found.";

const SYSTEM_PROMPT: &str = "You are an expert research analyst writing a short digest entry for a busy reader. \
Using the paper content and any community feedback provided, respond with a JSON object only, with these fields:\n\
- \"summary\": the problem, method and key results, at most 100 words\n\
- \"authors_affiliations\": authors with their institutions where the text shows them\n\
- \"rating\": an integer from 1 to 100 judging quality and relevance to the reader's criteria\n\
- \"rating_justification\": why this rating, at most 100 words\n\
- \"community_reputation\": what others are saying, at most 100 words; say so if nothing was found";

#[derive(Debug, Deserialize)]
struct Analysis {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    authors_affiliations: Option<String>,
    #[serde(default)]
    rating: Value,
    #[serde(default)]
    rating_justification: String,
    #[serde(default, alias = "community_summary")]
    community_reputation: String,
}

/// Turns an enriched paper into a digest entry
#[derive(Debug)]
pub struct Analyzer<'a> {
    llm: &'a dyn CompletionClient,
    config: &'a Config,
}

impl<'a> Analyzer<'a> {
    pub fn new(llm: &'a dyn CompletionClient, config: &'a Config) -> Self {
        Self { llm, config }
    }

    pub async fn analyze(&self, enriched: &EnrichedPaper) -> Result<DigestEntry, StageError> {
        let paper = enriched.paper();
        let failed = |reason: String| StageError::AnalysisCallFailed {
            paper_id: paper.paper_id.clone(),
            reason,
        };

        let request = CompletionRequest::new(
            &self.config.llm.analyzer_model,
            SYSTEM_PROMPT,
            build_prompt(&self.config.pipeline.acceptance_criteria, enriched),
        );

        let response = self
            .llm
            .complete(&request)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let analysis = extract_json_object(&response)
            .and_then(|object| serde_json::from_str::<Analysis>(object).ok())
            .ok_or_else(|| {
                failed(format!(
                    "unparseable analysis response: {}",
                    truncate_chars(&response, 200)
                ))
            })?;

        if analysis.summary.trim().is_empty() {
            return Err(failed("analysis response has no summary".to_string()));
        }

        let rating = match numeric_score(&analysis.rating) {
            Some(raw) => clamp_score(raw),
            None => {
                tracing::warn!(
                    "No usable rating for {}, using selection score {}",
                    paper.paper_id,
                    enriched.scored.score
                );
                enriched.scored.score
            }
        };

        let authors = analysis
            .authors_affiliations
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| truncate_words(a, MAX_FIELD_WORDS))
            .unwrap_or_else(|| paper.authors_with_affiliations());

        let community = if analysis.community_reputation.trim().is_empty() {
            NO_FEEDBACK.to_string()
        } else {
            truncate_words(&analysis.community_reputation, MAX_FIELD_WORDS)
        };

        tracing::info!("Analyzed {}: rating {}", paper.paper_id, rating);

        Ok(DigestEntry {
            paper_id: paper.paper_id.clone(),
            title: normalize_whitespace(&paper.title),
            summary: truncate_words(&analysis.summary, MAX_FIELD_WORDS),
            authors,
            publish_date: paper.publish_date(),
            rating,
            rating_justification: truncate_words(&analysis.rating_justification, MAX_FIELD_WORDS),
            community_reputation: community,
            url: paper.url.clone(),
            selection_score: enriched.scored.score,
        })
    }
}

fn build_prompt(criteria: &str, enriched: &EnrichedPaper) -> String {
    let paper = enriched.paper();

    let feedback = if enriched.has_feedback() {
        enriched.community_feedback.as_str()
    } else {
        "No community feedback available."
    };

    let content = match &enriched.full_text {
        Some(text) => format!("Paper content (excerpt):\n{}", truncate_chars(text, EXCERPT_CHARS)),
        None => "Full text unavailable; base the analysis on the abstract.".to_string(),
    };

    format!(
        "Reader's criteria:\n{criteria}\n\n\
         Title: {title}\n\
         Authors: {authors}\n\
         Published: {published}\n\
         Categories: {categories}\n\
         Initial relevance score: {score}/100\n\n\
         Abstract:\n{abstract_text}\n\n\
         Community feedback:\n{feedback}\n\n\
         {content}",
        criteria = criteria.trim(),
        title = normalize_whitespace(&paper.title),
        authors = paper.authors_with_affiliations(),
        published = paper.publish_date(),
        categories = paper.categories.join(", "),
        score = enriched.scored.score,
        abstract_text = normalize_whitespace(&paper.r#abstract),
        feedback = feedback,
        content = content,
    )
}

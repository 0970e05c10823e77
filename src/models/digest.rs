//! Records produced by the pipeline stages.

use serde::{Deserialize, Serialize};

use super::Paper;

/// Lowest valid relevance score or rating
pub const MIN_SCORE: u8 = 1;

/// Highest valid relevance score or rating
pub const MAX_SCORE: u8 = 100;

/// Word cap for each free-text field of a digest entry
pub const MAX_FIELD_WORDS: usize = 100;

/// Clamp an arbitrary model-provided number into `[MIN_SCORE, MAX_SCORE]`
pub fn clamp_score(raw: i64) -> u8 {
    raw.clamp(i64::from(MIN_SCORE), i64::from(MAX_SCORE)) as u8
}

/// A filter survivor with its relevance score
///
/// The score is final once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPaper {
    pub paper: Paper,

    /// Relevance score in `[1, 100]`
    pub score: u8,

    /// Short reason given by the scorer, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

impl ScoredPaper {
    pub fn new(paper: Paper, score: u8) -> Self {
        Self {
            paper,
            score: score.clamp(MIN_SCORE, MAX_SCORE),
            justification: None,
        }
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        let justification = justification.into();
        if !justification.trim().is_empty() {
            self.justification = Some(justification);
        }
        self
    }
}

/// A selected paper plus whatever enrichment could be gathered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPaper {
    pub scored: ScoredPaper,

    /// Aggregated web-search snippets; empty when nothing was found
    pub community_feedback: String,

    /// Extracted full text; `None` when download or extraction failed
    pub full_text: Option<String>,
}

impl EnrichedPaper {
    /// Wrap a scored paper with no enrichment
    pub fn bare(scored: ScoredPaper) -> Self {
        Self {
            scored,
            community_feedback: String::new(),
            full_text: None,
        }
    }

    pub fn paper(&self) -> &Paper {
        &self.scored.paper
    }

    pub fn has_feedback(&self) -> bool {
        !self.community_feedback.trim().is_empty()
    }

    pub fn has_full_text(&self) -> bool {
        self.full_text.is_some()
    }
}

/// One analyzed paper, ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub paper_id: String,
    pub title: String,
    pub summary: String,
    /// Authors with affiliations, as rendered for readers
    pub authors: String,
    /// `YYYY-MM-DD`
    pub publish_date: String,
    /// Final rating from the analyzer, `[1, 100]`
    pub rating: u8,
    pub rating_justification: String,
    pub community_reputation: String,
    /// Abstract page URL
    pub url: String,
    /// Score the entry was selected with; digest order follows it
    pub selection_score: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperBuilder;
    use chrono::Utc;

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-5), 1);
        assert_eq!(clamp_score(0), 1);
        assert_eq!(clamp_score(42), 42);
        assert_eq!(clamp_score(250), 100);
    }

    #[test]
    fn test_blank_justification_is_dropped() {
        let paper = PaperBuilder::new("1", "T", "u", Utc::now()).build();
        let scored = ScoredPaper::new(paper, 70).with_justification("   ");
        assert!(scored.justification.is_none());
    }
}

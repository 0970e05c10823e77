//! Top-K selection.

use crate::models::ScoredPaper;

/// Keep papers scoring at least `threshold`, best first, at most `max_items`
///
/// The sort is stable: ties keep their input order.
pub fn select(scored: Vec<ScoredPaper>, threshold: u8, max_items: usize) -> Vec<ScoredPaper> {
    let mut qualified: Vec<ScoredPaper> = scored
        .into_iter()
        .filter(|paper| paper.score >= threshold)
        .collect();
    qualified.sort_by(|a, b| b.score.cmp(&a.score));
    qualified.truncate(max_items);
    qualified
}

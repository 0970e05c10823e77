//! Fixed-size batching with bounded concurrency.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::future::Future;

/// Result of one batch call
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome<T> {
    Completed(T),
    Failed { reason: String },
}

impl<T> BatchOutcome<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, BatchOutcome::Failed { .. })
    }
}

/// Batch counts for one stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total_batches: usize,
    pub failed_batches: usize,
}

impl BatchStats {
    pub fn from_outcomes<T>(outcomes: &[BatchOutcome<T>]) -> Self {
        Self {
            total_batches: outcomes.len(),
            failed_batches: outcomes.iter().filter(|o| o.is_failed()).count(),
        }
    }
}

/// Split `items` into batches of `size`; only the last may be shorter
pub fn partition<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

/// Run `call` on every batch with at most `concurrency` in flight
///
/// Outcomes come back in batch order regardless of completion order.
pub async fn run_batches<'a, T, R, F, Fut>(
    items: &'a [T],
    size: usize,
    concurrency: usize,
    call: F,
) -> Vec<BatchOutcome<R>>
where
    F: Fn(usize, &'a [T]) -> Fut,
    Fut: Future<Output = BatchOutcome<R>>,
{
    stream::iter(partition(items, size).enumerate())
        .map(|(index, batch)| call(index, batch))
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Whether an identifier reported by a model refers to `paper_id`
///
/// Tolerates surrounding whitespace, an `arXiv:` prefix and a version suffix.
pub fn matches_id(reported: &str, paper_id: &str) -> bool {
    let reported = reported.trim();
    let reported = reported.strip_prefix("arXiv:").unwrap_or(reported);
    if reported == paper_id {
        return true;
    }
    match reported.strip_prefix(paper_id).and_then(|rest| rest.strip_prefix('v')) {
        Some(version) => !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_partition_sizes() {
        let items: Vec<u32> = (0..25).collect();
        let sizes: Vec<usize> = partition(&items, 10).map(<[u32]>::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);

        let exact: Vec<usize> = partition(&items[..20], 10).map(<[u32]>::len).collect();
        assert_eq!(exact, vec![10, 10]);

        assert_eq!(partition(&items[..0], 10).count(), 0);
        assert_eq!(partition(&items[..3], 0).count(), 3);
    }

    #[tokio::test]
    async fn test_run_batches_preserves_order() {
        let items: Vec<u64> = (0..9).collect();
        // Earlier batches sleep longer so they finish last
        let outcomes = run_batches(&items, 2, 4, |index, batch| async move {
            tokio::time::sleep(Duration::from_millis(20 - 4 * index as u64)).await;
            BatchOutcome::Completed(batch.iter().sum::<u64>())
        })
        .await;

        assert_eq!(
            outcomes,
            vec![
                BatchOutcome::Completed(1),
                BatchOutcome::Completed(5),
                BatchOutcome::Completed(9),
                BatchOutcome::Completed(13),
                BatchOutcome::Completed(8),
            ]
        );
    }

    #[tokio::test]
    async fn test_batch_stats() {
        let items = [1, 2, 3];
        let outcomes = run_batches(&items, 1, 1, |index, _| async move {
            if index == 1 {
                BatchOutcome::Failed {
                    reason: "boom".to_string(),
                }
            } else {
                BatchOutcome::Completed(())
            }
        })
        .await;

        let stats = BatchStats::from_outcomes(&outcomes);
        assert_eq!(stats.total_batches, 3);
        assert_eq!(stats.failed_batches, 1);
    }

    #[test]
    fn test_matches_id() {
        assert!(matches_id("2401.00001", "2401.00001"));
        assert!(matches_id(" arXiv:2401.00001v2 ", "2401.00001"));
        assert!(!matches_id("2401.000011", "2401.00001"));
        assert!(!matches_id("2401.00001v", "2401.00001"));
        assert!(!matches_id("2401.00002", "2401.00001"));
    }
}

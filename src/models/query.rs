//! Fetch request models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A trailing publication-date window, inclusive at both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    /// Window from `days_start` days ago to `days_end` days ago, relative to `now`
    ///
    /// `days_start` must be greater than `days_end`; configuration validation
    /// guarantees this before a window is ever built.
    pub fn trailing(days_start: u32, days_end: u32, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(i64::from(days_start)),
            end: now - Duration::days(i64::from(days_end)),
        }
    }

    /// Check if a timestamp falls inside the window
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Parameters for fetching candidate papers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchQuery {
    /// Free-text topics; a paper matching any of them is a candidate
    pub topics: Vec<String>,

    /// Publication window
    pub window: DateWindow,

    /// Optional category allow-list (empty admits all)
    pub categories: Vec<String>,
}

impl FetchQuery {
    /// Create a query over `topics` for `window`
    pub fn new(topics: Vec<String>, window: DateWindow) -> Self {
        Self {
            topics,
            window,
            categories: Vec::new(),
        }
    }

    /// Restrict to the given categories
    pub fn categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trailing_window() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        let window = DateWindow::trailing(7, 1, now);

        assert_eq!(window.to_string(), "2024-06-23 to 2024-06-29");
        assert!(window.contains(Utc.with_ymd_and_hms(2024, 6, 25, 0, 0, 0).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2024, 6, 22, 0, 0, 0).unwrap()));
    }
}

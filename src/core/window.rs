//! Calendar windows used to compare two periods.

use crate::core::{is_weekend, PerformanceRecord};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Length of the compared periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonPeriod {
    /// Last 7 days against the 7 before.
    #[default]
    Week,
    /// Last 30 days against the 30 before.
    Month,
}

impl ComparisonPeriod {
    pub fn days(&self) -> u32 {
        match self {
            ComparisonPeriod::Week => 7,
            ComparisonPeriod::Month => 30,
        }
    }
}

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// The `days` calendar days ending at (and including) `end`.
    pub fn ending_at(end: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            start: end - Duration::days(span),
            end,
        }
    }

    /// The window of equal length immediately before this one.
    pub fn preceding(&self) -> Self {
        let end = self.start - Duration::days(1);
        Self::ending_at(end, self.days())
    }

    pub fn days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1).max(0) as u32
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Current and previous windows for a comparison ending at `latest`.
pub fn comparison_windows(latest: NaiveDate, days: u32) -> (DateWindow, DateWindow) {
    let current = DateWindow::ending_at(latest, days);
    let previous = current.preceding();
    (current, previous)
}

/// Fraction of the distinct dates in the rows that fall on a weekend.
///
/// Zero when there are no rows.
pub fn weekend_share(rows: &[&PerformanceRecord]) -> f64 {
    let dates: BTreeSet<NaiveDate> = rows.iter().map(|r| r.date).collect();
    if dates.is_empty() {
        return 0.0;
    }
    let weekend = dates.iter().filter(|d| is_weekend(**d)).count();
    weekend as f64 / dates.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn week_windows_are_adjacent_and_equal_length() {
        let (current, previous) = comparison_windows(date(3, 14), ComparisonPeriod::Week.days());
        assert_eq!(current.start, date(3, 8));
        assert_eq!(current.end, date(3, 14));
        assert_eq!(previous.start, date(3, 1));
        assert_eq!(previous.end, date(3, 7));
        assert_eq!(current.days(), previous.days());
    }

    #[test]
    fn month_window_crosses_month_boundary() {
        let (current, previous) = comparison_windows(date(3, 10), ComparisonPeriod::Month.days());
        assert_eq!(current.days(), 30);
        assert_eq!(current.start, date(2, 10));
        assert_eq!(previous.end, date(2, 9));
    }

    #[test]
    fn contains_is_inclusive() {
        let w = DateWindow::ending_at(date(3, 10), 3);
        assert!(w.contains(date(3, 8)));
        assert!(w.contains(date(3, 10)));
        assert!(!w.contains(date(3, 7)));
        assert!(!w.contains(date(3, 11)));
    }

    #[test]
    fn weekend_share_counts_distinct_dates() {
        let sat = PerformanceRecord::new("/a", "q", date(3, 2), 10, 1, 1.0);
        let sat_other = PerformanceRecord::new("/b", "q", date(3, 2), 10, 1, 1.0);
        let mon = PerformanceRecord::new("/a", "q", date(3, 4), 10, 1, 1.0);
        let rows = vec![&sat, &sat_other, &mon];
        assert_eq!(weekend_share(&rows), 0.5);
        assert_eq!(weekend_share(&[]), 0.0);
    }
}

//! Performance records and datasets.

use crate::core::DateWindow;
use crate::error::{AnalysisError, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// One row of search-performance data, keyed by page × query × date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Landing page URL.
    pub page: String,
    /// Search query.
    pub query: String,
    /// Calendar date of the observation.
    pub date: NaiveDate,
    /// Country code of the searcher.
    #[serde(default)]
    pub country: String,
    pub impressions: u64,
    pub clicks: u64,
    /// Click-through rate in [0, 1].
    pub ctr: f64,
    /// Average position (1 is the top result).
    pub position: f64,
}

impl PerformanceRecord {
    /// Create a record, deriving CTR from clicks and impressions.
    pub fn new(
        page: impl Into<String>,
        query: impl Into<String>,
        date: NaiveDate,
        impressions: u64,
        clicks: u64,
        position: f64,
    ) -> Self {
        let ctr = if impressions > 0 {
            clicks as f64 / impressions as f64
        } else {
            0.0
        };
        Self {
            page: page.into(),
            query: query.into(),
            date,
            country: String::new(),
            impressions,
            clicks,
            ctr,
            position,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Override the derived CTR with the value reported by the data source.
    pub fn with_ctr(mut self, ctr: f64) -> Self {
        self.ctr = ctr;
        self
    }

    /// Whether the observation falls on a Saturday or Sunday.
    pub fn is_weekend(&self) -> bool {
        is_weekend(self.date)
    }

    fn check(&self) -> std::result::Result<(), String> {
        if !self.position.is_finite() || self.position < 1.0 {
            return Err(format!("position must be a finite value >= 1, got {}", self.position));
        }
        if !self.ctr.is_finite() || !(0.0..=1.0).contains(&self.ctr) {
            return Err(format!("ctr must be within [0, 1], got {}", self.ctr));
        }
        Ok(())
    }
}

/// Check if a date is a weekend day.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// An unordered collection of performance records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<PerformanceRecord>,
}

impl Dataset {
    pub fn new(records: Vec<PerformanceRecord>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[PerformanceRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PerformanceRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check every record against the canonical schema.
    pub fn validate(&self) -> Result<()> {
        for (index, record) in self.records.iter().enumerate() {
            record
                .check()
                .map_err(|reason| AnalysisError::InvalidRecord { index, reason })?;
        }
        Ok(())
    }

    pub fn min_date(&self) -> Option<NaiveDate> {
        self.records.iter().map(|r| r.date).min()
    }

    pub fn max_date(&self) -> Option<NaiveDate> {
        self.records.iter().map(|r| r.date).max()
    }

    /// Records whose date falls inside the window.
    pub fn within(&self, window: &DateWindow) -> Vec<&PerformanceRecord> {
        self.records
            .iter()
            .filter(|r| window.contains(r.date))
            .collect()
    }
}

impl From<Vec<PerformanceRecord>> for Dataset {
    fn from(records: Vec<PerformanceRecord>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<PerformanceRecord> for Dataset {
    fn from_iter<I: IntoIterator<Item = PerformanceRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a PerformanceRecord;
    type IntoIter = std::slice::Iter<'a, PerformanceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn new_record_derives_ctr() {
        let record = PerformanceRecord::new("/a", "shoes", day(1), 200, 10, 3.0);
        assert_relative_eq!(record.ctr, 0.05, epsilon = 1e-12);

        let empty = PerformanceRecord::new("/a", "shoes", day(1), 0, 0, 3.0);
        assert_eq!(empty.ctr, 0.0);
    }

    #[test]
    fn weekend_detection() {
        // 2024-03-02 is a Saturday, 2024-03-04 a Monday
        assert!(is_weekend(day(2)));
        assert!(is_weekend(day(3)));
        assert!(!is_weekend(day(4)));
    }

    #[test]
    fn validate_rejects_bad_position() {
        let ds = Dataset::new(vec![
            PerformanceRecord::new("/a", "q", day(1), 10, 1, 2.0),
            PerformanceRecord::new("/a", "q", day(2), 10, 1, 0.5),
        ]);
        match ds.validate() {
            Err(AnalysisError::InvalidRecord { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidRecord, got {:?}", other),
        }
    }

    #[test]
    fn validate_rejects_out_of_range_ctr() {
        let ds = Dataset::new(vec![
            PerformanceRecord::new("/a", "q", day(1), 10, 1, 2.0).with_ctr(f64::NAN),
        ]);
        assert!(ds.validate().is_err());
    }

    #[test]
    fn date_bounds_and_window_selection() {
        let ds: Dataset = (1..=10)
            .map(|d| PerformanceRecord::new("/a", "q", day(d), 10, 1, 2.0))
            .collect();
        assert_eq!(ds.min_date(), Some(day(1)));
        assert_eq!(ds.max_date(), Some(day(10)));

        let window = DateWindow::ending_at(day(10), 3);
        let rows = ds.within(&window);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.date >= day(8)));
    }
}

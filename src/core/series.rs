//! Daily aggregation of records into impression and click series.

use crate::core::PerformanceRecord;
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

/// Daily impression and click totals over a contiguous calendar span.
///
/// Dates without any record inside the span are filled with zero.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    start: NaiveDate,
    impressions: Vec<f64>,
    clicks: Vec<f64>,
    observed: Vec<bool>,
}

impl DailySeries {
    /// Aggregate records by date. Returns `None` when there are no records.
    pub fn from_records<'a, I>(records: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a PerformanceRecord>,
    {
        let mut totals: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
        for r in records {
            let entry = totals.entry(r.date).or_insert((0, 0));
            entry.0 += r.impressions;
            entry.1 += r.clicks;
        }

        let (&start, _) = totals.iter().next()?;
        let (&end, _) = totals.iter().next_back()?;
        let len = (end - start).num_days() as usize + 1;

        let mut impressions = vec![0.0; len];
        let mut clicks = vec![0.0; len];
        let mut observed = vec![false; len];
        for (date, (imp, clk)) in totals {
            let idx = (date - start).num_days() as usize;
            impressions[idx] = imp as f64;
            clicks[idx] = clk as f64;
            observed[idx] = true;
        }

        Some(Self {
            start,
            impressions,
            clicks,
            observed,
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn len(&self) -> usize {
        self.impressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.impressions.is_empty()
    }

    pub fn impressions(&self) -> &[f64] {
        &self.impressions
    }

    pub fn clicks(&self) -> &[f64] {
        &self.clicks
    }

    /// Number of dates that had at least one record.
    pub fn observed_days(&self) -> usize {
        self.observed.iter().filter(|o| **o).count()
    }

    pub fn date_at(&self, index: usize) -> NaiveDate {
        self.start + Duration::days(index as i64)
    }

    /// Mean impressions per observed day, grouped by weekday (Monday = 0).
    pub fn weekday_means(&self) -> BTreeMap<u32, f64> {
        let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for (i, &imp) in self.impressions.iter().enumerate() {
            if !self.observed[i] {
                continue;
            }
            let weekday = self.date_at(i).weekday().num_days_from_monday();
            let entry = sums.entry(weekday).or_insert((0.0, 0));
            entry.0 += imp;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(day, (sum, n))| (day, sum / n as f64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn aggregates_and_fills_gaps() {
        let records = vec![
            PerformanceRecord::new("/a", "q1", date(1), 10, 1, 1.0),
            PerformanceRecord::new("/b", "q2", date(1), 5, 2, 1.0),
            PerformanceRecord::new("/a", "q1", date(4), 7, 0, 1.0),
        ];
        let series = DailySeries::from_records(&records).unwrap();

        assert_eq!(series.start(), date(1));
        assert_eq!(series.len(), 4);
        assert_eq!(series.impressions(), &[15.0, 0.0, 0.0, 7.0]);
        assert_eq!(series.clicks(), &[3.0, 0.0, 0.0, 0.0]);
        assert_eq!(series.observed_days(), 2);
        assert_eq!(series.date_at(3), date(4));
    }

    #[test]
    fn empty_input_yields_none() {
        let records: Vec<PerformanceRecord> = Vec::new();
        assert!(DailySeries::from_records(&records).is_none());
    }

    #[test]
    fn weekday_means_skip_unobserved_days() {
        // 2024-03-04 and 2024-03-11 are Mondays
        let records = vec![
            PerformanceRecord::new("/a", "q", date(4), 10, 1, 1.0),
            PerformanceRecord::new("/a", "q", date(11), 30, 1, 1.0),
        ];
        let series = DailySeries::from_records(&records).unwrap();
        let means = series.weekday_means();
        assert_eq!(means.len(), 1);
        assert_eq!(means[&0], 20.0);
    }
}

//! Grouped totals and outer joins shared by the analyzers.

use crate::core::PerformanceRecord;
use crate::utils::{mean, sample_std_dev};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Running totals for one group of records.
#[derive(Debug, Clone, Default)]
pub(crate) struct Totals<'a> {
    pub impressions: u64,
    pub clicks: u64,
    positions: Vec<f64>,
    ctrs: Vec<f64>,
    first_country: Option<&'a str>,
    page_counts: BTreeMap<&'a str, usize>,
    queries: BTreeSet<&'a str>,
    dates: BTreeSet<NaiveDate>,
}

impl<'a> Totals<'a> {
    pub fn add(&mut self, r: &'a PerformanceRecord) {
        self.impressions += r.impressions;
        self.clicks += r.clicks;
        self.positions.push(r.position);
        self.ctrs.push(r.ctr);
        if self.first_country.is_none() && !r.country.is_empty() {
            self.first_country = Some(r.country.as_str());
        }
        *self.page_counts.entry(r.page.as_str()).or_insert(0) += 1;
        self.queries.insert(r.query.as_str());
        self.dates.insert(r.date);
    }

    pub fn mean_position(&self) -> Option<f64> {
        mean(&self.positions)
    }

    /// Sample standard deviation of position; undefined for a single row.
    pub fn position_std(&self) -> Option<f64> {
        sample_std_dev(&self.positions)
    }

    pub fn mean_ctr(&self) -> Option<f64> {
        mean(&self.ctrs)
    }

    pub fn country(&self) -> Option<&'a str> {
        self.first_country
    }

    /// Most frequent page; ties go to the lexicographically smallest URL.
    pub fn modal_page(&self) -> Option<&'a str> {
        self.page_counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(page, _)| *page)
    }

    pub fn distinct_queries(&self) -> usize {
        self.queries.len()
    }

    pub fn distinct_days(&self) -> usize {
        self.dates.len()
    }
}

/// Group rows by key into ordered totals.
pub(crate) fn group_by<'a, K, F>(rows: &[&'a PerformanceRecord], key: F) -> BTreeMap<K, Totals<'a>>
where
    K: Ord,
    F: Fn(&'a PerformanceRecord) -> K,
{
    let mut groups: BTreeMap<K, Totals<'a>> = BTreeMap::new();
    for &r in rows {
        groups.entry(key(r)).or_default().add(r);
    }
    groups
}

/// Grouping key for page × query analyses.
pub(crate) fn page_query(r: &PerformanceRecord) -> (&str, &str) {
    (r.page.as_str(), r.query.as_str())
}

/// Grouping key for per-query analyses.
pub(crate) fn query_only(r: &PerformanceRecord) -> &str {
    r.query.as_str()
}

/// Grouping key for per-page analyses.
pub(crate) fn page_only(r: &PerformanceRecord) -> &str {
    r.page.as_str()
}

/// Full outer join of two keyed maps, in key order.
pub(crate) fn outer_join<K: Ord, V>(
    mut current: BTreeMap<K, V>,
    previous: BTreeMap<K, V>,
) -> Vec<(K, Option<V>, Option<V>)> {
    let mut joined = Vec::with_capacity(current.len().max(previous.len()));
    for (key, prev) in previous {
        let cur = current.remove(&key);
        joined.push((key, cur, Some(prev)));
    }
    for (key, cur) in current {
        joined.push((key, Some(cur), None));
    }
    joined.sort_by(|a, b| a.0.cmp(&b.0));
    joined
}

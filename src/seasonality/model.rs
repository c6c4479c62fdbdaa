//! Fitted seasonal model built from historical data.
//!
//! [`SeasonalModel::fit`] is the only constructor that looks at data; the
//! resulting value is immutable and every query on it is a pure function of
//! the model and its arguments.

use crate::core::{is_weekend, Dataset, DailySeries, PerformanceRecord};
use crate::error::AnalysisError;
use crate::seasonality::ClassicalDecomposition;
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

const WEEKLY_PERIOD: usize = 7;
const MONTHLY_PERIOD: usize = 30;

/// Configuration for fitting a seasonal model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalityConfig {
    /// Minimum number of historical rows before anything is fitted.
    pub min_data_points: usize,
    /// Minimum number of days of site-wide data for the monthly decomposition.
    pub min_monthly_days: usize,
    /// Number of highest-volume page/query pairs examined individually.
    pub top_pairs: usize,
    /// Minimum number of observed days for a page/query pair.
    pub min_pair_days: usize,
    /// Strength above which a decomposition counts as seasonal.
    pub seasonal_threshold: f64,
    /// Strength above which a page/query pattern explains a change.
    pub pair_strength_threshold: f64,
    /// Strength above which the site-wide weekly pattern explains a change.
    pub site_strength_threshold: f64,
    /// Weekday ratio under which a weekend drop is expected.
    pub weekend_low_ratio: f64,
    /// Weekday ratio over which a weekend spike is expected.
    pub weekend_high_ratio: f64,
    /// Date treated as "today"; the local date when unset.
    pub reference_date: Option<NaiveDate>,
}

impl Default for SeasonalityConfig {
    fn default() -> Self {
        Self {
            min_data_points: 60,
            min_monthly_days: 60,
            top_pairs: 100,
            min_pair_days: 30,
            seasonal_threshold: 0.3,
            pair_strength_threshold: 0.4,
            site_strength_threshold: 0.3,
            weekend_low_ratio: 0.7,
            weekend_high_ratio: 1.3,
            reference_date: None,
        }
    }
}

impl SeasonalityConfig {
    pub fn with_min_data_points(mut self, min: usize) -> Self {
        self.min_data_points = min;
        self
    }

    pub fn with_top_pairs(mut self, top: usize) -> Self {
        self.top_pairs = top;
        self
    }

    pub fn with_min_pair_days(mut self, days: usize) -> Self {
        self.min_pair_days = days;
        self
    }

    pub fn with_seasonal_threshold(mut self, threshold: f64) -> Self {
        self.seasonal_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let strengths = [
            ("seasonal_threshold", self.seasonal_threshold),
            ("pair_strength_threshold", self.pair_strength_threshold),
            ("site_strength_threshold", self.site_strength_threshold),
        ];
        for (name, value) in strengths {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnalysisError::InvalidParameter(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !(self.weekend_low_ratio > 0.0 && self.weekend_low_ratio < self.weekend_high_ratio)
            || !self.weekend_high_ratio.is_finite()
        {
            return Err(AnalysisError::InvalidParameter(format!(
                "weekend ratios must satisfy 0 < low < high, got {} and {}",
                self.weekend_low_ratio, self.weekend_high_ratio
            )));
        }
        Ok(())
    }
}

/// Seasonality of one metric at one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPattern {
    pub has_seasonality: bool,
    /// Seasonal strength in [0, 1].
    pub strength: f64,
    /// One cycle of seasonal offsets, kept only when seasonal.
    ///
    /// Weekly patterns are indexed by weekday (Monday = 0); monthly patterns
    /// by position in the cycle counted from the first historical date.
    pub pattern: Option<Vec<f64>>,
}

impl MetricPattern {
    pub fn absent() -> Self {
        Self {
            has_seasonality: false,
            strength: 0.0,
            pattern: None,
        }
    }
}

/// Impression and click patterns at one period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodPatterns {
    pub impressions: Option<MetricPattern>,
    pub clicks: Option<MetricPattern>,
}

impl PeriodPatterns {
    pub fn is_empty(&self) -> bool {
        self.impressions.is_none() && self.clicks.is_none()
    }
}

/// Per-weekday share of traffic relative to an even 1/7 split (Monday = 0).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayOfWeekPatterns {
    pub impressions: BTreeMap<u32, f64>,
    pub clicks: BTreeMap<u32, f64>,
    pub imp_ratio: BTreeMap<u32, f64>,
    pub clicks_ratio: BTreeMap<u32, f64>,
}

impl DayOfWeekPatterns {
    pub fn is_empty(&self) -> bool {
        self.imp_ratio.is_empty() && self.clicks_ratio.is_empty()
    }
}

/// Weekly seasonality of a single page/query pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageQueryPattern {
    pub has_seasonality: bool,
    pub strength: f64,
    /// Mean daily impressions over the observed days.
    pub avg_impressions: f64,
    /// Mean daily impressions per weekday (Monday = 0).
    pub day_of_week_pattern: BTreeMap<u32, f64>,
}

/// Immutable seasonal model.
#[derive(Debug, Clone, Default)]
pub struct SeasonalModel {
    config: SeasonalityConfig,
    fitted: bool,
    weekly: PeriodPatterns,
    monthly: PeriodPatterns,
    day_of_week: DayOfWeekPatterns,
    page_query: HashMap<(String, String), PageQueryPattern>,
}

impl SeasonalModel {
    /// A model with no patterns; every query answers "not seasonal" / 1.0.
    pub fn empty(config: SeasonalityConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Fit weekly, monthly, day-of-week and page/query patterns.
    ///
    /// Never fails: too little history produces an empty model, and a
    /// decomposition failure is logged and treated as "no seasonality".
    pub fn fit(historical: &Dataset, config: &SeasonalityConfig) -> Self {
        let mut model = Self::empty(config.clone());

        if historical.len() < config.min_data_points {
            warn!(
                needed = config.min_data_points,
                got = historical.len(),
                "insufficient history for seasonality analysis"
            );
            return model;
        }

        let daily = match DailySeries::from_records(historical) {
            Some(series) => series,
            None => return model,
        };
        let weekday_offset = daily.start().weekday().num_days_from_monday() as usize;

        model.weekly = PeriodPatterns {
            impressions: Some(detect_pattern(
                daily.impressions(),
                WEEKLY_PERIOD,
                config.seasonal_threshold,
                Some(weekday_offset),
            )),
            clicks: Some(detect_pattern(
                daily.clicks(),
                WEEKLY_PERIOD,
                config.seasonal_threshold,
                Some(weekday_offset),
            )),
        };

        if daily.len() >= config.min_monthly_days {
            model.monthly = PeriodPatterns {
                impressions: Some(detect_pattern(
                    daily.impressions(),
                    MONTHLY_PERIOD,
                    config.seasonal_threshold,
                    None,
                )),
                clicks: Some(detect_pattern(
                    daily.clicks(),
                    MONTHLY_PERIOD,
                    config.seasonal_threshold,
                    None,
                )),
            };
        }

        model.day_of_week = day_of_week_patterns(historical);
        model.page_query = page_query_patterns(historical, config);
        model.fitted = true;

        info!(
            days = daily.len(),
            weekly_strength = model.weekly_strength(),
            seasonal_pairs = model.page_query.len(),
            "seasonality model fitted"
        );

        model
    }

    pub fn config(&self) -> &SeasonalityConfig {
        &self.config
    }

    /// Whether `fit` ran on enough data to produce patterns.
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn weekly_patterns(&self) -> &PeriodPatterns {
        &self.weekly
    }

    pub fn monthly_patterns(&self) -> &PeriodPatterns {
        &self.monthly
    }

    pub fn day_of_week_patterns(&self) -> &DayOfWeekPatterns {
        &self.day_of_week
    }

    pub fn page_query_pattern(&self, page: &str, query: &str) -> Option<&PageQueryPattern> {
        self.page_query
            .get(&(page.to_string(), query.to_string()))
    }

    /// Page/query pairs with a weekly pattern, sorted by key.
    pub fn page_query_patterns(&self) -> Vec<(&str, &str, &PageQueryPattern)> {
        let mut pairs: Vec<_> = self
            .page_query
            .iter()
            .map(|((p, q), pattern)| (p.as_str(), q.as_str(), pattern))
            .collect();
        pairs.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        pairs
    }

    /// Any weekly, monthly or page/query seasonality detected.
    pub fn has_any_seasonality(&self) -> bool {
        let seasonal = |p: &PeriodPatterns| {
            [&p.impressions, &p.clicks]
                .iter()
                .any(|m| m.as_ref().is_some_and(|m| m.has_seasonality))
        };
        seasonal(&self.weekly) || seasonal(&self.monthly) || !self.page_query.is_empty()
    }

    fn weekly_strength(&self) -> f64 {
        self.weekly
            .impressions
            .as_ref()
            .map_or(0.0, |m| m.strength)
    }

    fn today(&self) -> NaiveDate {
        self.config
            .reference_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Whether a change is plausibly explained by seasonality, as of the
    /// configured reference date.
    pub fn is_change_seasonal(&self, page: &str, query: &str, change_pct: f64) -> bool {
        self.is_change_seasonal_on(page, query, change_pct, self.today())
    }

    /// Heuristic cascade, first hit wins:
    /// 1. the page/query pair has its own strong weekly pattern;
    /// 2. `today` is a weekend day whose traffic ratio moves the same way as the change;
    /// 3. the site as a whole has a weekly impressions pattern.
    ///
    /// This is not a statistical test; false positives and negatives are expected.
    pub fn is_change_seasonal_on(
        &self,
        page: &str,
        query: &str,
        change_pct: f64,
        today: NaiveDate,
    ) -> bool {
        let cfg = &self.config;

        if let Some(pattern) = self.page_query_pattern(page, query) {
            if pattern.has_seasonality && pattern.strength > cfg.pair_strength_threshold {
                return true;
            }
        }

        if is_weekend(today) {
            let weekday = today.weekday().num_days_from_monday();
            if let Some(&ratio) = self.day_of_week.imp_ratio.get(&weekday) {
                if (ratio < cfg.weekend_low_ratio && change_pct < 0.0)
                    || (ratio > cfg.weekend_high_ratio && change_pct > 0.0)
                {
                    return true;
                }
            }
        }

        self.weekly.impressions.as_ref().is_some_and(|m| {
            m.has_seasonality && m.strength > cfg.site_strength_threshold
        })
    }

    /// Expected multiplicative traffic factor for a date (1.0 = no adjustment).
    ///
    /// Uses the weekday ratio when known, otherwise the weekly impressions
    /// pattern as a percentage offset.
    pub fn expected_seasonal_adjustment(&self, date: NaiveDate) -> f64 {
        if !self.fitted {
            return 1.0;
        }

        let weekday = date.weekday().num_days_from_monday();
        if let Some(&ratio) = self.day_of_week.imp_ratio.get(&weekday) {
            return ratio;
        }

        if let Some(MetricPattern {
            has_seasonality: true,
            pattern: Some(pattern),
            ..
        }) = &self.weekly.impressions
        {
            if !pattern.is_empty() {
                let idx = weekday as usize % pattern.len();
                return 1.0 + pattern[idx] / 100.0;
            }
        }

        1.0
    }
}

/// Decompose one series and summarize it as a pattern.
///
/// With `weekday_offset`, the stored figure is rotated so index 0 is Monday.
fn detect_pattern(
    series: &[f64],
    period: usize,
    threshold: f64,
    weekday_offset: Option<usize>,
) -> MetricPattern {
    let decomposition = match ClassicalDecomposition::new(period).decompose(series) {
        Ok(d) => d,
        Err(AnalysisError::InsufficientData { needed, got }) => {
            debug!(period, needed, got, "series too short for decomposition");
            return MetricPattern::absent();
        }
        Err(err) => {
            warn!(period, error = %err, "seasonal decomposition failed");
            return MetricPattern::absent();
        }
    };

    let strength = decomposition.seasonal_strength();
    let has_seasonality = strength > threshold;
    let pattern = has_seasonality.then(|| match weekday_offset {
        Some(offset) => (0..period)
            .map(|day| decomposition.figure[(day + period - offset % period) % period])
            .collect(),
        None => decomposition.figure.clone(),
    });

    MetricPattern {
        has_seasonality,
        strength,
        pattern,
    }
}

fn day_of_week_patterns(historical: &Dataset) -> DayOfWeekPatterns {
    let mut patterns = DayOfWeekPatterns::default();
    for r in historical {
        let weekday = r.date.weekday().num_days_from_monday();
        *patterns.impressions.entry(weekday).or_insert(0.0) += r.impressions as f64;
        *patterns.clicks.entry(weekday).or_insert(0.0) += r.clicks as f64;
    }

    patterns.imp_ratio = share_ratios(&patterns.impressions);
    patterns.clicks_ratio = share_ratios(&patterns.clicks);
    patterns
}

/// Each weekday's total divided by an even 1/7 share of the overall total.
fn share_ratios(totals: &BTreeMap<u32, f64>) -> BTreeMap<u32, f64> {
    let total: f64 = totals.values().sum();
    if total <= 0.0 {
        return BTreeMap::new();
    }
    let even_share = total / 7.0;
    totals
        .iter()
        .map(|(&day, &value)| (day, value / even_share))
        .collect()
}

fn page_query_patterns(
    historical: &Dataset,
    config: &SeasonalityConfig,
) -> HashMap<(String, String), PageQueryPattern> {
    let mut groups: HashMap<(&str, &str), Vec<&PerformanceRecord>> = HashMap::new();
    for r in historical {
        groups
            .entry((r.page.as_str(), r.query.as_str()))
            .or_default()
            .push(r);
    }

    let mut ranked: Vec<((&str, &str), u64)> = groups
        .iter()
        .map(|(key, rows)| (*key, rows.iter().map(|r| r.impressions).sum()))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut patterns = HashMap::new();
    for (key, _) in ranked.into_iter().take(config.top_pairs) {
        let rows = &groups[&key];
        let series = match DailySeries::from_records(rows.iter().copied()) {
            Some(s) => s,
            None => continue,
        };
        if series.observed_days() < config.min_pair_days {
            continue;
        }

        let weekly = detect_pattern(
            series.impressions(),
            WEEKLY_PERIOD,
            config.seasonal_threshold,
            None,
        );
        if !weekly.has_seasonality {
            continue;
        }

        let total: f64 = series.impressions().iter().sum();
        patterns.insert(
            (key.0.to_string(), key.1.to_string()),
            PageQueryPattern {
                has_seasonality: true,
                strength: weekly.strength,
                avg_impressions: total / series.observed_days() as f64,
                day_of_week_pattern: series.weekday_means(),
            },
        );
    }

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn start() -> NaiveDate {
        // A Monday
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    /// Daily rows for one page/query with a strong weekday/weekend swing.
    fn weekly_rows(page: &str, query: &str, days: i64, weekday: u64, weekend: u64) -> Vec<PerformanceRecord> {
        (0..days)
            .map(|i| {
                let date = start() + Duration::days(i);
                let imp = if is_weekend(date) { weekend } else { weekday };
                PerformanceRecord::new(page, query, date, imp, imp / 10, 3.0)
            })
            .collect()
    }

    fn config() -> SeasonalityConfig {
        SeasonalityConfig::default().with_reference_date(start())
    }

    #[test]
    fn too_little_history_yields_empty_model() {
        let data = Dataset::new(weekly_rows("/a", "q", 30, 100, 20));
        let model = SeasonalModel::fit(&data, &config());

        assert!(!model.is_fitted());
        assert!(!model.has_any_seasonality());
        assert!(model.weekly_patterns().is_empty());
        assert!(model.day_of_week_patterns().is_empty());
        assert!(!model.is_change_seasonal("/a", "q", -50.0));
        assert_eq!(model.expected_seasonal_adjustment(start()), 1.0);
    }

    #[test]
    fn detects_weekly_site_pattern() {
        let data = Dataset::new(weekly_rows("/a", "q", 84, 1000, 200));
        let model = SeasonalModel::fit(&data, &config());

        assert!(model.is_fitted());
        let weekly = model.weekly_patterns().impressions.as_ref().unwrap();
        assert!(weekly.has_seasonality);
        assert!(weekly.strength > 0.9);

        // Weekday-aligned figure: Saturday and Sunday are the low points
        let pattern = weekly.pattern.as_ref().unwrap();
        assert_eq!(pattern.len(), 7);
        assert!(pattern[5] < 0.0 && pattern[6] < 0.0);
        assert!(pattern[0] > 0.0);
    }

    #[test]
    fn monthly_patterns_need_sixty_days() {
        let short = Dataset::new(weekly_rows("/a", "q", 59, 1000, 200));
        let model = SeasonalModel::fit(&short, &config().with_min_data_points(10));
        assert!(model.monthly_patterns().is_empty());

        let exact = Dataset::new(weekly_rows("/a", "q", 60, 1000, 200));
        let model = SeasonalModel::fit(&exact, &config());
        assert!(model.monthly_patterns().impressions.is_some());
        assert!(model.monthly_patterns().clicks.is_some());
    }

    #[test]
    fn day_of_week_ratios() {
        let data = Dataset::new(weekly_rows("/a", "q", 70, 1000, 200));
        let model = SeasonalModel::fit(&data, &config());
        let dow = model.day_of_week_patterns();

        // Weekly total = 5 * 1000 + 2 * 200 = 5400; even share = 5400 / 7
        let expected_weekday = 1000.0 / (5400.0 / 7.0);
        let expected_weekend = 200.0 / (5400.0 / 7.0);
        assert_relative_eq!(dow.imp_ratio[&0], expected_weekday, epsilon = 1e-9);
        assert_relative_eq!(dow.imp_ratio[&6], expected_weekend, epsilon = 1e-9);
    }

    #[test]
    fn page_query_pattern_is_recorded() {
        let data = Dataset::new(weekly_rows("/a", "shoes", 84, 1000, 100));
        let model = SeasonalModel::fit(&data, &config());
        let pattern = model.page_query_pattern("/a", "shoes").unwrap();
        assert!(pattern.has_seasonality);
        assert!(pattern.strength > 0.4);
        assert_eq!(pattern.day_of_week_pattern.len(), 7);
        assert!(model.page_query_pattern("/a", "boots").is_none());
    }

    #[test]
    fn cascade_checks_pair_then_weekend_then_site() {
        let data = Dataset::new(weekly_rows("/a", "shoes", 84, 1000, 100));
        let model = SeasonalModel::fit(&data, &config());

        // Pair pattern hit regardless of date
        let monday = start();
        assert!(model.is_change_seasonal_on("/a", "shoes", 5.0, monday));

        // Weekend day with a low weekend ratio explains a drop
        let saturday = start() + Duration::days(5);
        assert!(model.is_change_seasonal_on("/other", "q", -30.0, saturday));

        // Site-wide weekly pattern explains anything else
        assert!(model.is_change_seasonal_on("/other", "q", 30.0, monday));
    }

    #[test]
    fn flat_history_is_never_seasonal() {
        let data = Dataset::new(weekly_rows("/a", "q", 84, 500, 500));
        let model = SeasonalModel::fit(&data, &config());
        assert!(model.is_fitted());
        assert!(!model.has_any_seasonality());
        let monday = start();
        assert!(!model.is_change_seasonal_on("/a", "q", 40.0, monday));
        // Ratios are all 1.0 for a flat week
        assert_relative_eq!(model.expected_seasonal_adjustment(monday), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn adjustment_uses_weekday_ratio() {
        let data = Dataset::new(weekly_rows("/a", "q", 70, 1000, 200));
        let model = SeasonalModel::fit(&data, &config());
        let sunday = start() + Duration::days(6);
        assert_relative_eq!(
            model.expected_seasonal_adjustment(sunday),
            200.0 / (5400.0 / 7.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn fit_is_deterministic() {
        let mut rows = weekly_rows("/a", "q", 84, 1000, 200);
        rows.extend(weekly_rows("/b", "r", 84, 800, 100));
        let data = Dataset::new(rows);
        let a = SeasonalModel::fit(&data, &config());
        let b = SeasonalModel::fit(&data, &config());
        assert_eq!(a.weekly_patterns(), b.weekly_patterns());
        assert_eq!(a.page_query_patterns(), b.page_query_patterns());
    }
}

//! Aggregate configuration for a full analysis run.

use crate::analysis::{
    CannibalizationConfig, CtrOutlierConfig, KeywordTrendConfig, TrafficChangeConfig,
    UrlPerformanceConfig,
};
use crate::error::Result;
use crate::report::PriorityConfig;
use crate::scoring::SignificanceFilter;
use crate::seasonality::SeasonalityConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Every component's configuration, each defaulting independently.
///
/// Deserializing a partial document fills the missing sections and fields
/// with their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub seasonality: SeasonalityConfig,
    pub traffic: TrafficChangeConfig,
    pub ctr: CtrOutlierConfig,
    pub keywords: KeywordTrendConfig,
    pub cannibalization: CannibalizationConfig,
    pub url: UrlPerformanceConfig,
    pub priority: PriorityConfig,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one significance filter to every analyzer.
    pub fn with_significance_filter(mut self, filter: SignificanceFilter) -> Self {
        self.traffic.filter = filter;
        self.ctr.filter = filter;
        self.keywords.filter = filter;
        self.url.filter = filter;
        self.cannibalization.filter = filter;
        self.cannibalization.min_impressions = filter.min_impressions;
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.seasonality.reference_date = Some(date);
        self
    }

    pub fn with_seasonality(mut self, config: SeasonalityConfig) -> Self {
        self.seasonality = config;
        self
    }

    pub fn with_traffic(mut self, config: TrafficChangeConfig) -> Self {
        self.traffic = config;
        self
    }

    pub fn with_ctr(mut self, config: CtrOutlierConfig) -> Self {
        self.ctr = config;
        self
    }

    pub fn with_keywords(mut self, config: KeywordTrendConfig) -> Self {
        self.keywords = config;
        self
    }

    pub fn with_cannibalization(mut self, config: CannibalizationConfig) -> Self {
        self.cannibalization = config;
        self
    }

    pub fn with_url(mut self, config: UrlPerformanceConfig) -> Self {
        self.url = config;
        self
    }

    pub fn with_priority(mut self, config: PriorityConfig) -> Self {
        self.priority = config;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.seasonality.validate()?;
        self.traffic.validate()?;
        self.ctr.validate()?;
        self.keywords.validate()?;
        self.cannibalization.validate()?;
        self.url.validate()?;
        self.priority.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ComparisonPeriod;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.traffic.comparison_period, ComparisonPeriod::Week);
        assert_eq!(config.url.comparison_period, ComparisonPeriod::Month);
        assert_eq!(config.keywords.trend_period_days, 30);
        assert_eq!(config.priority.threshold, 40.0);
    }

    #[test]
    fn partial_document_fills_defaults() {
        let json = r#"{
            "traffic": { "comparison_period": "month" },
            "priority": { "threshold": 25.0 },
            "keywords": { "exclude_seasonal": true }
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.traffic.comparison_period, ComparisonPeriod::Month);
        assert_eq!(config.traffic.min_change_pct, 15.0);
        assert_eq!(config.priority.threshold, 25.0);
        assert!(config.keywords.exclude_seasonal);
        assert_eq!(config.ctr, CtrOutlierConfig::default());
    }

    #[test]
    fn shared_filter_reaches_every_analyzer() {
        let config = EngineConfig::new().with_significance_filter(SignificanceFilter::new(50, 5));
        assert_eq!(config.traffic.filter.min_impressions, 50);
        assert_eq!(config.ctr.filter.min_clicks, 5);
        assert_eq!(config.keywords.filter.min_impressions, 50);
        assert_eq!(config.url.filter.min_impressions, 50);
        assert_eq!(config.cannibalization.min_impressions, 50);
        assert_eq!(config.cannibalization.filter.min_clicks, 5);
    }

    #[test]
    fn invalid_section_fails_validation() {
        let config = EngineConfig::new()
            .with_keywords(KeywordTrendConfig::default().with_trend_period_days(0));
        assert!(config.validate().is_err());

        let mut config = EngineConfig::new();
        config.seasonality.weekend_low_ratio = 2.0;
        assert!(config.validate().is_err());
    }
}

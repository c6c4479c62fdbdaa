//! Comparative analyzers over performance datasets.
//!
//! Each analyzer takes its configuration at construction and produces a typed
//! table from `analyze`. Analyzers that compare windows read the previous
//! window from a historical dataset; those that judge seasonality take a
//! [`SeasonalityOracle`](crate::seasonality::SeasonalityOracle).

pub(crate) mod aggregate;
pub mod cannibalization;
pub mod ctr;
pub mod keywords;
pub mod rules;
pub mod traffic;
pub mod url;

pub use cannibalization::{CannibalizationConfig, CannibalizationDetector, CannibalizationRow};
pub use ctr::{
    static_expected_ctr, CtrCurve, CtrOutlierAnalyzer, CtrOutlierConfig, CtrOutlierRow, CtrStatus,
};
pub use keywords::{
    opportunity_score, risk_score, KeywordTrendAnalyzer, KeywordTrendConfig, KeywordTrendRow,
    KeywordTrends,
};
pub use rules::{Rule, RuleSet};
pub use traffic::{
    change_rules, ChangeSignals, ChangeType, TrafficChangeAnalyzer, TrafficChangeConfig,
    TrafficChangeRow,
};
pub use url::{url_rules, UrlChange, UrlPerformanceAnalyzer, UrlPerformanceConfig, UrlPerformanceRow, UrlSignals};

//! The seasonality capability injected into comparative analyzers.

use crate::seasonality::SeasonalModel;

/// Answers whether a page/query change is plausibly seasonal.
///
/// Analyzers that compare two windows take an oracle at construction so they
/// can run with a fitted [`SeasonalModel`] or with [`NoSeasonality`] when no
/// history is available.
pub trait SeasonalityOracle {
    fn is_seasonal(&self, page: &str, query: &str, change_pct: f64) -> bool;
}

impl SeasonalityOracle for SeasonalModel {
    fn is_seasonal(&self, page: &str, query: &str, change_pct: f64) -> bool {
        self.is_change_seasonal(page, query, change_pct)
    }
}

/// Oracle that never attributes a change to seasonality.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSeasonality;

impl SeasonalityOracle for NoSeasonality {
    fn is_seasonal(&self, _page: &str, _query: &str, _change_pct: f64) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seasonality::SeasonalityConfig;

    #[test]
    fn stub_is_never_seasonal() {
        assert!(!NoSeasonality.is_seasonal("/a", "q", -90.0));
        assert!(!NoSeasonality.is_seasonal("/a", "q", 90.0));
    }

    #[test]
    fn unfitted_model_is_never_seasonal() {
        let model = SeasonalModel::empty(SeasonalityConfig::default());
        let oracle: &dyn SeasonalityOracle = &model;
        assert!(!oracle.is_seasonal("/a", "q", -50.0));
    }
}

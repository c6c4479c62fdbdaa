//! Volume-based significance scoring.
//!
//! Every analyzer uses the score as a confidence gate and the filter to drop
//! noisy low-volume rows before grouping.

mod significance;

pub use significance::{
    significance_score, significance_score_with_baseline, SignificanceBaseline, SignificanceFilter,
};

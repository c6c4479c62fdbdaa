//! Utility functions shared by the analyzers.

pub mod change;
pub mod stats;

pub use change::{percentage_change, position_delta, round_to};
pub use stats::{linear_fit, mean, median, population_variance, sample_std_dev};

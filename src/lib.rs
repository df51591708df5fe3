//! Season analytics for round-robin leagues: per-team aggregation,
//! normalized strength rates, a three-way outcome classifier, and a
//! season-split backtester over historical match results.

pub mod backtest;
pub mod classifier;
pub mod dataset;
pub mod error;
pub mod rates;
pub mod standings;

pub use crate::dataset::{Match, MatchDataset, MatchResult, RawTable};
pub use crate::error::MetricsError;

//! Analysis modules.
//!
//! Aggregation of the metric rows produced by a run.

pub mod aggregator;

pub use aggregator::*;

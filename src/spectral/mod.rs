//! Spectral planning module.

pub mod bins;

pub use bins::{plan_bins, ResponseRequest};

//! Run orchestration.

pub mod runner;

pub use runner::{run, RunConfig, RunContext};

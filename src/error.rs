//! Typed errors for the pairing core and its collaborators.
//!
//! Per-pair errors (`FetchError`, `EvalError`, `EngineError`, `DomainError`)
//! are caught by the orchestrator, logged and counted. Only `RunError`
//! aborts a run.

use thiserror::Error;

/// Invalid numeric input to one of the pure planners.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("sampling rate must be finite and > 0, got {0}")]
    InvalidSampleRate(f64),

    #[error("no frequency bins fit below Nyquist for sampling rate {0} Hz")]
    EmptyGrid(f64),

    #[error("response spectra differ in length: {left} vs {right}")]
    SpectrumMismatch { left: usize, right: usize },
}

/// Waveform retrieval failure for a single channel.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no data for {0}")]
    NoData(String),

    #[error("multiple epochs for {0}")]
    MultipleEpochs(String),

    #[error("fetch failed for {sncl}: {message}")]
    Transport { sncl: String, message: String },
}

impl FetchError {
    /// No data is an expected outcome and is logged quietly.
    pub fn is_no_data(&self) -> bool {
        matches!(self, FetchError::NoData(_))
    }
}

/// Instrument response evaluation failure.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("response request failed for {sncl}: {message}")]
    Request { sncl: String, message: String },

    #[error("malformed response table for {sncl}: {message}")]
    Parse { sncl: String, message: String },
}

/// Metric engine failure.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("metric engine request failed: {0}")]
    Request(String),

    #[error("metric engine returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Inventory retrieval failure. Fatal for a run.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("station service request failed: {0}")]
    Request(String),

    #[error("station service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to read inventory file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("inventory unavailable: {0}")]
    Inventory(#[from] InventoryError),
}

//! Collaborator interfaces and their HTTP adapters.
//!
//! The orchestrator only sees the four traits below. The adapters move
//! bytes and parse text tables; metric arithmetic stays in the engine.

pub mod engine;
pub mod evalresp;
pub mod fdsn;

pub use engine::HttpMetricEngine;
pub use evalresp::EvalrespClient;
pub use fdsn::{FdsnDataselectClient, FdsnStationClient, FileInventory};

use crate::error::{EngineError, EvalError, FetchError, InventoryError};
use crate::models::{ChannelAvailability, MetricRow, ResponseSpectrum, TimeWindow, Waveform};
use crate::spectral::ResponseRequest;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Source of channel epochs for a time window.
#[allow(async_fn_in_trait)]
pub trait InventorySource {
    async fn availability(
        &self,
        window: &TimeWindow,
    ) -> Result<Vec<ChannelAvailability>, InventoryError>;

    /// Human-readable origin for reports.
    fn describe(&self) -> String;
}

/// Waveform retrieval for one channel.
#[allow(async_fn_in_trait)]
pub trait WaveformSource {
    /// With `inclusive_end = false` a sample exactly at `window.end` is excluded.
    async fn fetch(
        &self,
        channel: &ChannelAvailability,
        window: &TimeWindow,
        inclusive_end: bool,
    ) -> Result<Waveform, FetchError>;
}

/// Instrument response evaluation over a frequency grid.
#[allow(async_fn_in_trait)]
pub trait ResponseEvaluator {
    async fn evaluate(
        &self,
        channel: &ChannelAvailability,
        time: DateTime<Utc>,
        request: &ResponseRequest,
    ) -> Result<ResponseSpectrum, EvalError>;
}

/// Opaque transfer-function metric computation.
#[allow(async_fn_in_trait)]
pub trait MetricEngine {
    async fn compute_transfer_function(
        &self,
        primary: &Waveform,
        secondary: &Waveform,
        primary_response: &ResponseSpectrum,
        secondary_response: &ResponseSpectrum,
    ) -> Result<Vec<MetricRow>, EngineError>;
}

/// Shared HTTP client with the configured timeout.
pub fn http_client(timeout_seconds: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("seispair/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Turn a transport error into a short message naming the endpoint.
pub(crate) fn describe_transport_error(err: &reqwest::Error, url: &str) -> String {
    if err.is_timeout() {
        format!("request to {} timed out", url)
    } else if err.is_connect() {
        format!("cannot connect to {}", url)
    } else {
        format!("request to {} failed: {}", url, err)
    }
}

/// Timestamp format accepted by FDSN and IRIS web services.
pub(crate) fn format_service_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

//! HTTP metric engine adapter.
//!
//! Both waveforms and both response tables are posted as one JSON document.
//! The engine answers with one metric row per line (JSON lines); a JSON
//! array of rows is accepted too.

use crate::error::EngineError;
use crate::models::{MetricRow, ResponseSpectrum, Waveform};
use crate::services::fdsn::parse_fdsn_time;
use crate::services::{describe_transport_error, MetricEngine};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Metric name requested from the engine.
pub const TRANSFER_FUNCTION: &str = "transfer_function";

/// Engine default when a row carries no quality flag.
const DEFAULT_QUALITY_FLAG: i32 = -9;

#[derive(Debug, Serialize)]
struct TransferFunctionRequest<'a> {
    metric: &'static str,
    primary: &'a Waveform,
    secondary: &'a Waveform,
    primary_response: &'a ResponseSpectrum,
    secondary_response: &'a ResponseSpectrum,
}

/// Metric engine reached over HTTP.
pub struct HttpMetricEngine {
    url: String,
    http: reqwest::Client,
}

impl HttpMetricEngine {
    pub fn new(url: &str, http: reqwest::Client) -> Self {
        Self {
            url: url.to_string(),
            http,
        }
    }
}

impl MetricEngine for HttpMetricEngine {
    async fn compute_transfer_function(
        &self,
        primary: &Waveform,
        secondary: &Waveform,
        primary_response: &ResponseSpectrum,
        secondary_response: &ResponseSpectrum,
    ) -> Result<Vec<MetricRow>, EngineError> {
        let request = TransferFunctionRequest {
            metric: TRANSFER_FUNCTION,
            primary,
            secondary,
            primary_response,
            secondary_response,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Request(describe_transport_error(&e, &self.url)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Status { status, body });
        }

        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Request(describe_transport_error(&e, &self.url)))?;

        Ok(parse_metric_rows(&body))
    }
}

/// Parse metric rows from an engine response body.
pub fn parse_metric_rows(body: &str) -> Vec<MetricRow> {
    let trimmed = body.trim();

    if trimmed.starts_with('[') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
            return items.iter().filter_map(json_to_row).collect();
        }
    }

    let mut rows = Vec::new();
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() || !line.starts_with('{') {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(json) => match json_to_row(&json) {
                Some(row) => rows.push(row),
                None => debug!("Ignoring incomplete metric row: {}", line),
            },
            Err(e) => debug!("Ignoring malformed metric line: {}", e),
        }
    }

    rows
}

fn json_to_row(json: &Value) -> Option<MetricRow> {
    Some(MetricRow {
        metric_name: json["metric_name"].as_str()?.to_string(),
        value: metric_value(&json["value"]),
        snclq: json["snclq"].as_str()?.to_string(),
        starttime: parse_fdsn_time(json["starttime"].as_str()?)?,
        endtime: parse_fdsn_time(json["endtime"].as_str()?)?,
        quality_flag: json["quality_flag"]
            .as_i64()
            .map(|flag| flag as i32)
            .unwrap_or(DEFAULT_QUALITY_FLAG),
    })
}

/// Numeric value, or `None` for placeholders such as `"N"`.
fn metric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

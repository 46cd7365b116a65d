//! IRIS evalresp adapter.
//!
//! Responses are requested as log-spaced `fap` tables, one
//! `frequency amplitude phase` triple per line.

use crate::error::EvalError;
use crate::models::{ChannelAvailability, ResponseSpectrum};
use crate::services::{describe_transport_error, format_service_time, ResponseEvaluator};
use crate::spectral::ResponseRequest;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Parse a whitespace-separated FAP table.
pub fn parse_fap(text: &str) -> Result<ResponseSpectrum, String> {
    let mut spectrum = ResponseSpectrum {
        frequencies: Vec::new(),
        amplitudes: Vec::new(),
        phases: Vec::new(),
    };

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let values: Vec<f64> = line
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|e| format!("line {}: {}", line_no + 1, e))?;

        match values.as_slice() {
            [freq, amp, phase] => {
                spectrum.frequencies.push(*freq);
                spectrum.amplitudes.push(*amp);
                spectrum.phases.push(*phase);
            }
            other => {
                return Err(format!(
                    "line {}: expected 3 columns, found {}",
                    line_no + 1,
                    other.len()
                ))
            }
        }
    }

    if spectrum.is_empty() {
        return Err("empty response table".to_string());
    }
    Ok(spectrum)
}

/// Response evaluation through the IRIS evalresp web service.
pub struct EvalrespClient {
    base_url: String,
    http: reqwest::Client,
}

impl EvalrespClient {
    pub fn new(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn query_params(
        channel: &ChannelAvailability,
        time: &DateTime<Utc>,
        request: &ResponseRequest,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("net", channel.network.clone()),
            ("sta", channel.station.clone()),
            ("loc", channel.location_query().to_string()),
            ("cha", channel.channel.clone()),
            ("time", format_service_time(time)),
            ("minfreq", request.min_freq.to_string()),
            ("maxfreq", request.max_freq.to_string()),
            ("nfreq", request.count.to_string()),
            ("units", request.units.clone()),
            ("output", request.output.clone()),
            ("spacing", "log".to_string()),
        ]
    }
}

impl ResponseEvaluator for EvalrespClient {
    async fn evaluate(
        &self,
        channel: &ChannelAvailability,
        time: DateTime<Utc>,
        request: &ResponseRequest,
    ) -> Result<ResponseSpectrum, EvalError> {
        let sncl = channel.sncl_id();
        let url = format!("{}/query", self.base_url);
        debug!(
            "Evaluating response for {} over {} bins ({:.4}-{:.4} Hz)",
            sncl, request.count, request.min_freq, request.max_freq
        );

        let response = self
            .http
            .get(&url)
            .query(&Self::query_params(channel, &time, request))
            .send()
            .await
            .map_err(|e| EvalError::Request {
                sncl: sncl.clone(),
                message: describe_transport_error(&e, &url),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EvalError::Request {
                sncl,
                message: format!("HTTP {}: {}", status.as_u16(), body.trim()),
            });
        }

        let text = response.text().await.map_err(|e| EvalError::Request {
            sncl: sncl.clone(),
            message: describe_transport_error(&e, &url),
        })?;

        parse_fap(&text).map_err(|message| EvalError::Parse { sncl, message })
    }
}

//! Log2-spaced frequency grid for instrument response requests.
//!
//! The grid is anchored at 0.1 Hz and stepped by an eighth of an octave in
//! both directions, down to a floor chosen from the sampling rate and up
//! to Nyquist.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};

/// Every grid contains this frequency when it fits below Nyquist.
pub const ANCHOR_FREQ: f64 = 0.1;

/// Grid spacing in log2 units (1/8 octave).
pub const OCTAVE_STEP: f64 = 0.125;

// Absorbs log2 rounding when a bound falls exactly on a grid point.
const STEP_EPSILON: f64 = 1e-9;

/// Planned frequency grid for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBins {
    /// Floor chosen from the sampling rate.
    pub lo_freq: f64,
    /// Nyquist frequency.
    pub hi_freq: f64,
    pub min_freq: f64,
    pub max_freq: f64,
    pub count: usize,
    /// Strictly increasing.
    pub frequencies: Vec<f64>,
}

/// Lowest frequency worth requesting for a sampling rate.
pub fn low_frequency_bound(sample_rate: f64) -> f64 {
    if sample_rate <= 1.0 {
        0.001
    } else if sample_rate < 10.0 {
        0.0025
    } else {
        0.005
    }
}

/// Derive the frequency grid for a sampling rate.
pub fn plan_bins(sample_rate: f64) -> Result<FrequencyBins, DomainError> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(DomainError::InvalidSampleRate(sample_rate));
    }

    let lo_freq = low_frequency_bound(sample_rate);
    let hi_freq = 0.5 * sample_rate;

    let anchor_log2 = ANCHOR_FREQ.log2();
    let point = |k: i64| {
        if k == 0 {
            ANCHOR_FREQ
        } else {
            (anchor_log2 + k as f64 * OCTAVE_STEP).exp2()
        }
    };

    let steps_down = steps_between(lo_freq.log2(), anchor_log2);
    let mut frequencies: Vec<f64> = (0..=steps_down).map(|k| point(-k)).collect();

    if ANCHOR_FREQ < hi_freq {
        let steps_up = steps_between(anchor_log2, hi_freq.log2());
        frequencies.extend((1..=steps_up).map(point));
    } else {
        frequencies.retain(|f| *f <= hi_freq);
    }

    frequencies.sort_by(|a, b| a.total_cmp(b));
    frequencies.dedup();

    let (min_freq, max_freq) = match (frequencies.first(), frequencies.last()) {
        (Some(min), Some(max)) => (*min, *max),
        _ => return Err(DomainError::EmptyGrid(sample_rate)),
    };

    Ok(FrequencyBins {
        lo_freq,
        hi_freq,
        min_freq,
        max_freq,
        count: frequencies.len(),
        frequencies,
    })
}

/// Whole grid steps from `from` up to `to`, both in log2 units.
fn steps_between(from: f64, to: f64) -> i64 {
    ((to - from) / OCTAVE_STEP + STEP_EPSILON).floor() as i64
}

/// Response evaluation request derived from a frequency grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRequest {
    pub min_freq: f64,
    pub max_freq: f64,
    pub count: usize,
    /// Output units; `def` is the response's own units.
    pub units: String,
    /// `fap`: frequency, amplitude, phase.
    pub output: String,
}

impl ResponseRequest {
    pub fn from_bins(bins: &FrequencyBins) -> Self {
        Self {
            min_freq: bins.min_freq,
            max_freq: bins.max_freq,
            count: bins.count,
            units: "def".to_string(),
            output: "fap".to_string(),
        }
    }
}

//! Data models for channel pairing and transfer-function runs.
//!
//! This module contains the core data structures shared by the pairing
//! planners, the orchestrator, the service adapters and the report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open time range `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

/// One channel epoch as reported by the station inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAvailability {
    pub network: String,
    pub station: String,
    /// Location code, empty when the inventory reports none.
    pub location: String,
    pub channel: String,
    /// Compass orientation in degrees.
    pub azimuth: f64,
    /// Tilt from horizontal in degrees; +/-90 is vertical.
    pub dip: f64,
    /// Samples per second.
    pub sample_rate: f64,
    pub starttime: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endtime: Option<DateTime<Utc>>,
}

impl ChannelAvailability {
    /// `network.station.location.channel`
    pub fn sncl_id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }

    /// The SNCL id with the orientation character removed.
    ///
    /// Orthogonal horizontal mates of one sensor share a prefix.
    pub fn sncl_prefix(&self) -> String {
        let mut id = self.sncl_id();
        id.pop();
        id
    }

    /// `network.station`
    pub fn network_station(&self) -> String {
        format!("{}.{}", self.network, self.station)
    }

    /// Channel code without its orientation character (e.g. `BH` for `BHZ`).
    pub fn channel_stem(&self) -> &str {
        match self.channel.char_indices().last() {
            Some((idx, _)) => &self.channel[..idx],
            None => "",
        }
    }

    /// Channel code without its band character (e.g. `HZ` for `BHZ`).
    pub fn channel_suffix(&self) -> &str {
        match self.channel.chars().next() {
            Some(band) => &self.channel[band.len_utf8()..],
            None => "",
        }
    }

    /// Location code as web services expect it (`--` for blank).
    pub fn location_query(&self) -> &str {
        if self.location.trim().is_empty() {
            "--"
        } else {
            &self.location
        }
    }
}

/// Cartesian axis assigned to a horizontal channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisTag {
    X,
    Y,
    /// No orthogonal mate, or a mate that is not orthogonal enough.
    Unknown,
}

impl fmt::Display for AxisTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisTag::X => write!(f, "X"),
            AxisTag::Y => write!(f, "Y"),
            AxisTag::Unknown => write!(f, "U"),
        }
    }
}

/// Horizontal channel with its resolved axis.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledChannel {
    pub channel: ChannelAvailability,
    pub axis: AxisTag,
}

/// Axis set a pair was enumerated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairAxis {
    /// Vertical pairs, and horizontal pairs with no known axis on either side.
    None,
    X,
    Y,
}

impl fmt::Display for PairAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairAxis::None => write!(f, "-"),
            PairAxis::X => write!(f, "X"),
            PairAxis::Y => write!(f, "Y"),
        }
    }
}

/// Whether the secondary channel must be rotated onto the primary's azimuth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rotation {
    None,
    Required { angle_deg: f64 },
}

impl Rotation {
    pub fn is_required(&self) -> bool {
        matches!(self, Rotation::Required { .. })
    }
}

/// Two channels selected for comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPair {
    pub primary: ChannelAvailability,
    pub secondary: ChannelAvailability,
    pub axis: PairAxis,
    /// Per-channel axis tags; `None` for vertical pairs.
    pub primary_axis: Option<AxisTag>,
    pub secondary_axis: Option<AxisTag>,
    pub rotation: Rotation,
}

impl ChannelPair {
    /// `primary:secondary` identifier used in logs and reports.
    pub fn label(&self) -> String {
        format!("{}:{}", self.primary.sncl_id(), self.secondary.sncl_id())
    }
}

/// Waveform data for one channel. The payload is opaque to this crate.
#[derive(Debug, Clone, Serialize)]
pub struct Waveform {
    pub sncl: String,
    pub window: TimeWindow,
    pub sample_rate: f64,
    pub payload: Vec<u8>,
}

/// Frequency / amplitude / phase table for one instrument response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpectrum {
    pub frequencies: Vec<f64>,
    pub amplitudes: Vec<f64>,
    pub phases: Vec<f64>,
}

impl ResponseSpectrum {
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

/// One metric value as produced by the metric engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub metric_name: String,
    /// `None` when the engine reports a non-numeric value.
    pub value: Option<f64>,
    pub snclq: String,
    pub starttime: DateTime<Utc>,
    pub endtime: DateTime<Utc>,
    pub quality_flag: i32,
}

/// Why a station, dip group, channel or pair was left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer than two channels in a dip group.
    InsufficientChannels,
    /// Same location and channel stem; the same sensor at another rate.
    SameInstrument,
    /// Neither vertical nor horizontal; needs 3-D rotation.
    ObliqueDip { dip: f64 },
    /// Three or more horizontals share one SNCL prefix.
    AmbiguousAxisGroup { prefix: String },
    /// Rotation is disabled in the run configuration.
    RotationUnsupported { angle_deg: f64 },
    /// Secondary channel has no unique orthogonal mate.
    MissingOrthogonalMate { candidates: usize },
    /// Secondary channel has no X/Y tag, so its mate cannot be chosen.
    AmbiguousAxis,
    /// Primary channel has no X/Y tag, so no rotated component fits.
    UnknownPrimaryAxis,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InsufficientChannels => write!(f, "no other channels for comparison"),
            SkipReason::SameInstrument => write!(f, "same instrument at another sample rate"),
            SkipReason::ObliqueDip { dip } => write!(f, "dip {} requires 3D rotation", dip),
            SkipReason::AmbiguousAxisGroup { prefix } => {
                write!(f, "3+ horizontal channels share prefix {}", prefix)
            }
            SkipReason::RotationUnsupported { angle_deg } => write!(
                f,
                "rotation by {:.1} deg not yet supported (rotation disabled)",
                angle_deg
            ),
            SkipReason::MissingOrthogonalMate { candidates } => write!(
                f,
                "expected exactly 1 orthogonal mate, found {}",
                candidates
            ),
            SkipReason::AmbiguousAxis => write!(f, "secondary axis unknown, cannot rotate"),
            SkipReason::UnknownPrimaryAxis => {
                write!(f, "primary axis unknown, cannot pick rotated component")
            }
        }
    }
}

impl SkipReason {
    /// Stable short key used to group skips in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::InsufficientChannels => "insufficient_channels",
            SkipReason::SameInstrument => "same_instrument",
            SkipReason::ObliqueDip { .. } => "oblique_dip",
            SkipReason::AmbiguousAxisGroup { .. } => "ambiguous_axis_group",
            SkipReason::RotationUnsupported { .. } => "rotation_unsupported",
            SkipReason::MissingOrthogonalMate { .. } => "missing_orthogonal_mate",
            SkipReason::AmbiguousAxis => "ambiguous_axis",
            SkipReason::UnknownPrimaryAxis => "unknown_primary_axis",
        }
    }

    /// Whether the skip removed an enumerated pair (as opposed to a channel).
    pub fn is_pair_level(&self) -> bool {
        matches!(
            self,
            SkipReason::SameInstrument
                | SkipReason::RotationUnsupported { .. }
                | SkipReason::MissingOrthogonalMate { .. }
                | SkipReason::AmbiguousAxis
                | SkipReason::UnknownPrimaryAxis
        )
    }
}

/// A policy skip: the subject is an SNCL, prefix or pair label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skip {
    pub subject: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

impl Skip {
    pub fn new(subject: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            subject: subject.into(),
            reason,
        }
    }
}

/// Processing stage at which a pair failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Bins,
    Response,
    Rotation,
    Metric,
}

impl FailureStage {
    /// Stages in processing order.
    pub const ALL: [FailureStage; 5] = [
        FailureStage::Fetch,
        FailureStage::Bins,
        FailureStage::Response,
        FailureStage::Rotation,
        FailureStage::Metric,
    ];
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Fetch => write!(f, "fetch"),
            FailureStage::Bins => write!(f, "bins"),
            FailureStage::Response => write!(f, "response"),
            FailureStage::Rotation => write!(f, "rotation"),
            FailureStage::Metric => write!(f, "metric"),
        }
    }
}

/// A transient per-pair failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFailure {
    pub pair: String,
    pub stage: FailureStage,
    pub message: String,
}

/// Frequency grid bounds recorded for a planned pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSummary {
    pub min_freq: f64,
    pub max_freq: f64,
    pub count: usize,
}

/// A pair that survived pairing policy, with its planned grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPair {
    pub pair: String,
    pub axis: PairAxis,
    pub rotation: Rotation,
    pub sample_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridSummary>,
}

/// Final metric table of a run.
///
/// `NoMetrics` means the engine produced nothing at all; `Metrics` with an
/// empty list means rows were produced but none passed the allow-list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "rows", rename_all = "snake_case")]
pub enum MetricsOutcome {
    NoMetrics,
    Metrics(Vec<MetricRow>),
}

impl MetricsOutcome {
    pub fn rows(&self) -> &[MetricRow] {
        match self {
            MetricsOutcome::NoMetrics => &[],
            MetricsOutcome::Metrics(rows) => rows,
        }
    }
}

/// Counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub stations: usize,
    pub pairs_planned: usize,
    pub pairs_computed: usize,
    pub pairs_failed: usize,
    pub pairs_skipped: usize,
    pub rows_produced: usize,
    pub rows_kept: usize,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub window: TimeWindow,
    pub outcome: MetricsOutcome,
    pub stats: RunStats,
    pub planned: Vec<PlannedPair>,
    pub skips: Vec<Skip>,
    pub failures: Vec<PairFailure>,
}

/// Metadata about the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Network/station selection the run covered.
    pub selection: String,
    pub generated_at: DateTime<Utc>,
    /// Where the inventory came from (service URL or file path).
    pub inventory_source: String,
    pub metrics_allowed: Vec<String>,
    pub rotation_enabled: bool,
    pub plan_only: bool,
    pub duration_seconds: f64,
}

/// The complete run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub run: RunReport,
}

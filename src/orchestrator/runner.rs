//! Run driver: stations, then pairs, then collaborators.
//!
//! Stations are independent. Each station future owns its row buffer and
//! hands it back; buffers are merged once every station is done. A failing
//! pair is logged, recorded and skipped without affecting its siblings.

use crate::analysis::aggregate;
use crate::error::{DomainError, EngineError, EvalError, FetchError, RunError};
use crate::models::{
    ChannelAvailability, ChannelPair, FailureStage, GridSummary, LabeledChannel, MetricRow,
    PairFailure, PlannedPair, Rotation, RunReport, RunStats, Skip, SkipReason, TimeWindow,
};
use crate::pairing::{filter_seismic, plan_rotation, plan_station, ComponentSource, RotationPlan};
use crate::services::{InventorySource, MetricEngine, ResponseEvaluator, WaveformSource};
use crate::spectral::{plan_bins, ResponseRequest};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub window: TimeWindow,
    /// Metric names kept in the final table.
    pub metrics: HashSet<String>,
    /// Channel codes removed before pairing.
    pub excluded_channels: Vec<String>,
    pub rotation_enabled: bool,
    /// Stations processed at once; 1 is strictly sequential.
    pub concurrency: usize,
    /// Stop after pairing and bin planning.
    pub plan_only: bool,
}

/// Collaborators and settings for a run.
pub struct RunContext<'a, W, R, M> {
    pub waveforms: &'a W,
    pub responses: &'a R,
    pub engine: &'a M,
    pub config: &'a RunConfig,
}

// Manual impls: the collaborators themselves need not be Clone.
impl<W, R, M> Clone for RunContext<'_, W, R, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W, R, M> Copy for RunContext<'_, W, R, M> {}

/// Transient failure of one pair.
#[derive(Debug, Error)]
enum PairError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("frequency bins: {0}")]
    Bins(DomainError),

    #[error(transparent)]
    Response(#[from] EvalError),

    #[error("rotation: {0}")]
    Rotation(DomainError),

    #[error(transparent)]
    Metric(#[from] EngineError),
}

impl PairError {
    fn stage(&self) -> FailureStage {
        match self {
            PairError::Fetch(_) => FailureStage::Fetch,
            PairError::Bins(_) => FailureStage::Bins,
            PairError::Response(_) => FailureStage::Response,
            PairError::Rotation(_) => FailureStage::Rotation,
            PairError::Metric(_) => FailureStage::Metric,
        }
    }

    fn log(&self, label: &str) {
        match self {
            PairError::Fetch(e) if e.is_no_data() => debug!("{} skipped: {}", label, e),
            PairError::Fetch(e) => warn!("{} skipped: {}", label, e),
            PairError::Bins(e) | PairError::Rotation(e) => warn!("{} skipped: {}", label, e),
            PairError::Response(e) => warn!("{} skipped: {}", label, e),
            PairError::Metric(e) => error!(
                "\"transfer_function\" metric calculation failed for {}: {}",
                label, e
            ),
        }
    }
}

/// Everything one station produced.
#[derive(Debug, Default)]
struct StationOutcome {
    network_station: String,
    rows: Vec<MetricRow>,
    planned: Vec<PlannedPair>,
    skips: Vec<Skip>,
    failures: Vec<PairFailure>,
    pairs_computed: usize,
}

/// Fetch the inventory and process it. Only an inventory failure aborts.
pub async fn run<I, W, R, M>(
    inventory: &I,
    ctx: RunContext<'_, W, R, M>,
    progress: Option<&ProgressBar>,
) -> Result<RunReport, RunError>
where
    I: InventorySource,
    W: WaveformSource,
    R: ResponseEvaluator,
    M: MetricEngine,
{
    let availability = inventory.availability(&ctx.config.window).await?;
    info!(
        "Inventory returned {} channel epochs from {}",
        availability.len(),
        inventory.describe()
    );

    Ok(process_availability(availability, ctx, progress).await)
}

/// Group availability by station and process every station.
pub async fn process_availability<W, R, M>(
    availability: Vec<ChannelAvailability>,
    ctx: RunContext<'_, W, R, M>,
    progress: Option<&ProgressBar>,
) -> RunReport
where
    W: WaveformSource,
    R: ResponseEvaluator,
    M: MetricEngine,
{
    let mut stations: BTreeMap<String, Vec<ChannelAvailability>> = BTreeMap::new();
    for row in availability {
        stations.entry(row.network_station()).or_default().push(row);
    }

    let station_count = stations.len();
    if let Some(pb) = progress {
        pb.set_length(station_count as u64);
    }

    let mut outcomes: Vec<StationOutcome> = stream::iter(stations)
        .map(|(network_station, rows)| async move {
            let outcome = process_station(network_station, &rows, ctx).await;
            if let Some(pb) = progress {
                pb.inc(1);
            }
            outcome
        })
        .buffer_unordered(ctx.config.concurrency.max(1))
        .collect()
        .await;

    outcomes.sort_by(|a, b| a.network_station.cmp(&b.network_station));

    let mut buffers = Vec::with_capacity(outcomes.len());
    let mut planned = Vec::new();
    let mut skips = Vec::new();
    let mut failures = Vec::new();
    let mut pairs_computed = 0;

    for outcome in outcomes {
        buffers.push(outcome.rows);
        planned.extend(outcome.planned);
        skips.extend(outcome.skips);
        failures.extend(outcome.failures);
        pairs_computed += outcome.pairs_computed;
    }

    let rows_produced: usize = buffers.iter().map(Vec::len).sum();
    let outcome = aggregate(buffers, &ctx.config.metrics);

    let stats = RunStats {
        stations: station_count,
        pairs_planned: planned.len(),
        pairs_computed,
        pairs_failed: failures.len(),
        pairs_skipped: skips.iter().filter(|s| s.reason.is_pair_level()).count(),
        rows_produced,
        rows_kept: outcome.rows().len(),
    };

    info!(
        "Processed {} stations: {} pairs planned, {} computed, {} failed, {} rows kept",
        stats.stations,
        stats.pairs_planned,
        stats.pairs_computed,
        stats.pairs_failed,
        stats.rows_kept
    );

    RunReport {
        window: ctx.config.window,
        outcome,
        stats,
        planned,
        skips,
        failures,
    }
}

async fn process_station<W, R, M>(
    network_station: String,
    rows: &[ChannelAvailability],
    ctx: RunContext<'_, W, R, M>,
) -> StationOutcome
where
    W: WaveformSource,
    R: ResponseEvaluator,
    M: MetricEngine,
{
    let seismic = filter_seismic(rows, &ctx.config.excluded_channels);
    let plan = plan_station(&seismic);
    let multi_epoch = multi_epoch_channels(&seismic);
    debug!(
        "{}: {} seismic channels, {} candidate pairs",
        network_station,
        seismic.len(),
        plan.pairs.len()
    );

    let mut outcome = StationOutcome {
        network_station,
        skips: plan.skips.clone(),
        ..StationOutcome::default()
    };

    for pair in &plan.pairs {
        let rotation = match pair.rotation {
            Rotation::None => None,
            Rotation::Required { angle_deg } => {
                let enabled = ctx.config.rotation_enabled;
                match gate_rotation(pair, angle_deg, &plan.horizontals, enabled) {
                    Ok(rotation) => Some(rotation),
                    Err(reason) => {
                        outcome.skips.push(Skip::new(pair.label(), reason));
                        continue;
                    }
                }
            }
        };

        outcome.planned.push(planned_pair(pair));
        if ctx.config.plan_only {
            continue;
        }

        match process_pair(pair, rotation.as_ref(), &multi_epoch, ctx).await {
            Ok(rows) => {
                outcome.pairs_computed += 1;
                outcome.rows.extend(rows);
            }
            Err(err) => {
                let label = pair.label();
                err.log(&label);
                outcome.failures.push(PairFailure {
                    pair: label,
                    stage: err.stage(),
                    message: err.to_string(),
                });
            }
        }
    }

    outcome
}

/// SNCLs listed with more than one epoch inside the window.
fn multi_epoch_channels(rows: &[ChannelAvailability]) -> HashSet<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(ChannelAvailability::sncl_id)
        .filter(|sncl| !seen.insert(sncl.clone()))
        .collect()
}

fn gate_rotation(
    pair: &ChannelPair,
    angle_deg: f64,
    horizontals: &[LabeledChannel],
    enabled: bool,
) -> Result<RotationPlan, SkipReason> {
    if !enabled {
        info!(
            "Skipping {}: rotation by {:.1} deg not yet supported",
            pair.label(),
            angle_deg
        );
        return Err(SkipReason::RotationUnsupported { angle_deg });
    }

    plan_rotation(pair, angle_deg, horizontals).map_err(|reason| {
        warn!("Skipping {}: {}", pair.label(), reason);
        reason
    })
}

fn planned_pair(pair: &ChannelPair) -> PlannedPair {
    let sample_rate = pair.primary.sample_rate.min(pair.secondary.sample_rate);
    let grid = plan_bins(sample_rate).ok().map(|bins| GridSummary {
        min_freq: bins.min_freq,
        max_freq: bins.max_freq,
        count: bins.count,
    });

    PlannedPair {
        pair: pair.label(),
        axis: pair.axis,
        rotation: pair.rotation,
        sample_rate,
        grid,
    }
}

async fn process_pair<W, R, M>(
    pair: &ChannelPair,
    rotation: Option<&RotationPlan>,
    multi_epoch: &HashSet<String>,
    ctx: RunContext<'_, W, R, M>,
) -> Result<Vec<MetricRow>, PairError>
where
    W: WaveformSource,
    R: ResponseEvaluator,
    M: MetricEngine,
{
    let window = &ctx.config.window;

    // The response of a channel that changed mid-window is ambiguous
    let channels = [&pair.primary, &pair.secondary]
        .into_iter()
        .chain(rotation.map(|plan| &plan.mate));
    for channel in channels {
        let sncl = channel.sncl_id();
        if multi_epoch.contains(&sncl) {
            return Err(FetchError::MultipleEpochs(sncl).into());
        }
    }

    let primary = ctx.waveforms.fetch(&pair.primary, window, false).await?;
    let secondary = ctx.waveforms.fetch(&pair.secondary, window, false).await?;
    let mate = match rotation {
        Some(plan) => Some(ctx.waveforms.fetch(&plan.mate, window, false).await?),
        None => None,
    };

    let sample_rate = primary.sample_rate.min(secondary.sample_rate);
    let bins = plan_bins(sample_rate).map_err(PairError::Bins)?;
    let request = ResponseRequest::from_bins(&bins);

    let primary_response = ctx
        .responses
        .evaluate(&pair.primary, primary.window.start, &request)
        .await?;
    let secondary_response = ctx
        .responses
        .evaluate(&pair.secondary, secondary.window.start, &request)
        .await?;

    let (secondary, secondary_response) = match (rotation, mate) {
        (Some(plan), Some(mate)) => {
            let mate_response = ctx
                .responses
                .evaluate(&plan.mate, mate.window.start, &request)
                .await?;
            let rotated = plan
                .apply(&secondary_response, &mate_response)
                .map_err(PairError::Rotation)?;
            let component = match plan.component_source() {
                ComponentSource::Secondary => secondary,
                ComponentSource::Mate => mate,
            };
            (component, rotated)
        }
        _ => (secondary, secondary_response),
    };

    info!("Calculating transfer function metrics for {}", pair.label());
    let rows = ctx
        .engine
        .compute_transfer_function(&primary, &secondary, &primary_response, &secondary_response)
        .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::InventoryError;
    use crate::models::fixtures::{horizontal, vertical, window};
    use crate::models::{MetricsOutcome, ResponseSpectrum, Waveform};
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StaticInventory(Vec<ChannelAvailability>);

    impl InventorySource for StaticInventory {
        async fn availability(
            &self,
            _window: &TimeWindow,
        ) -> Result<Vec<ChannelAvailability>, InventoryError> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }

    struct FailingInventory;

    impl InventorySource for FailingInventory {
        async fn availability(
            &self,
            _window: &TimeWindow,
        ) -> Result<Vec<ChannelAvailability>, InventoryError> {
            Err(InventoryError::Request("connection refused".to_string()))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    #[derive(Default)]
    struct FakeWaveforms {
        missing: HashSet<String>,
        fetched: Mutex<Vec<String>>,
    }

    impl WaveformSource for FakeWaveforms {
        async fn fetch(
            &self,
            channel: &ChannelAvailability,
            window: &TimeWindow,
            inclusive_end: bool,
        ) -> Result<Waveform, FetchError> {
            assert!(!inclusive_end);
            let sncl = channel.sncl_id();
            self.fetched.lock().unwrap().push(sncl.clone());
            if self.missing.contains(&sncl) {
                return Err(FetchError::NoData(sncl));
            }
            Ok(Waveform {
                sncl,
                window: *window,
                sample_rate: channel.sample_rate,
                payload: vec![0u8; 8],
            })
        }
    }

    #[derive(Default)]
    struct FakeResponses {
        /// Flat amplitude per SNCL; 1.0 when absent.
        gains: HashMap<String, f64>,
        requests: Mutex<Vec<ResponseRequest>>,
    }

    impl ResponseEvaluator for FakeResponses {
        async fn evaluate(
            &self,
            channel: &ChannelAvailability,
            _time: DateTime<Utc>,
            request: &ResponseRequest,
        ) -> Result<ResponseSpectrum, EvalError> {
            self.requests.lock().unwrap().push(request.clone());
            let gain = self.gains.get(&channel.sncl_id()).copied().unwrap_or(1.0);
            Ok(ResponseSpectrum {
                frequencies: vec![request.min_freq; request.count],
                amplitudes: vec![gain; request.count],
                phases: vec![0.0; request.count],
            })
        }
    }

    struct FakeEngine {
        metric_name: Option<String>,
        /// `snclq` and secondary amplitudes of every call.
        calls: Mutex<Vec<(String, Vec<f64>)>>,
    }

    impl FakeEngine {
        fn producing(metric_name: &str) -> Self {
            Self {
                metric_name: Some(metric_name.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn silent() -> Self {
            Self {
                metric_name: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn secondary_amplitudes(&self, snclq: &str) -> Option<Vec<f64>> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|(called, _)| called == snclq)
                .map(|(_, amplitudes)| amplitudes.clone())
        }
    }

    impl MetricEngine for FakeEngine {
        async fn compute_transfer_function(
            &self,
            primary: &Waveform,
            secondary: &Waveform,
            _primary_response: &ResponseSpectrum,
            secondary_response: &ResponseSpectrum,
        ) -> Result<Vec<MetricRow>, EngineError> {
            let snclq = format!("{}:{}", primary.sncl, secondary.sncl);
            self.calls
                .lock()
                .unwrap()
                .push((snclq.clone(), secondary_response.amplitudes.clone()));

            Ok(self
                .metric_name
                .iter()
                .map(|name| MetricRow {
                    metric_name: name.clone(),
                    value: None,
                    snclq: snclq.clone(),
                    starttime: primary.window.start,
                    endtime: primary.window.end,
                    quality_flag: -9,
                })
                .collect())
        }
    }

    fn create_test_config() -> RunConfig {
        Config::default().run_config(window(), false)
    }

    fn offset_horizontals() -> Vec<ChannelAvailability> {
        vec![
            horizontal("00", "BHN", 0.0),
            horizontal("00", "BHE", 90.0),
            horizontal("10", "BH1", 30.0),
            horizontal("10", "BH2", 120.0),
        ]
    }

    #[tokio::test]
    async fn test_two_verticals_end_to_end() {
        let waveforms = FakeWaveforms::default();
        let responses = FakeResponses::default();
        let engine = FakeEngine::producing("transfer_function");
        let config = create_test_config();
        let ctx = RunContext {
            waveforms: &waveforms,
            responses: &responses,
            engine: &engine,
            config: &config,
        };

        let inventory = StaticInventory(vec![vertical("00", "BHZ"), vertical("10", "BHZ")]);
        let report = run(&inventory, ctx, None).await.unwrap();

        assert_eq!(report.stats.pairs_planned, 1);
        assert_eq!(engine.call_count(), 1);
        assert_eq!(report.outcome.rows().len(), 1);

        let requests = responses.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        for request in requests.iter() {
            assert!(request.min_freq >= 0.005);
            assert!(request.max_freq <= 20.0);
        }
    }

    #[tokio::test]
    async fn test_failing_fetch_does_not_block_later_pairs() {
        let waveforms = FakeWaveforms {
            missing: HashSet::from(["IU.ANMO.10.BHZ".to_string()]),
            ..FakeWaveforms::default()
        };
        let responses = FakeResponses::default();
        let engine = FakeEngine::producing("transfer_function");
        let config = RunConfig {
            concurrency: 1,
            ..create_test_config()
        };
        let ctx = RunContext {
            waveforms: &waveforms,
            responses: &responses,
            engine: &engine,
            config: &config,
        };

        let rows = vec![
            vertical("00", "BHZ"),
            vertical("10", "BHZ"),
            vertical("20", "BHZ"),
        ];
        let report = process_availability(rows, ctx, None).await;

        assert_eq!(report.stats.pairs_planned, 3);
        assert_eq!(report.stats.pairs_computed, 1);
        assert_eq!(report.stats.pairs_failed, 2);
        assert!(report.failures.iter().all(|f| f.stage == FailureStage::Fetch));
        assert_eq!(report.outcome.rows().len(), 1);
        assert_eq!(
            report.outcome.rows()[0].snclq,
            "IU.ANMO.00.BHZ:IU.ANMO.20.BHZ"
        );
    }

    #[tokio::test]
    async fn test_no_rows_is_no_metrics() {
        let waveforms = FakeWaveforms::default();
        let responses = FakeResponses::default();
        let engine = FakeEngine::silent();
        let config = create_test_config();
        let ctx = RunContext {
            waveforms: &waveforms,
            responses: &responses,
            engine: &engine,
            config: &config,
        };

        let report =
            process_availability(vec![vertical("00", "BHZ"), vertical("10", "BHZ")], ctx, None)
                .await;

        assert_eq!(engine.call_count(), 1);
        assert_eq!(report.outcome, MetricsOutcome::NoMetrics);
    }

    #[tokio::test]
    async fn test_filtered_rows_are_empty_metrics() {
        let waveforms = FakeWaveforms::default();
        let responses = FakeResponses::default();
        let engine = FakeEngine::producing("gain_ratio");
        let config = create_test_config();
        let ctx = RunContext {
            waveforms: &waveforms,
            responses: &responses,
            engine: &engine,
            config: &config,
        };

        let report =
            process_availability(vec![vertical("00", "BHZ"), vertical("10", "BHZ")], ctx, None)
                .await;

        assert_eq!(report.outcome, MetricsOutcome::Metrics(vec![]));
        assert_eq!(report.stats.rows_produced, 1);
        assert_eq!(report.stats.rows_kept, 0);
    }

    #[tokio::test]
    async fn test_inventory_failure_is_fatal() {
        let waveforms = FakeWaveforms::default();
        let responses = FakeResponses::default();
        let engine = FakeEngine::silent();
        let config = create_test_config();
        let ctx = RunContext {
            waveforms: &waveforms,
            responses: &responses,
            engine: &engine,
            config: &config,
        };

        let err = run(&FailingInventory, ctx, None).await.unwrap_err();
        assert!(matches!(err, RunError::Inventory(_)));
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_plan_only_makes_no_calls() {
        let waveforms = FakeWaveforms::default();
        let responses = FakeResponses::default();
        let engine = FakeEngine::producing("transfer_function");
        let config = RunConfig {
            plan_only: true,
            ..create_test_config()
        };
        let ctx = RunContext {
            waveforms: &waveforms,
            responses: &responses,
            engine: &engine,
            config: &config,
        };

        let report =
            process_availability(vec![vertical("00", "BHZ"), vertical("10", "BHZ")], ctx, None)
                .await;

        assert!(waveforms.fetched.lock().unwrap().is_empty());
        assert_eq!(engine.call_count(), 0);
        assert_eq!(report.planned.len(), 1);
        let grid = report.planned[0].grid.unwrap();
        assert!(grid.min_freq >= 0.005);
        assert!(grid.max_freq <= 20.0);
        assert_eq!(report.outcome, MetricsOutcome::NoMetrics);
    }

    #[tokio::test]
    async fn test_rotation_disabled_skips_offset_pairs() {
        let waveforms = FakeWaveforms::default();
        let responses = FakeResponses::default();
        let engine = FakeEngine::producing("transfer_function");
        let config = create_test_config();
        let ctx = RunContext {
            waveforms: &waveforms,
            responses: &responses,
            engine: &engine,
            config: &config,
        };

        let report = process_availability(offset_horizontals(), ctx, None).await;

        assert_eq!(engine.call_count(), 0);
        assert_eq!(report.stats.pairs_skipped, 2);
        assert!(report
            .skips
            .iter()
            .all(|s| matches!(s.reason, SkipReason::RotationUnsupported { .. })));
    }

    #[tokio::test]
    async fn test_rotation_enabled_fetches_mate() {
        let waveforms = FakeWaveforms::default();
        let responses = FakeResponses {
            gains: HashMap::from([
                ("IU.ANMO.10.BH1".to_string(), 2.0),
                ("IU.ANMO.10.BH2".to_string(), 10.0),
            ]),
            ..FakeResponses::default()
        };
        let engine = FakeEngine::producing("transfer_function");
        let config = RunConfig {
            rotation_enabled: true,
            concurrency: 1,
            ..create_test_config()
        };
        let ctx = RunContext {
            waveforms: &waveforms,
            responses: &responses,
            engine: &engine,
            config: &config,
        };

        let report = process_availability(offset_horizontals(), ctx, None).await;

        assert_eq!(engine.call_count(), 2);
        assert_eq!(report.stats.pairs_computed, 2);
        // primary, secondary and orthogonal mate per pair
        assert_eq!(waveforms.fetched.lock().unwrap().len(), 6);
        assert_eq!(responses.requests.lock().unwrap().len(), 6);

        // 330 deg: cos² = 0.75, sin² = 0.25. BH1 is Y (gain 2), BH2 is X (gain 10).
        let x = engine
            .secondary_amplitudes("IU.ANMO.00.BHE:IU.ANMO.10.BH2")
            .unwrap();
        assert!(!x.is_empty());
        assert!(x.iter().all(|amp| (amp - (0.25 * 2.0 + 0.75 * 10.0)).abs() < 1e-9));

        let y = engine
            .secondary_amplitudes("IU.ANMO.00.BHN:IU.ANMO.10.BH1")
            .unwrap();
        assert!(y.iter().all(|amp| (amp - (0.75 * 2.0 + 0.25 * 10.0)).abs() < 1e-9));
    }

    #[tokio::test]
    async fn test_stations_processed_independently() {
        let waveforms = FakeWaveforms::default();
        let responses = FakeResponses::default();
        let engine = FakeEngine::producing("transfer_function");
        let config = RunConfig {
            concurrency: 2,
            ..create_test_config()
        };
        let ctx = RunContext {
            waveforms: &waveforms,
            responses: &responses,
            engine: &engine,
            config: &config,
        };

        let mut rows = Vec::new();
        for station in ["ANMO", "COLA", "KONO"] {
            for location in ["00", "10"] {
                let mut row = vertical(location, "BHZ");
                row.station = station.to_string();
                rows.push(row);
            }
        }
        let mut log = vertical("", "LOG");
        log.dip = 0.0;
        rows.push(log);

        let report = process_availability(rows, ctx, None).await;

        assert_eq!(report.stats.stations, 3);
        assert_eq!(report.stats.pairs_computed, 3);
        assert_eq!(report.outcome.rows().len(), 3);
        assert!(report.skips.is_empty());
    }

    #[tokio::test]
    async fn test_channel_with_two_epochs_fails_its_pairs() {
        let waveforms = FakeWaveforms::default();
        let responses = FakeResponses::default();
        let engine = FakeEngine::producing("transfer_function");
        let config = create_test_config();
        let ctx = RunContext {
            waveforms: &waveforms,
            responses: &responses,
            engine: &engine,
            config: &config,
        };

        let rows = vec![
            vertical("00", "BHZ"),
            vertical("00", "BHZ"),
            vertical("10", "BHZ"),
        ];
        let report = process_availability(rows, ctx, None).await;

        assert_eq!(report.stats.pairs_failed, 2);
        assert!(report
            .failures
            .iter()
            .all(|f| f.stage == FailureStage::Fetch && f.message.contains("multiple epochs")));
        assert!(waveforms.fetched.lock().unwrap().is_empty());
        assert_eq!(report.outcome, MetricsOutcome::NoMetrics);
    }
}

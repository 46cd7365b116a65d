//! Metric row aggregation and run statistics.
//!
//! This module provides the allow-list filter applied to the merged metric
//! rows and the groupings used by the report.

use crate::models::{FailureStage, MetricRow, MetricsOutcome, PairFailure, Skip};
use std::collections::{BTreeMap, HashSet};

/// Keep rows whose metric name is in the allow-list.
pub fn filter_allowed(rows: Vec<MetricRow>, allowed: &HashSet<String>) -> Vec<MetricRow> {
    rows.into_iter()
        .filter(|row| allowed.contains(&row.metric_name))
        .collect()
}

/// Merge per-station buffers into the final outcome.
///
/// No rows at all is `NoMetrics`; rows that are all filtered out give an
/// empty `Metrics`.
pub fn aggregate(buffers: Vec<Vec<MetricRow>>, allowed: &HashSet<String>) -> MetricsOutcome {
    let rows: Vec<MetricRow> = buffers.into_iter().flatten().collect();

    if rows.is_empty() {
        return MetricsOutcome::NoMetrics;
    }

    MetricsOutcome::Metrics(filter_allowed(rows, allowed))
}

/// Count rows by metric name.
pub fn count_by_metric(rows: &[MetricRow]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for row in rows {
        *counts.entry(row.metric_name.clone()).or_default() += 1;
    }

    counts
}

/// Count skips by reason, most frequent first.
pub fn skip_counts(skips: &[Skip]) -> Vec<(&'static str, usize)> {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();

    for skip in skips {
        *counts.entry(skip.reason.kind()).or_default() += 1;
    }

    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    sorted
}

/// Count failures by processing stage.
pub fn failure_counts(failures: &[PairFailure]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for failure in failures {
        *counts.entry(failure.stage.to_string()).or_default() += 1;
    }

    counts
}

/// Failures at the given stage.
pub fn failures_at(failures: &[PairFailure], stage: FailureStage) -> Vec<&PairFailure> {
    failures.iter().filter(|f| f.stage == stage).collect()
}

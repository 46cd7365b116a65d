//! Report generation.
//!
//! This module renders a run as Markdown for people, JSON for tooling and
//! CSV for the metric table alone.

use crate::analysis::{count_by_metric, failure_counts, failures_at, skip_counts};
use crate::models::{
    FailureStage, MetricRow, MetricsOutcome, PairFailure, PlannedPair, Report, ReportMetadata,
    Rotation, RunStats, Skip,
};
use anyhow::{Context, Result};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Transfer Function Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata, report));
    output.push_str(&generate_summary_section(&report.run.stats));
    output.push_str(&generate_metrics_section(&report.run.outcome));
    output.push_str(&generate_planned_section(&report.run.planned));
    output.push_str(&generate_skips_section(&report.run.skips));
    output.push_str(&generate_failures_section(&report.run.failures));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata, report: &Report) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Selection:** {}\n", metadata.selection));
    section.push_str(&format!("- **Window:** {}\n", report.run.window));
    section.push_str(&format!(
        "- **Inventory:** `{}`\n",
        metadata.inventory_source
    ));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Metrics Allowed:** {}\n",
        metadata.metrics_allowed.join(", ")
    ));
    section.push_str(&format!(
        "- **Rotation:** {}\n",
        if metadata.rotation_enabled {
            "enabled"
        } else {
            "disabled"
        }
    ));
    if metadata.plan_only {
        section.push_str("- **Mode:** plan only (no data fetched)\n");
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(stats: &RunStats) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Stations | Pairs Planned | Computed | Failed | Skipped | Rows Produced | Rows Kept |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} | {} |\n\n",
        stats.stations,
        stats.pairs_planned,
        stats.pairs_computed,
        stats.pairs_failed,
        stats.pairs_skipped,
        stats.rows_produced,
        stats.rows_kept
    ));

    section
}

/// Generate the metric table.
fn generate_metrics_section(outcome: &MetricsOutcome) -> String {
    let mut section = String::new();

    section.push_str("## Metrics\n\n");

    let rows = match outcome {
        MetricsOutcome::NoMetrics => {
            section.push_str("No metrics were computed.\n\n");
            return section;
        }
        MetricsOutcome::Metrics(rows) if rows.is_empty() => {
            section.push_str("Metrics were computed but none passed the metric allow-list.\n\n");
            return section;
        }
        MetricsOutcome::Metrics(rows) => rows,
    };

    for (metric, count) in count_by_metric(rows) {
        section.push_str(&format!("- **{}:** {} rows\n", metric, count));
    }
    section.push('\n');

    section.push_str("| Metric | SNCLQ | Value | Start | End | Quality |\n");
    section.push_str("|:---|:---|:---:|:---|:---|:---:|\n");
    for row in rows {
        section.push_str(&format!(
            "| {} | `{}` | {} | {} | {} | {} |\n",
            row.metric_name,
            row.snclq,
            format_value(row),
            row.starttime.format("%Y-%m-%dT%H:%M:%S"),
            row.endtime.format("%Y-%m-%dT%H:%M:%S"),
            row.quality_flag
        ));
    }
    section.push('\n');

    section
}

/// Generate the planned pairs table.
fn generate_planned_section(planned: &[PlannedPair]) -> String {
    let mut section = String::new();

    section.push_str("## Planned Pairs\n\n");

    if planned.is_empty() {
        section.push_str("No channel pairs survived the pairing rules.\n\n");
        return section;
    }

    section.push_str("| Pair | Axis | Rotation | Rate (Hz) | Bins | Range (Hz) |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---|\n");
    for pair in planned {
        let rotation = match pair.rotation {
            Rotation::None => "-".to_string(),
            Rotation::Required { angle_deg } => format!("{:.1}°", angle_deg),
        };
        let (bins, range) = match pair.grid {
            Some(grid) => (
                grid.count.to_string(),
                format!("{:.4} - {:.3}", grid.min_freq, grid.max_freq),
            ),
            None => ("-".to_string(), "invalid sample rate".to_string()),
        };
        section.push_str(&format!(
            "| `{}` | {} | {} | {} | {} | {} |\n",
            pair.pair, pair.axis, rotation, pair.sample_rate, bins, range
        ));
    }
    section.push('\n');

    section
}

/// Generate the skipped section.
fn generate_skips_section(skips: &[Skip]) -> String {
    if skips.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Skipped\n\n");
    section.push_str("| Reason | Count |\n");
    section.push_str("|:---|:---:|\n");
    for (reason, count) in skip_counts(skips) {
        section.push_str(&format!("| {} | {} |\n", reason, count));
    }
    section.push('\n');

    section.push_str("<details>\n<summary>All skips</summary>\n\n");
    for skip in skips {
        section.push_str(&format!("- `{}`: {}\n", skip.subject, skip.reason));
    }
    section.push_str("\n</details>\n\n");

    section
}

/// Generate the failures section.
fn generate_failures_section(failures: &[PairFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Failures\n\n");
    let counts: Vec<String> = failure_counts(failures)
        .into_iter()
        .map(|(stage, count)| format!("{}: {}", stage, count))
        .collect();
    section.push_str(&format!("*{}*\n\n", counts.join(" | ")));

    section.push_str("| Pair | Stage | Error |\n");
    section.push_str("|:---|:---:|:---|\n");
    for stage in FailureStage::ALL {
        for failure in failures_at(failures, stage) {
            section.push_str(&format!(
                "| `{}` | {} | {} |\n",
                failure.pair,
                failure.stage,
                failure.message.replace('|', "\\|")
            ));
        }
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by seispair v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

fn format_value(row: &MetricRow) -> String {
    match row.value {
        Some(value) => format!("{}", value),
        None => "NA".to_string(),
    }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate the metric table as CSV.
pub fn generate_csv_report(report: &Report) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record([
        "metric_name",
        "value",
        "snclq",
        "starttime",
        "endtime",
        "quality_flag",
    ])?;

    for row in report.run.outcome.rows() {
        writer.write_record([
            row.metric_name.clone(),
            format_value(row),
            row.snclq.clone(),
            row.starttime.format("%Y-%m-%dT%H:%M:%S").to_string(),
            row.endtime.format("%Y-%m-%dT%H:%M:%S").to_string(),
            row.quality_flag.to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e))?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

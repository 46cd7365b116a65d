//! seispair - transfer-function QC planning for seismic station networks
//!
//! A CLI tool that pairs the channels of each station, plans the frequency
//! grid for their instrument responses, and collects transfer-function
//! metrics from an external metric engine.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, inventory unavailable, output, etc.)
//!   2 - Run completed but no metrics were computed

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod orchestrator;
mod pairing;
mod report;
mod services;
mod spectral;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use models::{MetricsOutcome, Report, ReportMetadata, RunReport};
use orchestrator::RunContext;
use services::{
    EvalrespClient, FdsnDataselectClient, FdsnStationClient, FileInventory, HttpMetricEngine,
    InventorySource,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("seispair v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_pairing(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .seispair.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set service endpoints, metrics and excluded channels.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete pairing workflow. Returns exit code (0 or 2).
async fn run_pairing(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    let window = args.time_window().map_err(anyhow::Error::msg)?;
    let run_config = config.run_config(window, args.dry_run);

    // Step 1: Set up the collaborators
    let http = services::http_client(config.services.timeout_seconds)
        .context("Failed to create HTTP client")?;
    let waveforms = FdsnDataselectClient::new(&config.services.dataselect_url, http.clone());
    let responses = EvalrespClient::new(&config.services.evalresp_url, http.clone());
    let engine = HttpMetricEngine::new(&config.services.engine_url, http.clone());

    let ctx = RunContext {
        waveforms: &waveforms,
        responses: &responses,
        engine: &engine,
        config: &run_config,
    };

    println!("📡 Selection: {}", args.selection());
    println!("   Window: {}", window);
    if args.dry_run {
        println!("   Mode: dry run (pairing and bin planning only)");
    } else {
        println!("   Engine: {}", config.services.engine_url);
        println!(
            "   Rotation: {}",
            if run_config.rotation_enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
    }

    let progress = if args.quiet { None } else { Some(create_progress_bar()) };

    // Step 2: Pair channels and compute metrics
    println!("\n🔬 Processing stations...");
    let (run_report, inventory_source) = match args.inventory {
        Some(ref path) => {
            let inventory = FileInventory::new(path);
            let run = orchestrator::run(&inventory, ctx, progress.as_ref()).await?;
            (run, inventory.describe())
        }
        None => {
            let network = args.network.as_deref().unwrap_or("*");
            let inventory =
                FdsnStationClient::new(&config.services.station_url, network, &args.station, http);
            let run = orchestrator::run(&inventory, ctx, progress.as_ref()).await?;
            (run, inventory.describe())
        }
    };

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if args.dry_run {
        print_plan(&run_report);
    }

    // Step 3: Build the report
    println!("\n📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let mut metrics_allowed: Vec<String> = run_config.metrics.iter().cloned().collect();
    metrics_allowed.sort();

    let report = Report {
        metadata: ReportMetadata {
            selection: args.selection(),
            generated_at: Utc::now(),
            inventory_source,
            metrics_allowed,
            rotation_enabled: run_config.rotation_enabled,
            plan_only: args.dry_run,
            duration_seconds: duration,
        },
        run: run_report,
    };

    // Step 4: Generate and save the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Csv => report::generate_csv_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let output_path = output_path(&args, &config);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    let stats = &report.run.stats;
    println!("\n📊 Run Summary:");
    println!("   Stations: {}", stats.stations);
    println!(
        "   Pairs: {} planned | {} computed | {} failed | {} skipped",
        stats.pairs_planned, stats.pairs_computed, stats.pairs_failed, stats.pairs_skipped
    );
    println!("   Metric rows: {} produced, {} kept", stats.rows_produced, stats.rows_kept);
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Run complete! Report saved to: {}", output_path.display());

    if args.dry_run {
        return Ok(0);
    }

    match report.run.outcome {
        MetricsOutcome::NoMetrics => {
            eprintln!("\n⛔ No metrics were computed (exit code 2).");
            Ok(2)
        }
        MetricsOutcome::Metrics(ref rows) if rows.is_empty() => {
            warn!("All metric rows were removed by the metric allow-list");
            Ok(0)
        }
        MetricsOutcome::Metrics(_) => Ok(0),
    }
}

/// Print the planned pairs of a dry run.
fn print_plan(run: &RunReport) {
    println!("\n🔍 Dry run: planned pairs (no data fetched)\n");

    if run.planned.is_empty() {
        println!("   No channel pairs survived the pairing rules.");
        return;
    }

    for planned in &run.planned {
        let marker = if planned.rotation.is_required() { " (rotated)" } else { "" };
        match &planned.grid {
            Some(grid) => println!(
                "     🔗 {} [{}]{} {} Hz, {} bins {:.4}-{:.3} Hz",
                planned.pair,
                planned.axis,
                marker,
                planned.sample_rate,
                grid.count,
                grid.min_freq,
                grid.max_freq
            ),
            None => println!(
                "     🔗 {} [{}]{} invalid sample rate {}",
                planned.pair, planned.axis, marker, planned.sample_rate
            ),
        }
    }
    println!("\n   Total: {} pairs", run.planned.len());
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} stations ({eta})",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Report path: `--output`, else the configured path with the format's extension.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    if let Some(ref path) = args.output {
        return path.clone();
    }

    let path = PathBuf::from(&config.general.output);
    match args.format {
        OutputFormat::Markdown => path,
        OutputFormat::Json => path.with_extension("json"),
        OutputFormat::Csv => path.with_extension("csv"),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

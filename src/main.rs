//! Timegraph - trajectory analysis for archived marker measurements
//!
//! A CLI tool that reads a subject's measurements from a file-based
//! archive, fits a polynomial trend, classifies every point into health
//! zones, and stores the result as a report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (corrupt index, config, persistence, etc.)
//!   2 - Invalid parameters (bad window, boundaries, or fit degree)
//!   3 - Not found (unknown scope, or no data in the window)

mod analysis;
mod archive;
mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod registry;
mod report;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use error::{ErrorKind, TimegraphError};
use indicatif::{ProgressBar, ProgressStyle};
use models::{ArchiveScope, FitSpec, TimeWindow, ZoneBoundaries};
use pipeline::{PipelineContext, TimegraphRequest};
use registry::ModuleRegistry;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(ErrorKind::InvalidParameters.exit_code());
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, &config);

    info!("timegraph v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(&args, &config) {
        Ok(()) => Ok(()),
        Err(e) => {
            let kind = e
                .downcast_ref::<TimegraphError>()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Internal);
            error!("Request failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(kind.exit_code());
        }
    }
}

/// Handle --init-config: generate a default .timegraph.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to point at your archive, report directory and database.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: a tracing subscriber was already installed");
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("Warning: failed to load {}: {:#}", CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}

/// Dispatch the requested action.
fn run(args: &Args, config: &Config) -> Result<()> {
    if args.show_registry {
        let registry = ModuleRegistry::load(&config.registry.path)?;
        println!("{}", serde_json::to_string_pretty(&registry)?);
        return Ok(());
    }

    if args.list_subjects {
        for subject in archive::list_subjects(&config.archive.root)? {
            println!("{}", subject);
        }
        return Ok(());
    }

    if args.list_scopes {
        for scope in archive::list_scopes(&config.archive.root) {
            println!("{}", scope);
        }
        return Ok(());
    }

    if let Some(ref subject) = args.list_reports {
        let metadata = report::SqliteMetadataStore::open(&config.database.path)?;
        for row in metadata.reports_for(subject)? {
            println!(
                "{}  {}  {}/{}/{}  {}",
                row.requested_at,
                row.report_id,
                row.subject_id,
                row.module_id,
                row.marker_id,
                row.report_path
            );
        }
        return Ok(());
    }

    let request = build_request(args, config)?;
    let context = build_context(args, config, &request)?;
    let progress = make_progress_bar(args.quiet);

    if args.dry_run {
        return handle_dry_run(&context, &request, &progress);
    }

    println!("📈 Analyzing {}", request.scope);
    let assembled = context.run(request, &progress)?;
    progress.finish_and_clear();

    let report = &assembled.report;
    let fit = &report.trajectory.fit_metadata;

    if let Some(ref output) = args.output {
        let rendered = match config.general.format {
            OutputFormat::Json => report::generate_json_report(report)?,
            OutputFormat::Markdown => report::generate_markdown_report(report),
        };
        std::fs::write(output, rendered)
            .with_context(|| format!("Failed to write report to {}", output.display()))?;
        info!("Rendered report written to {}", output.display());
    }

    // Print summary
    println!("\n📊 Trajectory Summary:");
    println!("   Points: {}", report.trajectory.data_points.len());
    if !report.skipped_records.is_empty() {
        println!("   Skipped files: {}", report.skipped_records.len());
    }
    println!(
        "   - 🟢 Healthy: {} | 🟡 Vulnerable: {} | 🔴 Critical: {}",
        fit.zone_summary.healthy, fit.zone_summary.vulnerable, fit.zone_summary.critical
    );
    println!("   Degree: {} | R²: {:.4}", fit.degree, fit.r_squared);
    println!("   Trend: {} (projected zone: {})", fit.trend, fit.projected_zone);
    println!(
        "\n✅ Report {} for {} saved to: {}",
        report.report_id,
        report.scope(),
        assembled.location.display()
    );

    Ok(())
}

/// Turn CLI arguments into a request.
fn build_request(args: &Args, config: &Config) -> Result<TimegraphRequest, TimegraphError> {
    let scope = ArchiveScope::new(
        args.subject.as_deref().unwrap_or_default(),
        args.module.as_deref().unwrap_or_default(),
        args.marker.as_deref().unwrap_or_default(),
    )?;

    let window = TimeWindow::parse(
        args.from.as_deref().unwrap_or_default(),
        args.to.as_deref().unwrap_or_default(),
    )?;
    if window.start > window.end {
        warn!("Time window starts after it ends; no points can match");
    }

    let zone_boundaries = match (args.healthy_min, args.healthy_max, args.margin) {
        (Some(min), Some(max), Some(margin)) => Some(ZoneBoundaries::new(min, max, margin)?),
        _ => None,
    };

    Ok(TimegraphRequest {
        scope,
        window,
        zone_boundaries,
        fit_spec: FitSpec {
            polynomial_degree: config.analysis.default_degree,
        },
    })
}

/// Build the process-wide pipeline settings.
///
/// The registry is only read when the request needs its defaults.
fn build_context(
    args: &Args,
    config: &Config,
    request: &TimegraphRequest,
) -> Result<PipelineContext> {
    let registry = if request.zone_boundaries.is_none() && !args.dry_run {
        info!("Loading zone defaults from {}", config.registry.path.display());
        Some(ModuleRegistry::load(&config.registry.path)?)
    } else {
        None
    };

    Ok(PipelineContext {
        archive_root: config.archive.root.clone(),
        reports_root: config.reports.root.clone(),
        database_path: config.database.path.clone(),
        registry,
        trend_policy: config.analysis.trend_policy(),
    })
}

fn make_progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Handle --dry-run: read the archive, print the points, exit.
fn handle_dry_run(
    context: &PipelineContext,
    request: &TimegraphRequest,
    progress: &ProgressBar,
) -> Result<()> {
    println!("\n🔍 Dry run: reading {} (no fit, nothing stored)...\n", request.scope);

    let outcome = context.retrieve(request, progress)?;
    progress.finish_and_clear();

    if outcome.measurements.is_empty() {
        println!("   No data points in the requested timeframe.");
    } else {
        println!("   Found {} data points:\n", outcome.measurements.len());
        for m in &outcome.measurements {
            println!("     {}  {}", m.timestamp.to_rfc3339(), m.value);
        }
    }

    for skipped in &outcome.skipped {
        println!("   ⚠️  skipped {}: {}", skipped.file, skipped.reason);
    }

    println!("\n✅ Dry run complete.");
    Ok(())
}

//! SalesCharts - Retail sales reporting pipeline
//!
//! Loads per-store sales CSV exports, aggregates them, and renders a
//! fixed set of chart images into an output directory.
//!
//! Exit codes:
//!   0 - Success, or no input data was found
//!   1 - Runtime error, or a report failed under `on_report_error = "continue"`

mod analysis;
mod cli;
mod config;
mod loader;
mod models;
mod pipeline;
mod report;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use loader::SourceOutcome;
use pipeline::{Pipeline, RunOutcome, RunReport};
use report::PlottersRenderer;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("SalesCharts v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(&args) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: write a default config file.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize stores, columns, palette, and more.");
    Ok(())
}

fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the pipeline once. Returns the exit code.
fn run(args: &Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = Config::resolve(args.config.as_deref(), Path::new("."))?;
    config.merge_with_args(args);
    config.validate().context("Invalid configuration")?;

    let renderer = PlottersRenderer::new(&config.chart)?;
    let output_dir = config.paths.output_dir.clone();

    let mut pipeline = Pipeline::new(config, renderer).with_console(!args.quiet);
    let outcome = pipeline.run()?;
    debug!("Pipeline finished in state {:?}", pipeline.state());
    let duration = start_time.elapsed().as_secs_f64();

    match outcome {
        RunOutcome::NoData { sources } => {
            print_sources(&sources);
            println!("\n❌ No data was loaded. Check the data directory and store file names.");
            Ok(0)
        }
        RunOutcome::Completed(report) => {
            print_summary(&report, duration);

            if report.failures.is_empty() {
                println!(
                    "\n✅ Analysis complete! Charts saved to: {}",
                    output_dir.display()
                );
                Ok(0)
            } else {
                for failure in &report.failures {
                    eprintln!("   ⛔ {} report: {:#}", failure.report, failure.error);
                }
                eprintln!(
                    "\n⛔ {} report(s) failed. Remaining charts saved to: {}",
                    report.failures.len(),
                    output_dir.display()
                );
                Ok(1)
            }
        }
    }
}

fn print_sources(sources: &[SourceOutcome]) {
    println!("\n📂 Sources:");
    for source in sources {
        match source {
            SourceOutcome::Loaded { path, store, rows } => {
                println!("   ✔ {} ({} rows) <- {}", store, rows, path.display())
            }
            SourceOutcome::Missing { path, store } => {
                println!("   ✘ {} (missing) <- {}", store, path.display())
            }
        }
    }
}

fn print_summary(report: &RunReport, duration: f64) {
    print_sources(&report.sources);

    println!("\n📊 Sales Summary:");
    println!("   Records: {}", report.summary.record_count);
    println!("   Grand total: {:.2}", report.summary.grand_total);
    for store in &report.summary.revenue {
        println!("   - {}: {:.2}", store.label, store.value);
    }
    println!("   Charts written: {}", report.written.len());
    if let Some(ref path) = report.summary_path {
        println!("   Summary: {}", path.display());
    }
    println!("   Duration: {:.1}s", duration);
}

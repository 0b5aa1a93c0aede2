//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{FailurePolicy, NamingMode, SortOrder};
use clap::Parser;
use std::path::PathBuf;

/// SalesCharts - per-store sales reports as chart images
///
/// Loads one delimited file per store, aggregates revenue, category mix,
/// ratings, shipping cost and product popularity, and saves one chart per
/// report. Runs with sensible defaults when given no arguments.
///
/// Examples:
///   salescharts
///   salescharts --data-dir ./dados --output-dir ./graficos --naming fixed
///   salescharts --config nightly.toml --summary summary.json
///   salescharts --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .salescharts.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the per-store input files
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory receiving the chart images (its files are cleared first)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output file naming (fixed, timestamped)
    #[arg(long, value_name = "MODE")]
    pub naming: Option<NamingMode>,

    /// What to do when a report fails (abort, continue)
    #[arg(long, value_name = "POLICY")]
    pub on_report_error: Option<FailurePolicy>,

    /// Number of products kept by the top/bottom product reports
    #[arg(long, value_name = "COUNT")]
    pub top_n: Option<usize>,

    /// Order of the revenue slices (key, descending, ascending)
    #[arg(long, value_name = "ORDER")]
    pub revenue_order: Option<SortOrder>,

    /// Order of the rating bars (key, descending, ascending)
    #[arg(long, value_name = "ORDER")]
    pub rating_order: Option<SortOrder>,

    /// Write every aggregation to this JSON file
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .salescharts.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.top_n == Some(0) {
            return Err("Top-N must be at least 1".to_string());
        }

        if let Some(ref config_path) = self.config {
            if !config_path.is_file() {
                return Err(format!(
                    "Config file does not exist: {}",
                    config_path.display()
                ));
            }
        }

        if let Some(ref data_dir) = self.data_dir {
            if data_dir.exists() && !data_dir.is_dir() {
                return Err(format!(
                    "Data path is not a directory: {}",
                    data_dir.display()
                ));
            }
        }

        if let Some(ref output_dir) = self.output_dir {
            if output_dir.exists() && !output_dir.is_dir() {
                return Err(format!(
                    "Output path is not a directory: {}",
                    output_dir.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn make_args() -> Args {
        Args {
            config: None,
            data_dir: None,
            output_dir: None,
            naming: None,
            on_report_error: None,
            top_n: None,
            revenue_order: None,
            rating_order: None,
            summary: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_no_arguments_is_valid() {
        let args = Args::try_parse_from(["salescharts"]).unwrap();
        assert!(args.validate().is_ok());
        assert!(args.naming.is_none());
    }

    #[test]
    fn test_parse_value_enums() {
        let args = Args::try_parse_from([
            "salescharts",
            "--naming",
            "fixed",
            "--on-report-error",
            "continue",
            "--top-n",
            "3",
            "--revenue-order",
            "descending",
        ])
        .unwrap();
        assert_eq!(args.naming, Some(NamingMode::Fixed));
        assert_eq!(args.on_report_error, Some(FailurePolicy::Continue));
        assert_eq!(args.top_n, Some(3));
        assert_eq!(args.revenue_order, Some(SortOrder::Descending));
        assert!(args.rating_order.is_none());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_top_n() {
        let mut args = make_args();
        args.top_n = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_config_file() {
        let mut args = make_args();
        args.config = Some(PathBuf::from("does/not/exist.toml"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_merge_only_overrides_given_values() {
        let mut config = Config::default();
        let mut args = make_args();
        args.output_dir = Some(PathBuf::from("out"));
        args.naming = Some(NamingMode::Fixed);
        args.rating_order = Some(SortOrder::Ascending);

        config.merge_with_args(&args);

        assert_eq!(config.paths.output_dir, PathBuf::from("out"));
        assert_eq!(config.paths.data_dir, PathBuf::from("./dados/"));
        assert_eq!(config.general.naming, NamingMode::Fixed);
        assert_eq!(config.general.on_report_error, FailurePolicy::Abort);
        assert_eq!(config.general.top_n, 5);
        assert_eq!(config.chart.rating_order, SortOrder::Ascending);
        assert_eq!(config.chart.revenue_order, SortOrder::Key);
    }
}

//! Report pipeline orchestration.
//!
//! Runs the fixed sequence *preparing-output* → *loading* → *reporting* →
//! *done*. Loading that yields no data skips reporting entirely.

use crate::analysis;
use crate::config::Config;
use crate::loader::{LoadReport, Loader, SourceOutcome};
use crate::models::{FailurePolicy, ReportKind, SalesSummary};
use crate::report::{
    charts_for, format_timestamp, generate_json_summary, output_file_name, ChartRenderer,
    SummaryDocument,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Phase of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    PreparingOutput,
    Loading,
    Reporting,
    Done,
}

/// A report that failed while the pipeline kept going.
#[derive(Debug)]
pub struct ReportFailure {
    pub report: ReportKind,
    pub error: anyhow::Error,
}

/// Everything a completed run produced.
#[derive(Debug)]
pub struct RunReport {
    /// Per-source load outcomes, in configuration order.
    pub sources: Vec<SourceOutcome>,
    /// Aggregations the charts were drawn from.
    pub summary: SalesSummary,
    /// Chart files written, in report order.
    pub written: Vec<PathBuf>,
    /// Reports that failed under [`FailurePolicy::Continue`].
    pub failures: Vec<ReportFailure>,
    /// Where the JSON summary was written, if requested.
    pub summary_path: Option<PathBuf>,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// No source could be read or the sources held no rows; nothing was rendered.
    NoData { sources: Vec<SourceOutcome> },
    Completed(RunReport),
}

/// The report pipeline.
pub struct Pipeline<R: ChartRenderer> {
    config: Config,
    renderer: R,
    console: bool,
    run_time: DateTime<Local>,
    state: PipelineState,
}

impl<R: ChartRenderer> Pipeline<R> {
    pub fn new(config: Config, renderer: R) -> Self {
        Self {
            config,
            renderer,
            console: false,
            run_time: Local::now(),
            state: PipelineState::Idle,
        }
    }

    /// Print progress and warnings to the console.
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Use a fixed run time for timestamped file names.
    pub fn with_run_time(mut self, run_time: DateTime<Local>) -> Self {
        self.run_time = run_time;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Run the whole pipeline once.
    pub fn run(&mut self) -> Result<RunOutcome> {
        self.transition(PipelineState::PreparingOutput);
        let output_dir = self.config.paths.output_dir.clone();
        let removed = prepare_output_dir(&output_dir)?;
        debug!("Removed {} old files from {}", removed, output_dir.display());

        self.transition(PipelineState::Loading);
        if self.console {
            println!("📥 Loading sales data from {}", self.config.paths.data_dir.display());
        }
        let load = Loader::from_config(&self.config).load()?;
        self.report_missing(&load);

        if load.is_empty() {
            self.transition(PipelineState::Done);
            return Ok(RunOutcome::NoData {
                sources: load.outcomes,
            });
        }

        self.transition(PipelineState::Reporting);
        let result = self.run_reports(load);
        self.transition(PipelineState::Done);
        result.map(RunOutcome::Completed)
    }

    fn run_reports(&mut self, load: LoadReport) -> Result<RunReport> {
        let summary = analysis::summarize(&load.table, &self.config);
        let timestamp = format_timestamp(&self.run_time);
        let progress = self.progress_bar(ReportKind::ALL.len() as u64)?;

        let mut written = Vec::new();
        let mut failures = Vec::new();

        for report in ReportKind::ALL {
            progress.set_message(report.to_string());

            match self.run_report(report, &summary, &timestamp) {
                Ok(paths) => written.extend(paths),
                Err(error) => match self.config.general.on_report_error {
                    FailurePolicy::Abort => {
                        progress.abandon_with_message(format!("{} report failed", report));
                        return Err(error.context(format!("The {} report failed", report)));
                    }
                    FailurePolicy::Continue => {
                        warn!("The {} report failed: {:#}", report, error);
                        failures.push(ReportFailure { report, error });
                    }
                },
            }

            progress.inc(1);
        }
        progress.finish_with_message("Reports complete");

        let summary_path = match self.config.general.summary_path.clone() {
            Some(path) => {
                self.write_summary(&path, &load, &summary, &written)?;
                Some(path)
            }
            None => None,
        };

        Ok(RunReport {
            sources: load.outcomes,
            summary,
            written,
            failures,
            summary_path,
        })
    }

    fn run_report(
        &mut self,
        report: ReportKind,
        summary: &SalesSummary,
        timestamp: &str,
    ) -> Result<Vec<PathBuf>> {
        info!("Generating {} report", report);
        let charts = charts_for(report, summary, &self.config.chart, self.config.general.top_n);

        let mut paths = Vec::with_capacity(charts.len());
        for chart in &charts {
            let file_name = output_file_name(
                &chart.name,
                &self.config.chart.brand,
                self.config.general.naming,
                timestamp,
            );
            let path = self.config.paths.output_dir.join(file_name);

            self.renderer
                .render(chart, &path)
                .with_context(|| format!("Failed to render chart: {}", path.display()))?;
            info!("Saved chart: {}", path.display());
            paths.push(path);
        }

        Ok(paths)
    }

    fn write_summary(
        &self,
        path: &Path,
        load: &LoadReport,
        summary: &SalesSummary,
        written: &[PathBuf],
    ) -> Result<()> {
        let document = SummaryDocument {
            generated_at: Utc::now(),
            stores: load.table.stores(),
            charts: written
                .iter()
                .filter_map(|p| p.file_name())
                .map(|name| name.to_string_lossy().to_string())
                .collect(),
            summary,
        };

        let json = generate_json_summary(&document)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!("Wrote summary: {}", path.display());
        Ok(())
    }

    fn report_missing(&self, load: &LoadReport) {
        for outcome in load.missing() {
            if let SourceOutcome::Missing { path, store } = outcome {
                if self.console {
                    println!(
                        "⚠️  File '{}' not found, skipping store '{}'",
                        path.display(),
                        store
                    );
                }
            }
        }
    }

    fn progress_bar(&self, steps: u64) -> Result<ProgressBar> {
        if !self.console {
            return Ok(ProgressBar::hidden());
        }

        let pb = ProgressBar::new(steps);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Ok(pb)
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Clear the files directly inside `dir`, or create it if absent.
///
/// Subdirectories and their contents are left alone. Returns the number of
/// files removed.
pub fn prepare_output_dir(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        info!("Created output directory: {}", dir.display());
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry
            .with_context(|| format!("Failed to read output directory: {}", dir.display()))?;
        if entry.file_type().is_dir() || entry.path().is_dir() {
            continue;
        }

        fs::remove_file(entry.path())
            .with_context(|| format!("Failed to remove {}", entry.path().display()))?;
        removed += 1;
    }

    Ok(removed)
}

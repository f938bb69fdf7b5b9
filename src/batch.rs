//! Batch analysis over a directory of result units
//!
//! Units are processed in ascending byte order of their file names. The
//! extremes in the report keep the first unit on ties, so this order is part
//! of the output contract.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::AnalysisConfig;
use crate::csv_output::{CsvExport, CsvUnitRow};
use crate::json_output::AggregateReport;
use crate::loader::{parse_unit, ExperimentUnit, Layout, ParseError};
use crate::report::{timestamp_now, ReportBuilder};

/// A unit that could not be used
#[derive(Debug)]
pub struct UnitFailure {
    pub file: String,
    pub error: ParseError,
}

/// Result of reading one unit
#[derive(Debug)]
pub enum UnitOutcome {
    Parsed(ExperimentUnit),
    Failed(UnitFailure),
}

/// Everything a batch run produces
#[derive(Debug)]
pub struct BatchOutcome {
    pub layout: Layout,
    pub report: AggregateReport,
    pub csv: CsvExport,
    pub failures: Vec<UnitFailure>,
}

impl BatchOutcome {
    /// Number of units folded into the report
    pub fn parsed(&self) -> usize {
        self.report.total_files()
    }
}

/// List unit files of `dir` whose names end with `suffix`, sorted by name
pub fn list_units(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory {}", dir.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to list input directory {}", dir.display()))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            tracing::warn!(file = ?file_name, "skipping unit with non UTF-8 name");
            continue;
        };
        if name.ends_with(suffix) {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names.into_iter().map(|name| dir.join(name)).collect())
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read and parse units in the given order
///
/// The layout is taken from the first unit that is a JSON object; when none
/// is, the batch is treated as two-way.
pub fn read_units(paths: &[PathBuf]) -> (Layout, Vec<UnitOutcome>) {
    let texts: Vec<(String, std::io::Result<String>)> = paths
        .iter()
        .map(|path| (file_label(path), fs::read_to_string(path)))
        .collect();

    let layout = texts
        .iter()
        .filter_map(|(_, text)| text.as_ref().ok())
        .find_map(|text| Layout::detect(text))
        .unwrap_or(Layout::Pair);

    let outcomes = texts
        .into_iter()
        .map(|(file, text)| {
            let parsed = text
                .map_err(ParseError::from)
                .and_then(|text| parse_unit(&file, &text, layout));
            match parsed {
                Ok(unit) => UnitOutcome::Parsed(unit),
                Err(error) => UnitOutcome::Failed(UnitFailure { file, error }),
            }
        })
        .collect();

    (layout, outcomes)
}

/// Fold unit outcomes, in order, into a report and CSV table
///
/// Only parsed units touch the accumulators; failures are logged and
/// collected.
pub fn fold_units(
    layout: Layout,
    outcomes: Vec<UnitOutcome>,
    config: &AnalysisConfig,
    timestamp: impl Into<String>,
) -> BatchOutcome {
    let mut builder = ReportBuilder::new(layout);
    let mut csv = CsvExport::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome {
            UnitOutcome::Parsed(unit) => {
                for job in unit.jobs() {
                    if job.record.trials() != config.shots {
                        tracing::warn!(
                            unit = %unit.name,
                            job = job.record.identifier(),
                            trials = job.record.trials(),
                            expected = config.shots,
                            "unexpected shot count"
                        );
                    }
                }
                builder.add_unit(&unit);
                csv.add_row(CsvUnitRow::from_unit(&unit));
            }
            UnitOutcome::Failed(failure) => {
                tracing::error!(file = %failure.file, "Error reading {}: {}", failure.file, failure.error);
                failures.push(failure);
            }
        }
    }

    for record in builder.pooled_records() {
        tracing::debug!(
            variant = record.identifier(),
            trials = record.trials(),
            p0 = record.p0(),
            sigma = record.sigma(),
            "pooled"
        );
    }

    BatchOutcome {
        layout,
        report: builder.build(timestamp),
        csv,
        failures,
    }
}

/// Analyze every unit in `dir`
pub fn run_batch(dir: &Path, config: &AnalysisConfig) -> Result<BatchOutcome> {
    tracing::info!(
        dir = %dir.display(),
        backend = %config.backend_name,
        shots = config.shots,
        seed = config.seed,
        "starting batch analysis"
    );

    let paths = list_units(dir, &config.unit_suffix())?;
    let (layout, outcomes) = read_units(&paths);
    let outcome = fold_units(layout, outcomes, config, timestamp_now());

    tracing::info!(
        units = paths.len(),
        parsed = outcome.parsed(),
        failed = outcome.failures.len(),
        layout = ?layout,
        "batch analysis finished"
    );
    Ok(outcome)
}

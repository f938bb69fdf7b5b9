//! Run configuration for batch analysis
//!
//! The experiment constants the result units were produced with, plus the
//! few knobs of the batch run itself. Passed explicitly into
//! [`crate::batch::run_batch`]; nothing here is global state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for one batch analysis run
///
/// # Example
/// ```
/// use qtorsion::config::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.shots, 10_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Backend the experiments ran on (informational)
    pub backend_name: String,

    /// Shots submitted per job
    ///
    /// Units whose counts sum to a different total are still analyzed, with
    /// a warning.
    pub shots: u64,

    /// Transpiler seed used for every circuit (informational)
    pub seed: u64,

    /// File extension identifying result units, without the leading dot
    pub unit_extension: String,

    /// Where the per-unit CSV table is written
    pub csv_output: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            backend_name: "ibm_torino".to_string(),
            shots: 10_000,
            seed: 42,
            unit_extension: "json".to_string(),
            csv_output: PathBuf::from("results_summary.csv"),
        }
    }
}

impl AnalysisConfig {
    /// Suffix a file name must end with to be treated as a unit
    pub fn unit_suffix(&self) -> String {
        format!(".{}", self.unit_extension)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.shots == 0 {
            return Err("shots must be positive, got 0".to_string());
        }

        if self.unit_extension.is_empty() || self.unit_extension.starts_with('.') {
            return Err(format!(
                "unit_extension must be non-empty and given without a leading dot, got {:?}",
                self.unit_extension
            ));
        }

        if self.csv_output.as_os_str().is_empty() {
            return Err("csv_output must not be empty".to_string());
        }

        Ok(())
    }
}

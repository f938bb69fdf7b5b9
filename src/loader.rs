//! Reading and writing stored result units
//!
//! A unit is one JSON file holding the outcome counts of two (A, B) or three
//! (A, B, C) jobs of a single comparative experiment. Each job also carries
//! the `p_0`/`sigma`/`shots` its producer computed; those declared values are
//! kept next to the record derived from the counts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::counts::OutcomeCountMap;
use crate::json_output::{
    round_to, Metric, EFFECTIVE_Z_PLACES, PAIR_Z_PLACES, PROPORTION_PLACES, TRIPLE_Z_PLACES,
};
use crate::statistics::{effective_z, pair_statistic, JobRecord, PairStatistic};

/// Tolerance between a declared p_0 and the one derived from counts
///
/// Producers round p_0 to five places before writing it.
const DECLARED_P0_TOLERANCE: f64 = 1e-5;

/// Errors that make a unit unusable
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read unit: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unit is not a JSON object")]
    NotAnObject,

    #[error("missing job `{0}`")]
    MissingJob(&'static str),

    #[error("job `{job}` is missing field `{field}`")]
    MissingField { job: &'static str, field: &'static str },

    #[error("job `{job}` has invalid `{field}`: {reason}")]
    InvalidField {
        job: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// Number of variants compared in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// A vs B
    Pair,
    /// A vs B and A vs C
    Triple,
}

impl Layout {
    /// Recognize the layout of a unit from its text
    ///
    /// Returns `None` when the text is not a JSON object.
    pub fn detect(text: &str) -> Option<Layout> {
        let value: Value = serde_json::from_str(text).ok()?;
        let object = value.as_object()?;
        if object.get("job_c").is_some_and(Value::is_object) {
            Some(Layout::Triple)
        } else {
            Some(Layout::Pair)
        }
    }
}

/// Estimates written into the unit by its producer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeclaredEstimate {
    pub shots: u64,
    pub p0: f64,
    pub sigma: f64,
}

/// One job of a unit
#[derive(Debug, Clone, PartialEq)]
pub struct UnitJob {
    pub record: JobRecord,
    pub declared: DeclaredEstimate,
}

impl UnitJob {
    /// Compare declared estimates of two jobs
    pub fn compare(&self, other: &UnitJob) -> PairStatistic {
        pair_statistic(
            self.declared.p0,
            self.declared.sigma,
            other.declared.p0,
            other.declared.sigma,
        )
    }
}

/// A declared value that disagrees with the job's counts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StaleEstimate {
    Shots {
        job: &'static str,
        declared: u64,
        counted: u64,
    },
    P0 {
        job: &'static str,
        declared: f64,
        derived: f64,
    },
}

/// A parsed result unit
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentUnit {
    pub name: String,
    pub job_a: UnitJob,
    pub job_b: UnitJob,
    pub job_c: Option<UnitJob>,
}

impl ExperimentUnit {
    /// A vs B from the declared estimates
    pub fn pair_ab(&self) -> PairStatistic {
        self.job_a.compare(&self.job_b)
    }

    /// A vs C from the declared estimates (three-way units only)
    pub fn pair_ac(&self) -> Option<PairStatistic> {
        self.job_c.as_ref().map(|c| self.job_a.compare(c))
    }

    /// Jobs in A, B, C order
    pub fn jobs(&self) -> impl Iterator<Item = &UnitJob> {
        [Some(&self.job_a), Some(&self.job_b), self.job_c.as_ref()]
            .into_iter()
            .flatten()
    }

    /// Declared shots or p_0 that do not match the counts
    ///
    /// Stale units are still usable; per-unit statistics keep using the
    /// declared values.
    pub fn stale_estimates(&self) -> Vec<StaleEstimate> {
        let mut stale = Vec::new();
        for (job, name) in self.jobs().zip(["job_a", "job_b", "job_c"]) {
            if job.declared.shots != job.record.trials() {
                stale.push(StaleEstimate::Shots {
                    job: name,
                    declared: job.declared.shots,
                    counted: job.record.trials(),
                });
            }
            if (job.declared.p0 - job.record.p0()).abs() > DECLARED_P0_TOLERANCE {
                stale.push(StaleEstimate::P0 {
                    job: name,
                    declared: job.declared.p0,
                    derived: job.record.p0(),
                });
            }
        }
        stale
    }
}

/// Parse one unit
///
/// With [`Layout::Pair`] a `job_c` entry is ignored; with [`Layout::Triple`]
/// it is required.
pub fn parse_unit(name: &str, text: &str, layout: Layout) -> Result<ExperimentUnit, ParseError> {
    let value: Value = serde_json::from_str(text)?;
    let object = value.as_object().ok_or(ParseError::NotAnObject)?;

    let job_a = parse_job(object, "job_a")?;
    let job_b = parse_job(object, "job_b")?;
    let job_c = match layout {
        Layout::Pair => None,
        Layout::Triple => Some(parse_job(object, "job_c")?),
    };

    let unit = ExperimentUnit {
        name: name.to_string(),
        job_a,
        job_b,
        job_c,
    };
    warn_on_stale_estimates(&unit);
    Ok(unit)
}

/// Read and parse one unit file
pub fn load_unit(path: &Path, layout: Layout) -> Result<ExperimentUnit, ParseError> {
    let text = fs::read_to_string(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_unit(&name, &text, layout)
}

fn parse_job(object: &Map<String, Value>, job: &'static str) -> Result<UnitJob, ParseError> {
    let entry = object
        .get(job)
        .and_then(Value::as_object)
        .ok_or(ParseError::MissingJob(job))?;

    let counts_value = entry
        .get("counts")
        .ok_or(ParseError::MissingField { job, field: "counts" })?;
    let counts: OutcomeCountMap =
        serde_json::from_value(counts_value.clone()).map_err(|e| ParseError::InvalidField {
            job,
            field: "counts",
            reason: e.to_string(),
        })?;
    if counts.checked_total().is_none() {
        return Err(ParseError::InvalidField {
            job,
            field: "counts",
            reason: "total count overflows".to_string(),
        });
    }

    let shots_value = entry
        .get("shots")
        .or_else(|| entry.get("trials"))
        .ok_or(ParseError::MissingField { job, field: "shots" })?;
    let shots = shots_value.as_u64().ok_or_else(|| ParseError::InvalidField {
        job,
        field: "shots",
        reason: format!("expected a non-negative integer, got {}", shots_value),
    })?;

    let p0 = number_field(entry, job, "p_0")?;
    if !(0.0..=1.0).contains(&p0) {
        return Err(ParseError::InvalidField {
            job,
            field: "p_0",
            reason: format!("must be in [0, 1], got {}", p0),
        });
    }
    let sigma = number_field(entry, job, "sigma")?;
    if sigma < 0.0 {
        return Err(ParseError::InvalidField {
            job,
            field: "sigma",
            reason: format!("must be non-negative, got {}", sigma),
        });
    }

    let identifier = entry.get("id").and_then(Value::as_str).unwrap_or_default();

    Ok(UnitJob {
        record: JobRecord::new(identifier, counts),
        declared: DeclaredEstimate { shots, p0, sigma },
    })
}

fn number_field(
    entry: &Map<String, Value>,
    job: &'static str,
    field: &'static str,
) -> Result<f64, ParseError> {
    let value = entry
        .get(field)
        .ok_or(ParseError::MissingField { job, field })?;
    value.as_f64().ok_or_else(|| ParseError::InvalidField {
        job,
        field,
        reason: format!("expected a number, got {}", value),
    })
}

fn warn_on_stale_estimates(unit: &ExperimentUnit) {
    for stale in unit.stale_estimates() {
        match stale {
            StaleEstimate::Shots {
                job,
                declared,
                counted,
            } => tracing::warn!(
                unit = %unit.name,
                job,
                declared,
                counted,
                "declared shots differ from summed counts"
            ),
            StaleEstimate::P0 {
                job,
                declared,
                derived,
            } => tracing::warn!(
                unit = %unit.name,
                job,
                declared,
                derived,
                "declared p_0 differs from counts"
            ),
        }
    }
}

/// One job as written into a unit file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitJobDocument {
    pub id: String,
    pub counts: OutcomeCountMap,
    pub shots: u64,
    pub p_0: f64,
    pub sigma: f64,
}

impl From<&JobRecord> for UnitJobDocument {
    fn from(record: &JobRecord) -> Self {
        Self {
            id: record.identifier().to_string(),
            counts: record.counts().clone(),
            shots: record.trials(),
            p_0: round_to(record.p0(), PROPORTION_PLACES),
            sigma: round_to(record.sigma(), PROPORTION_PLACES),
        }
    }
}

/// A unit file as written by the result fetcher
///
/// Two-way units carry `delta`, `sigma_total` and `z_value`; three-way units
/// carry `job_c`, `z_ab`, `z_ac` and `z_eff` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDocument {
    pub timestamp: String,
    pub job_a: UnitJobDocument,
    pub job_b: UnitJobDocument,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub job_c: Option<UnitJobDocument>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub delta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sigma_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub z_value: Option<Metric>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub z_ab: Option<Metric>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub z_ac: Option<Metric>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub z_eff: Option<Metric>,
}

impl UnitDocument {
    /// Build a unit from fetched job records
    pub fn from_records(
        timestamp: impl Into<String>,
        job_a: &JobRecord,
        job_b: &JobRecord,
        job_c: Option<&JobRecord>,
    ) -> Self {
        let ab = job_a.compare(job_b);
        let mut document = Self {
            timestamp: timestamp.into(),
            job_a: job_a.into(),
            job_b: job_b.into(),
            job_c: None,
            delta: None,
            sigma_total: None,
            z_value: None,
            z_ab: None,
            z_ac: None,
            z_eff: None,
        };

        match job_c {
            None => {
                document.delta = Some(round_to(ab.delta, PROPORTION_PLACES));
                document.sigma_total = Some(round_to(ab.sigma_total, PROPORTION_PLACES));
                document.z_value = Some(Metric::rounded(ab.z, PAIR_Z_PLACES));
            }
            Some(job_c) => {
                let ac = job_a.compare(job_c);
                document.job_c = Some(job_c.into());
                document.z_ab = Some(Metric::rounded(ab.z, TRIPLE_Z_PLACES));
                document.z_ac = Some(Metric::rounded(ac.z, TRIPLE_Z_PLACES));
                document.z_eff = Some(Metric::rounded(
                    effective_z(ab.z, ac.z),
                    EFFECTIVE_Z_PLACES,
                ));
            }
        }
        document
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

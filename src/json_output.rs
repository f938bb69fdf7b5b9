//! JSON shapes of the aggregate report
//!
//! Field names and order are fixed: downstream tooling reads these reports
//! by key, and infinite statistics are written as the string `"inf"` in place
//! of a number.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::counts::OutcomeCountMap;

/// Decimal places for proportions, sigmas and deltas
pub const PROPORTION_PLACES: usize = 5;
/// Decimal places for z in the two-way report
pub const PAIR_Z_PLACES: usize = 2;
/// Decimal places for z in the three-way report
pub const TRIPLE_Z_PLACES: usize = 3;
/// Decimal places for effective z
pub const EFFECTIVE_Z_PLACES: usize = 3;

/// Round to `places` decimal places
///
/// Rounds the exact binary value, so `2.675` (stored as 2.67499...) rounds
/// down. Non-finite values pass through unchanged.
pub fn round_to(value: f64, places: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*}", places, value).parse().unwrap_or(value)
}

/// A statistic at the serialization boundary
///
/// Finite values are JSON numbers; +∞, −∞ and NaN become the strings
/// `"inf"`, `"-inf"` and `"nan"`.
#[derive(Debug, Clone, Copy)]
pub struct Metric(pub f64);

impl Metric {
    /// Round a value for output
    pub fn rounded(value: f64, places: usize) -> Self {
        Self(round_to(value, places))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_infinite(self) -> bool {
        self.0.is_infinite()
    }
}

impl PartialEq for Metric {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 || (self.0.is_nan() && other.0.is_nan())
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.0;
        if value.is_finite() {
            serializer.serialize_f64(value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }
}

struct MetricVisitor;

impl Visitor<'_> for MetricVisitor {
    type Value = Metric;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a number or one of \"inf\", \"-inf\", \"nan\"")
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Metric, E> {
        Ok(Metric(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Metric, E> {
        Ok(Metric(value as f64))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Metric, E> {
        Ok(Metric(value as f64))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Metric, E> {
        match value {
            "inf" => Ok(Metric(f64::INFINITY)),
            "-inf" => Ok(Metric(f64::NEG_INFINITY)),
            "nan" => Ok(Metric(f64::NAN)),
            other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
        }
    }
}

impl<'de> Deserialize<'de> for Metric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MetricVisitor)
    }
}

/// Pooled outcomes of one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonJobSummary {
    pub counts: OutcomeCountMap,
    pub shots: u64,
    pub p_0: f64,
    pub sigma: f64,
}

/// Extremes of per-file z in the two-way report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPairExtremes {
    pub max_z: Option<Metric>,
    pub max_z_file: String,
    pub min_z: Option<Metric>,
    pub min_z_file: String,
}

/// Per-file entry of the two-way report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPairFileStat {
    pub file: String,
    pub z_value: Metric,
}

/// Two-way (A vs B) aggregate report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPairReport {
    pub timestamp: String,
    pub total_files: usize,
    pub job_a: JsonJobSummary,
    pub job_b: JsonJobSummary,
    pub delta: f64,
    pub sigma_total: f64,
    pub z_value: Metric,
    pub z_analysis: JsonPairExtremes,
    pub per_file_stats: Vec<JsonPairFileStat>,
}

/// Extremes of per-file effective z in the three-way report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonTripleExtremes {
    pub max_z_eff: Option<Metric>,
    pub min_z_eff: Option<Metric>,
    pub max_z_eff_file: String,
    pub min_z_eff_file: String,
}

/// Per-file entry of the three-way report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonTripleFileStat {
    pub file: String,
    pub z_ab: Metric,
    pub z_ac: Metric,
    pub z_eff: Metric,
}

/// Three-way (A vs B, A vs C) aggregate report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonTripleReport {
    pub timestamp: String,
    pub total_files: usize,
    pub job_a: JsonJobSummary,
    pub job_b: JsonJobSummary,
    pub job_c: JsonJobSummary,
    pub z_ab: Metric,
    pub z_ac: Metric,
    pub z_eff: Metric,
    pub z_analysis: JsonTripleExtremes,
    pub per_file_stats: Vec<JsonTripleFileStat>,
}

/// Either report shape; the shape is recognized from its fields when parsing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateReport {
    Triple(JsonTripleReport),
    Pair(JsonPairReport),
}

impl AggregateReport {
    pub fn total_files(&self) -> usize {
        match self {
            AggregateReport::Pair(report) => report.total_files,
            AggregateReport::Triple(report) => report.total_files,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a previously written report
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_places() {
        assert_eq!(round_to(0.123456, 5), 0.12346);
        assert_eq!(round_to(1.987, 2), 1.99);
        assert_eq!(round_to(2.0, 3), 2.0);
    }

    #[test]
    fn test_round_to_uses_binary_value() {
        // 2.675 is stored just below the midpoint
        assert_eq!(round_to(2.675, 2), 2.67);
    }

    #[test]
    fn test_round_to_passes_through_non_finite() {
        assert_eq!(round_to(f64::INFINITY, 2), f64::INFINITY);
        assert!(round_to(f64::NAN, 2).is_nan());
    }

    #[test]
    fn test_metric_serialization() {
        assert_eq!(serde_json::to_string(&Metric(1.25)).unwrap(), "1.25");
        assert_eq!(
            serde_json::to_string(&Metric(f64::INFINITY)).unwrap(),
            "\"inf\""
        );
        assert_eq!(
            serde_json::to_string(&Metric(f64::NEG_INFINITY)).unwrap(),
            "\"-inf\""
        );
        assert_eq!(serde_json::to_string(&Metric(f64::NAN)).unwrap(), "\"nan\"");
    }

    #[test]
    fn test_metric_deserialization() {
        let finite: Metric = serde_json::from_str("2.5").unwrap();
        assert_eq!(finite, Metric(2.5));

        let integer: Metric = serde_json::from_str("3").unwrap();
        assert_eq!(integer, Metric(3.0));

        let inf: Metric = serde_json::from_str("\"inf\"").unwrap();
        assert!(inf.is_infinite());

        let nan: Metric = serde_json::from_str("\"nan\"").unwrap();
        assert!(nan.value().is_nan());

        assert!(serde_json::from_str::<Metric>("\"infinity\"").is_err());
    }

    #[test]
    fn test_large_finite_metric_stays_numeric() {
        let metric = Metric::rounded(2.0 / 1e-9, EFFECTIVE_Z_PLACES);
        let json = serde_json::to_string(&metric).unwrap();
        assert!(!json.contains("inf"));
        assert!(json.parse::<f64>().unwrap() > 1.9e9);
    }

    #[test]
    fn test_missing_extremes_serialize_as_null() {
        let extremes = JsonPairExtremes {
            max_z: None,
            max_z_file: String::new(),
            min_z: None,
            min_z_file: String::new(),
        };
        let json = serde_json::to_string(&extremes).unwrap();
        assert_eq!(
            json,
            r#"{"max_z":null,"max_z_file":"","min_z":null,"min_z_file":""}"#
        );
    }
}

//! Aggregate report assembly
//!
//! [`ReportBuilder`] folds parsed units in batch order: pooled counts per
//! variant, per-unit statistics and the running extremes. [`ReportBuilder::build`]
//! then derives the pooled statistics and applies the output rounding.

use crate::counts::PooledCounts;
use crate::extremal::{ExtremalTracker, Extreme};
use crate::json_output::{
    round_to, AggregateReport, JsonJobSummary, JsonPairExtremes, JsonPairFileStat,
    JsonPairReport, JsonTripleExtremes, JsonTripleFileStat, JsonTripleReport, Metric,
    EFFECTIVE_Z_PLACES, PAIR_Z_PLACES, PROPORTION_PLACES, TRIPLE_Z_PLACES,
};
use crate::loader::{ExperimentUnit, Layout};
use crate::statistics::{effective_z, JobRecord, PairStatistic};

/// Local wall-clock time in report format
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Statistics of a single unit
#[derive(Debug, Clone, PartialEq)]
pub enum UnitStatistics {
    Pair {
        file: String,
        ab: PairStatistic,
    },
    Triple {
        file: String,
        ab: PairStatistic,
        ac: PairStatistic,
        z_eff: f64,
    },
}

impl UnitStatistics {
    /// Compute the statistics of `unit` for the given batch layout
    pub fn from_unit(unit: &ExperimentUnit, layout: Layout) -> Self {
        let ab = unit.pair_ab();
        match (layout, unit.pair_ac()) {
            (Layout::Triple, Some(ac)) => UnitStatistics::Triple {
                file: unit.name.clone(),
                ab,
                ac,
                z_eff: effective_z(ab.z, ac.z),
            },
            _ => UnitStatistics::Pair {
                file: unit.name.clone(),
                ab,
            },
        }
    }

    pub fn file(&self) -> &str {
        match self {
            UnitStatistics::Pair { file, .. } | UnitStatistics::Triple { file, .. } => file,
        }
    }

    /// Value used for batch extremes: z for two-way, effective z for three-way
    pub fn ranking_metric(&self) -> f64 {
        match self {
            UnitStatistics::Pair { ab, .. } => ab.z,
            UnitStatistics::Triple { z_eff, .. } => *z_eff,
        }
    }
}

/// Accumulates units of one batch into an [`AggregateReport`]
#[derive(Debug)]
pub struct ReportBuilder {
    layout: Layout,
    pooled_a: PooledCounts,
    pooled_b: PooledCounts,
    pooled_c: PooledCounts,
    per_unit: Vec<UnitStatistics>,
    tracker: ExtremalTracker,
}

impl ReportBuilder {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            pooled_a: PooledCounts::new(),
            pooled_b: PooledCounts::new(),
            pooled_c: PooledCounts::new(),
            per_unit: Vec::new(),
            tracker: ExtremalTracker::new(),
        }
    }

    /// Fold one successfully parsed unit
    ///
    /// Units must be added in batch order; ties in the extremes keep the
    /// earliest unit.
    pub fn add_unit(&mut self, unit: &ExperimentUnit) -> &UnitStatistics {
        self.pooled_a.absorb(unit.job_a.record.counts());
        self.pooled_b.absorb(unit.job_b.record.counts());
        if self.layout == Layout::Triple {
            if let Some(job_c) = &unit.job_c {
                self.pooled_c.absorb(job_c.record.counts());
            }
        }

        let stats = UnitStatistics::from_unit(unit, self.layout);
        self.tracker.observe(stats.file(), stats.ranking_metric());
        tracing::debug!(
            unit = stats.file(),
            metric = stats.ranking_metric(),
            "unit folded"
        );
        self.per_unit.push(stats);
        &self.per_unit[self.per_unit.len() - 1]
    }

    /// Pooled record of each variant, in A, B(, C) order
    pub fn pooled_records(&self) -> Vec<JobRecord> {
        let mut records = vec![
            self.pooled_a.to_record("job_a"),
            self.pooled_b.to_record("job_b"),
        ];
        if self.layout == Layout::Triple {
            records.push(self.pooled_c.to_record("job_c"));
        }
        records
    }

    /// Produce the final report
    pub fn build(self, timestamp: impl Into<String>) -> AggregateReport {
        let timestamp = timestamp.into();
        let job_a = self.pooled_a.to_record("job_a");
        let job_b = self.pooled_b.to_record("job_b");
        let ab = job_a.compare(&job_b);

        match self.layout {
            Layout::Pair => {
                let per_file_stats = self
                    .per_unit
                    .iter()
                    .map(|stats| JsonPairFileStat {
                        file: stats.file().to_string(),
                        z_value: Metric::rounded(stats.ranking_metric(), PAIR_Z_PLACES),
                    })
                    .collect();
                let (max_z, max_z_file) = extreme_summary(self.tracker.max(), PAIR_Z_PLACES);
                let (min_z, min_z_file) = extreme_summary(self.tracker.min(), PAIR_Z_PLACES);

                AggregateReport::Pair(JsonPairReport {
                    timestamp,
                    total_files: self.per_unit.len(),
                    job_a: job_summary(&job_a),
                    job_b: job_summary(&job_b),
                    delta: round_to(ab.delta, PROPORTION_PLACES),
                    sigma_total: round_to(ab.sigma_total, PROPORTION_PLACES),
                    z_value: Metric::rounded(ab.z, PAIR_Z_PLACES),
                    z_analysis: JsonPairExtremes {
                        max_z,
                        max_z_file,
                        min_z,
                        min_z_file,
                    },
                    per_file_stats,
                })
            }
            Layout::Triple => {
                let job_c = self.pooled_c.to_record("job_c");
                let ac = job_a.compare(&job_c);
                let per_file_stats = self
                    .per_unit
                    .iter()
                    .filter_map(|stats| match stats {
                        UnitStatistics::Triple {
                            file,
                            ab,
                            ac,
                            z_eff,
                        } => Some(JsonTripleFileStat {
                            file: file.clone(),
                            z_ab: Metric::rounded(ab.z, TRIPLE_Z_PLACES),
                            z_ac: Metric::rounded(ac.z, TRIPLE_Z_PLACES),
                            z_eff: Metric::rounded(*z_eff, EFFECTIVE_Z_PLACES),
                        }),
                        UnitStatistics::Pair { .. } => None,
                    })
                    .collect();
                let (max_z_eff, max_z_eff_file) =
                    extreme_summary(self.tracker.max(), EFFECTIVE_Z_PLACES);
                let (min_z_eff, min_z_eff_file) =
                    extreme_summary(self.tracker.min(), EFFECTIVE_Z_PLACES);

                AggregateReport::Triple(JsonTripleReport {
                    timestamp,
                    total_files: self.per_unit.len(),
                    job_a: job_summary(&job_a),
                    job_b: job_summary(&job_b),
                    job_c: job_summary(&job_c),
                    z_ab: Metric::rounded(ab.z, TRIPLE_Z_PLACES),
                    z_ac: Metric::rounded(ac.z, TRIPLE_Z_PLACES),
                    z_eff: Metric::rounded(effective_z(ab.z, ac.z), EFFECTIVE_Z_PLACES),
                    z_analysis: JsonTripleExtremes {
                        max_z_eff,
                        min_z_eff,
                        max_z_eff_file,
                        min_z_eff_file,
                    },
                    per_file_stats,
                })
            }
        }
    }
}

fn job_summary(record: &JobRecord) -> JsonJobSummary {
    JsonJobSummary {
        counts: record.counts().clone(),
        shots: record.trials(),
        p_0: round_to(record.p0(), PROPORTION_PLACES),
        sigma: round_to(record.sigma(), PROPORTION_PLACES),
    }
}

fn extreme_summary(extreme: Option<&Extreme>, places: usize) -> (Option<Metric>, String) {
    match extreme {
        Some(extreme) => (
            Some(Metric::rounded(extreme.value, places)),
            extreme.unit.clone(),
        ),
        None => (None, String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{DeclaredEstimate, UnitJob};

    fn job(id: &str, zeros: u64, ones: u64) -> UnitJob {
        let record = JobRecord::new(id, [("0", zeros), ("1", ones)].into_iter().collect());
        let declared = DeclaredEstimate {
            shots: record.trials(),
            p0: record.p0(),
            sigma: record.sigma(),
        };
        UnitJob { record, declared }
    }

    fn pair_unit(name: &str, a: (u64, u64), b: (u64, u64)) -> ExperimentUnit {
        ExperimentUnit {
            name: name.to_string(),
            job_a: job("a", a.0, a.1),
            job_b: job("b", b.0, b.1),
            job_c: None,
        }
    }

    fn triple_unit(name: &str, a: (u64, u64), b: (u64, u64), c: (u64, u64)) -> ExperimentUnit {
        ExperimentUnit {
            job_c: Some(job("c", c.0, c.1)),
            ..pair_unit(name, a, b)
        }
    }

    #[test]
    fn test_pair_report_pools_counts() {
        let mut builder = ReportBuilder::new(Layout::Pair);
        builder.add_unit(&pair_unit("r1.json", (5, 5), (3, 7)));
        builder.add_unit(&pair_unit("r2.json", (3, 7), (5, 5)));

        let AggregateReport::Pair(report) = builder.build("2025-01-01 00:00:00") else {
            panic!("expected two-way report");
        };
        assert_eq!(report.total_files, 2);
        assert_eq!(report.job_a.shots, 20);
        assert_eq!(report.job_a.counts.get("0"), 8);
        assert_eq!(report.job_a.p_0, 0.4);
        assert_eq!(report.job_b.p_0, 0.4);
        assert_eq!(report.delta, 0.0);
        assert_eq!(report.z_value, Metric(0.0));
        assert_eq!(report.per_file_stats.len(), 2);
    }

    #[test]
    fn test_pair_report_rounds_z_to_two_places() {
        let mut builder = ReportBuilder::new(Layout::Pair);
        builder.add_unit(&pair_unit("r1.json", (5, 5), (3, 7)));

        let AggregateReport::Pair(report) = builder.build("t") else {
            panic!("expected two-way report");
        };
        // 0.2 / sqrt(0.025 + 0.021) = 0.9325...
        assert_eq!(report.z_value, Metric(0.93));
        assert_eq!(report.per_file_stats[0].z_value, Metric(0.93));
        assert_eq!(report.z_analysis.max_z, Some(Metric(0.93)));
        assert_eq!(report.z_analysis.max_z_file, "r1.json");
        assert_eq!(report.job_a.sigma, 0.15811);
        assert_eq!(report.sigma_total, 0.21448);
    }

    #[test]
    fn test_pair_extremes_track_first_occurrence() {
        let mut builder = ReportBuilder::new(Layout::Pair);
        builder.add_unit(&pair_unit("f1.json", (5, 5), (5, 5)));
        builder.add_unit(&pair_unit("f2.json", (9, 1), (1, 9)));
        builder.add_unit(&pair_unit("f3.json", (9, 1), (1, 9)));
        builder.add_unit(&pair_unit("f4.json", (5, 5), (4, 6)));

        let AggregateReport::Pair(report) = builder.build("t") else {
            panic!("expected two-way report");
        };
        assert_eq!(report.z_analysis.max_z_file, "f2.json");
        assert_eq!(report.z_analysis.min_z_file, "f1.json");
        assert_eq!(report.z_analysis.min_z, Some(Metric(0.0)));
    }

    #[test]
    fn test_zero_variance_pooled_z_is_inf() {
        let mut builder = ReportBuilder::new(Layout::Pair);
        builder.add_unit(&pair_unit("r1.json", (10, 0), (10, 0)));

        let report = builder.build("t");
        let json = report.to_json().unwrap();
        assert!(json.contains("\"z_value\": \"inf\""));
        assert!(json.contains("\"max_z\": \"inf\""));
    }

    #[test]
    fn test_triple_report_uses_effective_z() {
        let mut builder = ReportBuilder::new(Layout::Triple);
        let first = builder
            .add_unit(&triple_unit("t1.json", (50, 50), (30, 70), (48, 52)))
            .clone();
        builder.add_unit(&triple_unit("t2.json", (50, 50), (45, 55), (30, 70)));

        let AggregateReport::Triple(report) = builder.build("t") else {
            panic!("expected three-way report");
        };
        assert_eq!(report.total_files, 2);
        assert_eq!(report.job_c.shots, 200);
        assert_eq!(report.per_file_stats.len(), 2);

        let UnitStatistics::Triple { z_eff, .. } = &first else {
            panic!("expected three-way statistics");
        };
        assert_eq!(report.per_file_stats[0].z_eff, Metric::rounded(*z_eff, 3));
        assert_eq!(report.z_analysis.max_z_eff_file, "t1.json");
        assert_eq!(report.z_analysis.min_z_eff_file, "t2.json");
    }

    #[test]
    fn test_triple_zero_ac_separation_is_large_finite() {
        let mut builder = ReportBuilder::new(Layout::Triple);
        builder.add_unit(&triple_unit("t1.json", (50, 50), (30, 70), (50, 50)));

        let AggregateReport::Triple(report) = builder.build("t") else {
            panic!("expected three-way report");
        };
        assert_eq!(report.z_ac, Metric(0.0));
        assert!(report.z_eff.value().is_finite());
        assert!(report.z_eff.value() > 1e9);
    }

    #[test]
    fn test_empty_batch_is_degenerate_but_defined() {
        let builder = ReportBuilder::new(Layout::Pair);
        let AggregateReport::Pair(report) = builder.build("t") else {
            panic!("expected two-way report");
        };
        assert_eq!(report.total_files, 0);
        assert_eq!(report.job_a.shots, 0);
        assert_eq!(report.job_a.p_0, 0.0);
        assert_eq!(report.z_analysis.max_z, None);
        assert_eq!(report.z_analysis.max_z_file, "");
        assert!(report.per_file_stats.is_empty());
        // both pooled sigmas are zero
        assert!(report.z_value.is_infinite());
    }

    #[test]
    fn test_report_round_trip_is_idempotent() {
        let mut builder = ReportBuilder::new(Layout::Triple);
        builder.add_unit(&triple_unit("t1.json", (50, 50), (30, 70), (48, 52)));
        builder.add_unit(&triple_unit("t2.json", (10, 0), (10, 0), (10, 0)));

        let first = builder.build("2025-01-01 00:00:00").to_json().unwrap();
        let reparsed = AggregateReport::from_json(&first).unwrap();
        let second = reparsed.to_json().unwrap();
        assert_eq!(first, second);
        assert_eq!(reparsed.total_files(), 2);
        assert!(matches!(reparsed, AggregateReport::Triple(_)));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
        assert_eq!(&ts[13..14], ":");
    }
}

//! Bernoulli-proportion statistics
//!
//! Proportion of the all-zero outcome, its standard error, and the
//! two-proportion z statistic used to compare experiment variants.
//!
//! All functions here are total: zero trials and zero variance produce
//! defined values (0 or +∞) instead of errors or NaN.

use crate::counts::OutcomeCountMap;

/// Additive guard in the effective-z denominator
pub const EFFECTIVE_Z_EPSILON: f64 = 1e-9;

/// Estimate p0 and its standard error from counts
///
/// `trials == 0` yields `(0.0, 0.0)`.
pub fn proportion_and_sigma(counts: &OutcomeCountMap, trials: u64) -> (f64, f64) {
    if trials == 0 {
        return (0.0, 0.0);
    }
    let n = trials as f64;
    let p0 = counts.zero_count() as f64 / n;
    let sigma = (p0 * (1.0 - p0) / n).sqrt();
    (p0, sigma)
}

/// One variant's measured outcomes with derived estimates
///
/// `trials`, `p0` and `sigma` are always derived from `counts`; there is no
/// way to construct a record with independently supplied estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    identifier: String,
    counts: OutcomeCountMap,
    trials: u64,
    p0: f64,
    sigma: f64,
}

impl JobRecord {
    pub fn new(identifier: impl Into<String>, counts: OutcomeCountMap) -> Self {
        let trials = counts.total();
        let (p0, sigma) = proportion_and_sigma(&counts, trials);
        Self {
            identifier: identifier.into(),
            counts,
            trials,
            p0,
            sigma,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn counts(&self) -> &OutcomeCountMap {
        &self.counts
    }

    pub fn trials(&self) -> u64 {
        self.trials
    }

    pub fn p0(&self) -> f64 {
        self.p0
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Compare this record against another one
    pub fn compare(&self, other: &JobRecord) -> PairStatistic {
        pair_statistic(self.p0, self.sigma, other.p0, other.sigma)
    }
}

/// Separation between two proportion estimates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairStatistic {
    /// |p0_x - p0_y|
    pub delta: f64,
    /// sqrt(sigma_x² + sigma_y²)
    pub sigma_total: f64,
    /// delta / sigma_total, +∞ when sigma_total is zero
    pub z: f64,
}

/// Two-proportion z statistic
///
/// When `sigma_total == 0` the z value is +∞ even if `delta == 0`: both
/// estimates are deterministic, so any comparison is treated as fully
/// resolved rather than as "no difference".
pub fn pair_statistic(p0_x: f64, sigma_x: f64, p0_y: f64, sigma_y: f64) -> PairStatistic {
    let delta = (p0_x - p0_y).abs();
    let sigma_total = (sigma_x.powi(2) + sigma_y.powi(2)).sqrt();
    let z = if sigma_total > 0.0 {
        delta / sigma_total
    } else {
        f64::INFINITY
    };
    PairStatistic {
        delta,
        sigma_total,
        z,
    }
}

/// Ratio-of-z ranking signal for three-way experiments
///
/// `z_ab / (z_ac + 1e-9)`. Directional on purpose: it grows without bound as
/// the A/C separation vanishes, and is not a textbook statistic. A truly
/// infinite `z_ab` stays infinite; a zero `z_ac` only produces a large finite
/// value.
pub fn effective_z(z_ab: f64, z_ac: f64) -> f64 {
    z_ab / (z_ac + EFFECTIVE_Z_EPSILON)
}

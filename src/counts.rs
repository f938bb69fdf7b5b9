//! Outcome count maps and pooled totals
//!
//! A count map is keyed by the measured bitstring label. Pooling many maps is
//! a plain key-wise sum, so the result does not depend on merge order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::statistics::JobRecord;

/// Observed occurrences per bitstring label
///
/// Absent labels count as zero. Stored in a `BTreeMap` so that serialized
/// output has a stable key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeCountMap {
    counts: BTreeMap<String, u64>,
}

impl OutcomeCountMap {
    /// Create an empty count map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` occurrences of `label`
    pub fn add(&mut self, label: &str, count: u64) {
        let entry = self.counts.entry(label.to_string()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    /// Count for a label (0 when absent)
    pub fn get(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Count of the all-zero label ("0", "00", ...)
    pub fn zero_count(&self) -> u64 {
        self.counts
            .iter()
            .filter(|(label, _)| !label.is_empty() && label.bytes().all(|b| b == b'0'))
            .fold(0u64, |acc, (_, count)| acc.saturating_add(*count))
    }

    /// Sum of all counts, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.counts
            .values()
            .fold(0u64, |acc, count| acc.saturating_add(*count))
    }

    /// Sum of all counts, `None` on overflow
    pub fn checked_total(&self) -> Option<u64> {
        self.counts
            .values()
            .try_fold(0u64, |acc, count| acc.checked_add(*count))
    }

    /// Number of distinct labels
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Labels and counts in label order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Key-wise sum of two maps
    pub fn merge(mut self, other: &OutcomeCountMap) -> Self {
        self.absorb(other);
        self
    }

    /// In-place key-wise sum
    pub fn absorb(&mut self, other: &OutcomeCountMap) {
        for (label, count) in other.iter() {
            self.add(label, count);
        }
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for OutcomeCountMap {
    fn from_iter<T: IntoIterator<Item = (S, u64)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (label, count) in iter {
            let label: String = label.into();
            map.add(&label, count);
        }
        map
    }
}

/// Pooled counts for one variant across many units
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PooledCounts {
    pub counts: OutcomeCountMap,
    pub trials: u64,
}

impl PooledCounts {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one unit's counts into the running totals
    ///
    /// `trials` grows by exactly the sum of `new_counts`.
    pub fn merge(mut self, new_counts: &OutcomeCountMap) -> Self {
        self.absorb(new_counts);
        self
    }

    /// In-place [`PooledCounts::merge`]
    pub fn absorb(&mut self, new_counts: &OutcomeCountMap) {
        self.counts.absorb(new_counts);
        self.trials = self.trials.saturating_add(new_counts.total());
    }

    /// Build the pooled job record for this variant
    pub fn to_record(&self, identifier: &str) -> JobRecord {
        JobRecord::new(identifier, self.counts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, u64)]) -> OutcomeCountMap {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_absent_label_is_zero() {
        let counts = map(&[("1", 4)]);
        assert_eq!(counts.get("0"), 0);
        assert_eq!(counts.zero_count(), 0);
    }

    #[test]
    fn test_merge_pools_counts_and_trials() {
        let pooled = PooledCounts::new()
            .merge(&map(&[("0", 5), ("1", 5)]))
            .merge(&map(&[("0", 3), ("1", 7)]));

        assert_eq!(pooled.counts, map(&[("0", 8), ("1", 12)]));
        assert_eq!(pooled.trials, 20);
        assert_eq!(pooled.to_record("pooled").p0(), 0.4);
    }

    #[test]
    fn test_merge_order_independent() {
        let first = map(&[("0", 5), ("1", 5)]);
        let second = map(&[("0", 3), ("1", 7), ("11", 2)]);

        let forward = PooledCounts::new().merge(&first).merge(&second);
        let reverse = PooledCounts::new().merge(&second).merge(&first);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_merge_creates_missing_keys() {
        let pooled = PooledCounts::new().merge(&map(&[("1", 2)])).merge(&map(&[("0", 1)]));
        assert_eq!(pooled.counts.len(), 2);
        assert_eq!(pooled.counts.get("0"), 1);
        assert_eq!(pooled.trials, 3);
    }

    #[test]
    fn test_checked_total_detects_overflow() {
        let counts = map(&[("0", u64::MAX), ("1", 1)]);
        assert_eq!(counts.checked_total(), None);
        assert_eq!(counts.total(), u64::MAX);
    }

    #[test]
    fn test_zero_count_multi_bit() {
        let counts = map(&[("00", 6), ("01", 2), ("10", 1)]);
        assert_eq!(counts.zero_count(), 6);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let counts = map(&[("1", 7), ("0", 3)]);
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"0":3,"1":7}"#);

        let parsed: OutcomeCountMap = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, counts);
    }
}

//! Running maximum and minimum over a batch
//!
//! Values arrive in batch order. A later value only displaces the current
//! extreme on strict improvement, so ties keep the earliest unit.

/// A metric value together with the unit it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Extreme {
    pub value: f64,
    pub unit: String,
}

/// Tracks the largest and smallest metric seen so far
#[derive(Debug, Clone, Default)]
pub struct ExtremalTracker {
    max: Option<Extreme>,
    min: Option<Extreme>,
}

impl ExtremalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the metric of one unit
    ///
    /// NaN never compares greater or smaller than anything and is ignored.
    pub fn observe(&mut self, unit: &str, value: f64) {
        if value.is_nan() {
            tracing::debug!(unit, "NaN metric excluded from extremes");
            return;
        }

        if self.max.as_ref().map_or(true, |max| value > max.value) {
            self.max = Some(Extreme {
                value,
                unit: unit.to_string(),
            });
        }
        if self.min.as_ref().map_or(true, |min| value < min.value) {
            self.min = Some(Extreme {
                value,
                unit: unit.to_string(),
            });
        }
    }

    pub fn max(&self) -> Option<&Extreme> {
        self.max.as_ref()
    }

    pub fn min(&self) -> Option<&Extreme> {
        self.min.as_ref()
    }
}

impl<'a> FromIterator<(&'a str, f64)> for ExtremalTracker {
    fn from_iter<T: IntoIterator<Item = (&'a str, f64)>>(iter: T) -> Self {
        let mut tracker = Self::new();
        for (unit, value) in iter {
            tracker.observe(unit, value);
        }
        tracker
    }
}

//! Weighted running mean of remote-offset estimates

/// Exponential-weighted running average.
///
/// Weights are never normalized: old samples keep their accumulated mass,
/// so the mean stabilizes quickly and then resists outliers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningExponentialAverage {
    weight: f64,
    weighted_sum: f64,
}

impl RunningExponentialAverage {
    /// Create an empty average
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a sample with the given weight
    pub fn add(&mut self, value: f64, weight: f64) {
        self.weighted_sum += value * weight;
        self.weight += weight;
    }

    /// Current weighted mean.
    ///
    /// Must not be called while [`is_empty`](Self::is_empty) is true.
    #[must_use]
    pub fn get(&self) -> f64 {
        debug_assert!(self.weight != 0.0, "average read before first sample");
        self.weighted_sum / self.weight
    }

    /// True until the first `add`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weight == 0.0
    }
}

//! Reduction primitives for population observations.
//!
//! This module defines **plain accumulator types** used to summarize a
//! per-step [`Snapshot`](crate::engine::snapshot::Snapshot) without mutating
//! any cell.
//!
//! ## Execution model
//! A reduction proceeds in two phases:
//!
//! 1. **Accumulation** — each accumulator consumes values one at a time
//!    (`push` / `add`).
//! 2. **Combination** — partial accumulators built over disjoint subsets
//!    (one per container) are merged with `combine`. Counts and extrema are
//!    exact under any split; sums and moments agree up to rounding.
//!
//! ## Provided accumulators
//!
//! * [`Count`] — counts cells.
//! * [`Sum`] — accumulates floating-point totals.
//! * [`MinMax`] — tracks minimum and maximum values.
//! * [`Welford`] — mean and variance with a numerically stable online
//!   algorithm.
//!
//! ## Usage example
//! ```ignore
//! let mut mass = Sum::default();
//! for cell in snapshot.cells() {
//!     mass.add(cell.mass);
//! }
//! ```

/// Accumulator that counts the number of cells processed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Count(pub u64);

impl Count {
    /// Counts one cell.
    #[inline]
    pub fn add(&mut self) {
        self.0 += 1;
    }

    /// Adds the count of a disjoint subset.
    pub fn combine(&mut self, other: &Count) {
        self.0 += other.0;
    }
}

/// Accumulator that computes a floating-point sum.
///
/// ## Semantics
/// Values are accumulated using standard floating-point addition. Totals
/// from different splits of the same population may differ in the last bits.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sum(pub f64);

impl Sum {
    /// Adds one value.
    #[inline]
    pub fn add(&mut self, x: f64) {
        self.0 += x;
    }

    /// Adds the total of a disjoint subset.
    pub fn combine(&mut self, other: &Sum) {
        self.0 += other.0;
    }
}

/// Accumulator that tracks minimum and maximum values.
///
/// The default initializer sets `min` to positive and `max` to negative
/// infinity, so the first observed value establishes both bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMax {
    /// Smallest observed value.
    pub min: f64,

    /// Largest observed value.
    pub max: f64,
}

impl Default for MinMax {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl MinMax {
    /// Widens the bounds to include `x`.
    #[inline]
    pub fn push(&mut self, x: f64) {
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    /// Widens the bounds to cover another subset.
    pub fn combine(&mut self, other: &MinMax) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Returns `true` until the first value is pushed.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

/// Accumulator implementing Welford's online algorithm for mean and variance.
///
/// ## Semantics
/// Computes the mean and (sample) variance of a stream of values in a single,
/// numerically stable pass. Partial accumulators are merged with the
/// pairwise update of Chan et al.
///
/// ## References
/// * Welford, B. P. (1962). *Note on a method for calculating corrected sums of
///   squares and products*.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Welford {
    /// Number of samples processed.
    pub n: u64,

    /// Running mean.
    pub mean: f64,

    /// Sum of squared deviations from the mean.
    pub m2: f64,
}

impl Welford {
    /// Incorporates a new sample into the running statistics.
    pub fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Merges the statistics of a disjoint subset.
    pub fn combine(&mut self, other: &Welford) {
        if other.n == 0 {
            return;
        }
        if self.n == 0 {
            *self = *other;
            return;
        }
        let n = self.n + other.n;
        let delta = other.mean - self.mean;
        self.mean += delta * other.n as f64 / n as f64;
        self.m2 += other.m2 + delta * delta * (self.n as f64 * other.n as f64) / n as f64;
        self.n = n;
    }

    /// Returns the unbiased sample variance.
    pub fn variance(&self) -> f64 {
        if self.n > 1 {
            self.m2 / (self.n - 1) as f64
        } else {
            0.0
        }
    }
}

// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Incremental statistics over a stream of observations.
//!
//! Mean and variance use Welford's recurrence so long runs do not lose
//! precision to a `sum_of_squares / n - mean^2` cancellation. Every
//! query that is undefined for an empty stream returns `None`.

use serde::{Deserialize, Serialize};

/// Running count, sum, mean, sample variance, min and max. O(1) per update.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningAggregate {
    count: u64,
    sum: f64,
    mean: f64,
    /// Sum of squared deviations from the running mean.
    m2: f64,
    min: f64,
    max: f64,
}

impl Default for RunningAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningAggregate {
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Fold one observation into the aggregate. Any value is accepted.
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Combine another aggregate into this one (Chan et al. parallel update).
    pub fn merge(&mut self, other: &RunningAggregate) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let (n_a, n_b, n) = (self.count as f64, other.count as f64, count as f64);
        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.count = count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample variance (n - 1 denominator); zero for a single observation.
    pub fn variance(&self) -> Option<f64> {
        match self.count {
            0 => None,
            1 => Some(0.0),
            n => Some((self.m2 / (n - 1) as f64).max(0.0)),
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    pub fn summary(&self) -> AggregateSummary {
        AggregateSummary {
            count: self.count,
            sum: self.sum,
            mean: self.mean(),
            std_dev: self.std_dev(),
            min: self.min(),
            max: self.max(),
        }
    }
}

/// Serializable point-in-time view of a [`RunningAggregate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub count: u64,
    pub sum: f64,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_aggregate_has_no_derived_values() {
        let agg = RunningAggregate::new();
        assert_eq!(agg.count(), 0);
        assert_eq!(agg.sum(), 0.0);
        assert!(agg.mean().is_none());
        assert!(agg.variance().is_none());
        assert!(agg.std_dev().is_none());
        assert!(agg.min().is_none());
        assert!(agg.max().is_none());
    }

    #[test]
    fn single_value() {
        let mut agg = RunningAggregate::new();
        agg.add(-4.5);
        assert_eq!(agg.count(), 1);
        assert_eq!(agg.mean(), Some(-4.5));
        assert_eq!(agg.variance(), Some(0.0));
        assert_eq!(agg.min(), Some(-4.5));
        assert_eq!(agg.max(), Some(-4.5));
    }

    #[test]
    fn matches_two_pass_statistics() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut agg = RunningAggregate::new();
        for &x in &samples {
            agg.add(x);
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);

        assert_eq!(agg.count(), 8);
        assert!(close(agg.sum(), 40.0));
        assert!(close(agg.mean().unwrap(), mean));
        assert!(close(agg.variance().unwrap(), var));
        assert!(close(agg.std_dev().unwrap(), var.sqrt()));
        assert_eq!(agg.min(), Some(2.0));
        assert_eq!(agg.max(), Some(9.0));
    }

    #[test]
    fn large_offset_keeps_precision() {
        let mut agg = RunningAggregate::new();
        for x in [1e9 + 4.0, 1e9 + 7.0, 1e9 + 13.0, 1e9 + 16.0] {
            agg.add(x);
        }
        assert!(close(agg.variance().unwrap(), 30.0));
    }

    #[test]
    fn merge_equals_sequential() {
        let left = [1.0, 3.0, 8.0];
        let right = [-2.0, 10.0, 0.5, 4.0];

        let mut a = RunningAggregate::new();
        left.iter().for_each(|&x| a.add(x));
        let mut b = RunningAggregate::new();
        right.iter().for_each(|&x| b.add(x));
        let mut all = RunningAggregate::new();
        left.iter().chain(right.iter()).for_each(|&x| all.add(x));

        a.merge(&b);
        assert_eq!(a.count(), all.count());
        assert!(close(a.sum(), all.sum()));
        assert!(close(a.mean().unwrap(), all.mean().unwrap()));
        assert!(close(a.variance().unwrap(), all.variance().unwrap()));
        assert_eq!(a.min(), Some(-2.0));
        assert_eq!(a.max(), Some(10.0));
    }

    #[test]
    fn merge_with_empty_sides() {
        let mut a = RunningAggregate::new();
        a.merge(&RunningAggregate::new());
        assert!(a.is_empty());

        let mut b = RunningAggregate::new();
        b.add(3.0);
        a.merge(&b);
        assert_eq!(a, b);
    }

    #[test]
    fn reset_returns_to_empty() {
        let mut agg = RunningAggregate::new();
        agg.add(1.0);
        agg.reset();
        assert_eq!(agg, RunningAggregate::new());
    }
}

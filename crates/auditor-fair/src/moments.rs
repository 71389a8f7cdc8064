//! Moments of a classifier's predictions used by the reduction.
//!
//! `ErrorRate` is the objective. Constraints implement [`Constraint`]:
//! a vector of moments `gamma(h)` that must stay below `bound()`, and the
//! per-sample signed weights that the Lagrangian term contributes to the
//! cost-sensitive oracle problem.

use std::collections::{BTreeMap, BTreeSet};

use auditor_common::error::{AuditorError, Result};

/// Misclassification rate of hard 0/1 predictions.
#[derive(Debug, Clone)]
pub struct ErrorRate {
    labels: Vec<usize>,
}

impl ErrorRate {
    pub fn new(labels: &[usize]) -> Self {
        Self { labels: labels.to_vec() }
    }

    pub fn error(&self, predictions: &[f64]) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        let total: f64 = predictions
            .iter()
            .zip(&self.labels)
            .map(|(p, &y)| (p - y as f64).abs())
            .sum();
        total / self.labels.len() as f64
    }

    /// Positive weight favours predicting 1: `2y - 1`.
    pub fn signed_weights(&self) -> Vec<f64> {
        self.labels.iter().map(|&y| 2.0 * y as f64 - 1.0).collect()
    }
}

/// A vector of linear constraints on a classifier's predictions.
pub trait Constraint: Send + Sync {
    /// Number of constraint entries (length of `gamma`, `bound` and the multiplier vector).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Constraint moments for hard predictions on the training sample.
    fn gamma(&self, predictions: &[f64]) -> Vec<f64>;

    /// Allowed value of each moment.
    fn bound(&self) -> Vec<f64>;

    /// Per-sample weight the multipliers add to the cost-sensitive problem.
    fn signed_weights(&self, lambda: &[f64]) -> Vec<f64>;

    /// Equivalent multipliers with the smallest total mass.
    fn project_lambda(&self, lambda: &[f64]) -> Vec<f64>;
}

/// Selection rate of every group stays within `difference_bound` of the overall rate.
///
/// Entries are laid out as `[+ per group..., - per group...]` where
/// `γ₊(a) = E[h | A=a] - E[h]` and `γ₋(a) = -γ₊(a)`.
#[derive(Debug, Clone)]
pub struct DemographicParity {
    difference_bound: f64,
    group_names: Vec<String>,
    group_of: Vec<usize>,
    group_prob: Vec<f64>,
}

impl DemographicParity {
    pub fn new(sensitive: &[String], difference_bound: f64) -> Result<Self> {
        if sensitive.is_empty() {
            return Err(AuditorError::training("demographic parity needs at least one sample"));
        }

        let group_names: Vec<String> = sensitive
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let position: BTreeMap<&str, usize> = group_names
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_str(), i))
            .collect();
        let group_of: Vec<usize> = sensitive.iter().map(|s| position[s.as_str()]).collect();

        let n = sensitive.len() as f64;
        let mut group_prob = vec![0.0; group_names.len()];
        for &g in &group_of {
            group_prob[g] += 1.0 / n;
        }

        Ok(Self { difference_bound, group_names, group_of, group_prob })
    }

    pub fn group_names(&self) -> &[String] {
        &self.group_names
    }

    fn n_groups(&self) -> usize {
        self.group_names.len()
    }
}

impl Constraint for DemographicParity {
    fn len(&self) -> usize {
        2 * self.n_groups()
    }

    fn gamma(&self, predictions: &[f64]) -> Vec<f64> {
        let k = self.n_groups();
        let n = predictions.len() as f64;
        let overall = predictions.iter().sum::<f64>() / n;

        let mut sums = vec![0.0; k];
        let mut counts = vec![0.0; k];
        for (p, &g) in predictions.iter().zip(&self.group_of) {
            sums[g] += p;
            counts[g] += 1.0;
        }

        let plus: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, c)| if *c > 0.0 { s / c - overall } else { 0.0 })
            .collect();
        let minus = plus.iter().map(|v| -v);
        plus.iter().copied().chain(minus).collect()
    }

    fn bound(&self) -> Vec<f64> {
        vec![self.difference_bound; self.len()]
    }

    fn signed_weights(&self, lambda: &[f64]) -> Vec<f64> {
        let k = self.n_groups();
        let signed: Vec<f64> = (0..k).map(|g| lambda[g] - lambda[k + g]).collect();
        let total: f64 = signed.iter().sum();
        let adjust: Vec<f64> = signed
            .iter()
            .zip(&self.group_prob)
            .map(|(s, p)| total - s / p)
            .collect();
        self.group_of.iter().map(|&g| adjust[g]).collect()
    }

    /// Opposing `+`/`-` entries of a group cancel, leaving only the positive net on one side.
    fn project_lambda(&self, lambda: &[f64]) -> Vec<f64> {
        let k = self.n_groups();
        let plus = (0..k).map(|g| (lambda[g] - lambda[k + g]).max(0.0));
        let minus = (0..k).map(|g| (lambda[k + g] - lambda[g]).max(0.0));
        plus.chain(minus).collect()
    }
}

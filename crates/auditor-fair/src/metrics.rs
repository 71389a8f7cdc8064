//! Accuracy and group fairness metrics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use auditor_common::error::{AuditorError, Result};

use crate::pipeline::ModelKind;

/// Fraction of predictions equal to the true label.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(AuditorError::metric(format!(
            "y_true has {} entries, y_pred has {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(AuditorError::metric("accuracy of an empty prediction set"));
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Fraction of positive predictions.
pub fn selection_rate(y_pred: &[usize]) -> Result<f64> {
    if y_pred.is_empty() {
        return Err(AuditorError::metric("selection rate of an empty prediction set"));
    }
    let selected = y_pred.iter().filter(|&&p| p == 1).count();
    Ok(selected as f64 / y_pred.len() as f64)
}

pub fn selection_rates_by_group(y_pred: &[usize], groups: &[String]) -> Result<BTreeMap<String, f64>> {
    if y_pred.len() != groups.len() {
        return Err(AuditorError::metric(format!(
            "{} predictions but {} group labels",
            y_pred.len(),
            groups.len()
        )));
    }
    if y_pred.is_empty() {
        return Err(AuditorError::metric("no predictions to group"));
    }

    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for (&p, g) in y_pred.iter().zip(groups) {
        let entry = counts.entry(g.as_str()).or_default();
        entry.0 += usize::from(p == 1);
        entry.1 += 1;
    }

    Ok(counts
        .into_iter()
        .map(|(g, (selected, total))| (g.to_string(), selected as f64 / total as f64))
        .collect())
}

/// Largest minus smallest group selection rate.
pub fn demographic_parity_difference(y_pred: &[usize], groups: &[String]) -> Result<f64> {
    let rates = selection_rates_by_group(y_pred, groups)?;
    Ok(spread(&rates))
}

fn spread(rates: &BTreeMap<String, f64>) -> f64 {
    let max = rates.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = rates.values().copied().fold(f64::INFINITY, f64::min);
    if max.is_finite() && min.is_finite() {
        max - min
    } else {
        0.0
    }
}

/// Rate for a named group, falling back to its numeric code (`"1"` / `"1.0"`).
pub fn group_rate(rates: &BTreeMap<String, f64>, name: &str, numeric_fallback: &str) -> f64 {
    let decimal = format!("{numeric_fallback}.0");
    [name, numeric_fallback, decimal.as_str()]
        .iter()
        .find_map(|key| rates.get(*key).copied())
        .unwrap_or(0.0)
}

/// Evaluation of one model on held-out data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FairnessReport {
    pub model: ModelKind,
    pub accuracy: f64,
    pub bias_gap: f64,
    pub female_rate: f64,
    pub male_rate: f64,
    pub selection_rates: BTreeMap<String, f64>,
    pub n_train: usize,
    pub n_test: usize,
    /// `"uploaded"` or `"synthetic"`
    pub source: String,
}

impl FairnessReport {
    /// Accuracy failures propagate; fairness failures degrade to zeros with a warning.
    pub fn evaluate(
        model: ModelKind,
        y_true: &[usize],
        y_pred: &[usize],
        groups: &[String],
        n_train: usize,
    ) -> Result<Self> {
        let accuracy = accuracy(y_true, y_pred)?;

        let (bias_gap, selection_rates) = match selection_rates_by_group(y_pred, groups) {
            Ok(rates) => (spread(&rates), rates),
            Err(e) => {
                tracing::warn!(error = %e, "fairness metrics unavailable, reporting zero gap");
                (0.0, BTreeMap::new())
            }
        };

        Ok(Self {
            model,
            accuracy,
            bias_gap,
            female_rate: group_rate(&selection_rates, "Female", "1"),
            male_rate: group_rate(&selection_rates, "Male", "0"),
            selection_rates,
            n_train,
            n_test: y_true.len(),
            source: String::new(),
        })
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

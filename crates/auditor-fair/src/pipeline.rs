//! End-to-end training runs: subsample, split, fit, evaluate.

use std::fmt;

use serde::{Deserialize, Serialize};

use auditor_common::config::{MitigationConfig, TrainingConfig};
use auditor_common::error::{AuditorError, Result};
use auditor_data::{train_test_split, PreparedDataset};

use crate::metrics::FairnessReport;
use crate::reduction::ExponentiatedGradient;
use crate::tree::DecisionTreeClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Plain decision tree.
    Baseline,
    /// Decision trees under the demographic-parity reduction.
    Mitigated,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Baseline => write!(f, "baseline"),
            ModelKind::Mitigated => write!(f, "mitigated"),
        }
    }
}

/// Train one model on at most `n_samples` rows of `dataset` and report on the held-out split.
pub fn train_and_evaluate(
    dataset: &PreparedDataset,
    n_samples: usize,
    kind: ModelKind,
    training: &TrainingConfig,
    mitigation: &MitigationConfig,
) -> Result<FairnessReport> {
    if n_samples == 0 {
        return Err(AuditorError::invalid_data("n_samples must be positive"));
    }

    let sample = dataset.subsample(n_samples, training.sample_seed);
    let split = train_test_split(&sample, training.test_size, training.split_seed)?;
    let (train, test) = (&split.train, &split.test);

    tracing::debug!(
        model = %kind,
        n_train = train.n_rows(),
        n_test = test.n_rows(),
        sensitive = %dataset.sensitive_column,
        "training"
    );

    let predictions = match kind {
        ModelKind::Baseline => {
            let mut tree = DecisionTreeClassifier::new().with_max_depth(training.max_depth);
            tree.fit(&train.features, &train.labels, None)?;
            tree.predict(&test.features)?
        }
        ModelKind::Mitigated => {
            let model = ExponentiatedGradient::from_config(mitigation, training.max_depth).fit(
                &train.features,
                &train.labels,
                &train.groups,
            )?;
            model.predict(&test.features)?
        }
    };

    let report = FairnessReport::evaluate(kind, &test.labels, &predictions, &test.groups, train.n_rows())?;
    tracing::info!(
        model = %kind,
        accuracy = report.accuracy,
        bias_gap = report.bias_gap,
        "model evaluated"
    );
    Ok(report)
}

/// How the mitigated model moved relative to the baseline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comparison {
    /// mitigated − baseline
    pub accuracy_change: f64,
    /// |baseline gap| − |mitigated gap|
    pub bias_gap_reduction: f64,
    pub fairness_improved: bool,
}

impl Comparison {
    pub fn between(baseline: &FairnessReport, mitigated: &FairnessReport) -> Self {
        let bias_gap_reduction = baseline.bias_gap.abs() - mitigated.bias_gap.abs();
        Self {
            accuracy_change: mitigated.accuracy - baseline.accuracy,
            bias_gap_reduction,
            fairness_improved: bias_gap_reduction > 0.0,
        }
    }
}

//! auditor-fair — Baseline and fairness-constrained training with group metrics.
//!
//! The constrained model follows the exponentiated-gradient reduction
//! (Agarwal et al., 2018): a sequence of cost-sensitive decision trees is
//! trained against a demographic-parity Lagrangian and the final
//! classifier is a randomized mixture of them.

#[cfg(test)]
mod fixtures;
mod linprog;
pub mod metrics;
pub mod moments;
pub mod pipeline;
pub mod reduction;
pub mod tree;

pub use metrics::FairnessReport;
pub use pipeline::{train_and_evaluate, Comparison, ModelKind};
pub use reduction::{ExponentiatedGradient, MitigatedModel};
pub use tree::DecisionTreeClassifier;

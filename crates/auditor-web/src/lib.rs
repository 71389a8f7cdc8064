//! auditor-web — HTTP service for the fairness auditor.
//! Provides:
//!   - CSV upload with sensitive/target column inference
//!   - Baseline and fairness-constrained training runs
//!   - Side-by-side model comparison
//!   - A downloadable sample dataset
//!   - Server-sent events for uploads and finished runs

pub mod extract;
pub mod handlers;
pub mod router;
pub mod sse;
pub mod state;

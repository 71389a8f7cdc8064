//! auditor-data — Tabular ingestion for the fairness audit pipeline.
//!
//! Turns an arbitrary CSV into a model-ready dataset:
//!   - CSV parsing and missing-value cleanup
//!   - sensitive attribute and target column inference
//!   - label encoding of the target, one-hot encoding of text features
//!   - seeded down-sampling and train/test splitting
//!   - synthetic datasets for demos

pub mod columns;
pub mod encode;
pub mod matrix;
pub mod split;
pub mod synthetic;
pub mod table;

pub use encode::{prepare, PreparedDataset};
pub use matrix::FeatureMatrix;
pub use split::{train_test_split, TrainTestSplit};
pub use table::{ColumnKind, Table};

//! auditor-common — Shared error types and configuration used across all auditor crates.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{AuditorConfig, DataConfig, MitigationConfig, ServerConfig, SyntheticConfig, TrainingConfig};
pub use error::{AuditorError, Result};

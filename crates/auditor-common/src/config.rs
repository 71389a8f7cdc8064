//! Configuration loading for the auditor.
//! Reads auditor.toml from the current directory or the path in AUDITOR_CONFIG.
//!
//! Every field has a default, so a partial file (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AuditorError, Result};

/// Complete service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditorConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub mitigation: MitigationConfig,

    #[serde(default)]
    pub synthetic: SyntheticConfig,
}

// ── Server ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted upload body in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8000 }
fn default_max_upload_bytes() -> usize { 50 * 1024 * 1024 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

// ── Data ──────────────────────────────────────────────────────────────────────

/// Column inference and cleaning options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Column names (case-insensitive) treated as the sensitive attribute; the first matching header wins
    #[serde(default = "default_sensitive_candidates")]
    pub sensitive_candidates: Vec<String>,

    /// Cell values treated as missing; rows containing one are dropped
    #[serde(default = "default_na_tokens")]
    pub na_tokens: Vec<String>,
}

fn default_sensitive_candidates() -> Vec<String> {
    ["sex", "gender", "race", "ethnicity", "age"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_na_tokens() -> Vec<String> {
    ["", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            sensitive_candidates: default_sensitive_candidates(),
            na_tokens: default_na_tokens(),
        }
    }
}

// ── Training ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Sample count used when a request does not specify one
    #[serde(default = "default_n_samples")]
    pub default_n_samples: usize,

    /// Largest sample count a request may ask for
    #[serde(default = "default_max_n_samples")]
    pub max_n_samples: usize,

    /// Fraction of rows held out for evaluation, in (0, 1)
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Seed for down-sampling an uploaded dataset to the requested size
    #[serde(default = "default_sample_seed")]
    pub sample_seed: u64,

    /// Seed for the train/test shuffle; unseeded when absent
    #[serde(default)]
    pub split_seed: Option<u64>,
}

fn default_n_samples() -> usize { 2000 }
fn default_max_n_samples() -> usize { 100_000 }
fn default_test_size() -> f64 { 0.3 }
fn default_max_depth() -> usize { 5 }
fn default_sample_seed() -> u64 { 42 }

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            default_n_samples: default_n_samples(),
            max_n_samples: default_max_n_samples(),
            test_size: default_test_size(),
            max_depth: default_max_depth(),
            sample_seed: default_sample_seed(),
            split_seed: None,
        }
    }
}

// ── Mitigation ────────────────────────────────────────────────────────────────

/// Exponentiated-gradient parameters for the demographic-parity reduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MitigationConfig {
    /// Allowed constraint violation; the Lagrange multiplier bound is 1/eps
    #[serde(default = "default_eps")]
    pub eps: f64,

    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Initial learning rate (scaled by 1/bound)
    #[serde(default = "default_eta0")]
    pub eta0: f64,

    /// Convergence threshold for the duality gap; derived from the first best response when absent
    #[serde(default)]
    pub nu: Option<f64>,

    /// Seed for the randomized mixture prediction
    #[serde(default)]
    pub seed: Option<u64>,

    /// Also solve the saddle point exactly over the hypotheses found so far
    #[serde(default = "default_true")]
    pub run_linprog_step: bool,
}

fn default_eps() -> f64 { 0.01 }
fn default_max_iter() -> usize { 50 }
fn default_eta0() -> f64 { 2.0 }
fn default_true() -> bool { true }

impl Default for MitigationConfig {
    fn default() -> Self {
        Self {
            eps: default_eps(),
            max_iter: default_max_iter(),
            eta0: default_eta0(),
            nu: None,
            seed: None,
            run_linprog_step: true,
        }
    }
}

// ── Synthetic data ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Seed for the fallback dataset used when nothing was uploaded; fresh data per request when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl AuditorConfig {
    /// Load configuration from auditor.toml.
    /// Checks AUDITOR_CONFIG env var first, then current directory.
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var("AUDITOR_CONFIG")
            .unwrap_or_else(|_| "auditor.toml".to_string());

        if !Path::new(&path).exists() {
            tracing::warn!("Config file not found: {path}, using defaults");
            return Ok(Self::default());
        }

        Self::from_path(&path)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AuditorConfig = toml::from_str(&content)
            .map_err(|e| AuditorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let t = self.training.test_size;
        if !(t > 0.0 && t < 1.0) {
            return Err(AuditorError::Config(format!(
                "training.test_size must be in (0, 1), got {t}"
            )));
        }
        if self.mitigation.eps <= 0.0 {
            return Err(AuditorError::Config(format!(
                "mitigation.eps must be positive, got {}",
                self.mitigation.eps
            )));
        }
        if self.mitigation.max_iter == 0 {
            return Err(AuditorError::Config("mitigation.max_iter must be at least 1".into()));
        }
        let training = &self.training;
        if training.max_n_samples == 0 || training.default_n_samples > training.max_n_samples {
            return Err(AuditorError::Config(format!(
                "training.default_n_samples ({}) must be between 1 and training.max_n_samples ({})",
                training.default_n_samples, training.max_n_samples
            )));
        }
        if training.max_depth == 0 {
            return Err(AuditorError::Config("training.max_depth must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AuditorConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.training.default_n_samples, 2000);
        assert_eq!(config.training.max_depth, 5);
        assert_eq!(config.training.sample_seed, 42);
        assert!((config.training.test_size - 0.3).abs() < 1e-12);
        assert!((config.mitigation.eps - 0.01).abs() < 1e-12);
        assert_eq!(config.mitigation.max_iter, 50);
        assert_eq!(config.data.sensitive_candidates[1], "gender");
        assert!(config.data.na_tokens.contains(&String::new()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9100\n\n[training]\nsplit_seed = 7").unwrap();

        let config = AuditorConfig::from_path(file.path()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.training.split_seed, Some(7));
        assert_eq!(config.training.max_depth, 5);
        assert_eq!(config.mitigation.max_iter, 50);
    }

    #[test]
    fn test_invalid_test_size_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[training]\ntest_size = 1.5").unwrap();

        let err = AuditorConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, AuditorError::Config(_)));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        let err = AuditorConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, AuditorError::Config(_)));
    }

    #[test]
    fn test_zero_max_iter_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mitigation]\nmax_iter = 0").unwrap();

        let err = AuditorConfig::from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_iter"), "{err}");
    }

    #[test]
    fn test_sample_limits() {
        let config = AuditorConfig::default();
        assert_eq!(config.training.max_n_samples, 100_000);
        assert!(config.mitigation.run_linprog_step);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[training]\ndefault_n_samples = 500\nmax_n_samples = 100").unwrap();
        let err = AuditorConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, AuditorError::Config(_)));
    }
}

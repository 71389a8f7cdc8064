//! auditor-compare: train the baseline and mitigated models once and print both reports.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use auditor_common::AuditorConfig;
use auditor_data::synthetic::generate_biased_dataset;
use auditor_data::{prepare, Table};
use auditor_fair::{train_and_evaluate, Comparison, ModelKind};

#[derive(Debug, Parser)]
#[command(name = "auditor-compare")]
#[command(about = "Compare an unconstrained and a demographic-parity model on one dataset")]
#[command(version)]
struct Cli {
    /// CSV file to audit; the synthetic biased dataset is used when omitted
    path: Option<PathBuf>,

    /// Rows to sample (defaults to training.default_n_samples)
    #[arg(short, long)]
    n_samples: Option<usize>,

    /// Configuration file (defaults to $AUDITOR_CONFIG or ./auditor.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the synthetic dataset (overrides synthetic.seed)
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("auditor=info,warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AuditorConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AuditorConfig::load()?,
    };
    let n_samples = cli.n_samples.unwrap_or(config.training.default_n_samples);
    anyhow::ensure!(
        n_samples <= config.training.max_n_samples,
        "--n-samples must be at most {}, got {n_samples}",
        config.training.max_n_samples
    );

    let (dataset, source) = match &cli.path {
        Some(path) => {
            let table = Table::from_path(path).with_context(|| format!("reading {}", path.display()))?;
            (prepare(&table, &config.data)?, "uploaded")
        }
        None => (
            generate_biased_dataset(n_samples, cli.seed.or(config.synthetic.seed))?,
            "synthetic",
        ),
    };

    println!(
        "Dataset: {} ({} rows, sensitive={}, target={})",
        cli.path.as_ref().map_or_else(|| "synthetic".into(), |p| p.display().to_string()),
        dataset.n_rows(),
        dataset.sensitive_column,
        dataset.target_column
    );

    let run = |kind| {
        train_and_evaluate(&dataset, n_samples, kind, &config.training, &config.mitigation)
            .map(|report| report.with_source(source))
    };
    let baseline = run(ModelKind::Baseline)?;
    let mitigated = run(ModelKind::Mitigated)?;
    let comparison = Comparison::between(&baseline, &mitigated);

    println!("{:<10} {:>9} {:>9} {:>12} {:>10}", "model", "accuracy", "bias_gap", "female_rate", "male_rate");
    for r in [&baseline, &mitigated] {
        println!(
            "{:<10} {:>9.4} {:>9.4} {:>12.4} {:>10.4}",
            r.model.to_string(),
            r.accuracy,
            r.bias_gap,
            r.female_rate,
            r.male_rate
        );
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&comparison)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_path_and_options() {
        let cli = Cli::try_parse_from(["auditor-compare", "data.csv", "--n-samples", "500", "--seed", "9"]).unwrap();
        assert_eq!(cli.path, Some(PathBuf::from("data.csv")));
        assert_eq!(cli.n_samples, Some(500));
        assert_eq!(cli.seed, Some(9));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_everything_optional() {
        let cli = Cli::try_parse_from(["auditor-compare"]).unwrap();
        assert!(cli.path.is_none() && cli.n_samples.is_none());
    }

    #[test]
    fn test_rejects_non_numeric_sample_count() {
        assert!(Cli::try_parse_from(["auditor-compare", "-n", "lots"]).is_err());
    }

    #[test]
    fn test_command_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

//! Synthetic datasets.
//!
//! `generate_biased_dataset` is the fallback used for training when nothing
//! has been uploaded. Its labels favour the "Male" group, but the group is
//! drawn independently of every feature, so a model trained on it predicts
//! from features alone and any selection-rate gap it shows is sampling noise.
//! `generate_sample_table` is the downloadable example CSV.

use rand::Rng;

use auditor_common::error::{AuditorError, Result};

use crate::encode::PreparedDataset;
use crate::matrix::FeatureMatrix;
use crate::split::rng_from;
use crate::table::Table;

const FEATURES: [&str; 5] = ["A", "B", "C", "D", "E"];

/// Score boost given to the "Male" group before thresholding.
const GROUP_BOOST: f64 = 0.3;

/// `n` rows of five uniform features; `y = A + B + 0.3·[male] > 1`.
pub fn generate_biased_dataset(n: usize, seed: Option<u64>) -> Result<PreparedDataset> {
    let cells = n
        .checked_mul(FEATURES.len())
        .ok_or_else(|| AuditorError::invalid_data(format!("{n} synthetic rows do not fit in memory")))?;
    let mut rng = rng_from(seed);

    let mut data = Vec::new();
    data.try_reserve_exact(cells)
        .map_err(|e| AuditorError::invalid_data(format!("cannot allocate {n} synthetic rows: {e}")))?;
    let mut labels = Vec::with_capacity(n);
    let mut groups = Vec::with_capacity(n);

    for _ in 0..n {
        let row: [f64; 5] = std::array::from_fn(|_| rng.gen::<f64>());
        let female = rng.gen_range(0..2u8) == 1;
        let score = row[0] + row[1] + if female { 0.0 } else { GROUP_BOOST };

        data.extend_from_slice(&row);
        labels.push(usize::from(score > 1.0));
        groups.push(if female { "Female" } else { "Male" }.to_string());
    }

    Ok(PreparedDataset {
        features: FeatureMatrix::from_parts(n, FEATURES.len(), data),
        feature_names: FEATURES.iter().map(|f| f.to_string()).collect(),
        labels,
        groups,
        sensitive_column: "sex".to_string(),
        target_column: "y".to_string(),
        classes: vec!["0".to_string(), "1".to_string()],
        raw_rows: n,
    })
}

/// Example loan-approval table: age, income, gender, education, approved.
pub fn generate_sample_table(n: usize, seed: u64) -> Result<Table> {
    let mut rng = rng_from(Some(seed));
    let headers = ["age", "income", "gender", "education", "approved"]
        .iter()
        .map(|h| h.to_string())
        .collect();

    let rows = (0..n)
        .map(|_| {
            let age = rng.gen_range(20..70u32);
            let income = if rng.gen_bool(0.4) { "high" } else { "low" };
            let gender = if rng.gen_bool(0.5) { "Male" } else { "Female" };
            let education = ["HS", "Bachelor", "Master"][rng.gen_range(0..3)];
            let approved = rng.gen_range(0..2u8);
            vec![
                age.to_string(),
                income.to_string(),
                gender.to_string(),
                education.to_string(),
                approved.to_string(),
            ]
        })
        .collect();

    Table::new(headers, rows)
}

/// The sample table rendered as CSV text.
pub fn generate_sample_csv(n: usize, seed: u64) -> Result<String> {
    generate_sample_table(n, seed)?.to_csv_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::prepare;
    use auditor_common::DataConfig;

    #[test]
    fn test_biased_dataset_shape() {
        let ds = generate_biased_dataset(200, Some(1)).unwrap();
        assert_eq!(ds.n_rows(), 200);
        assert_eq!(ds.features.shape(), (200, 5));
        assert_eq!(ds.group_names(), vec!["Female", "Male"]);
        assert!(ds.labels.iter().all(|&y| y <= 1));
    }

    #[test]
    fn test_biased_dataset_favours_male_group() {
        let ds = generate_biased_dataset(4000, Some(7)).unwrap();
        let rate = |g: &str| {
            let (pos, total) = ds
                .labels
                .iter()
                .zip(&ds.groups)
                .filter(|(_, grp)| grp.as_str() == g)
                .fold((0, 0), |(p, t), (y, _)| (p + y, t + 1));
            pos as f64 / total as f64
        };
        // P(A+B > 1) = 0.5, P(A+B > 0.7) = 0.755
        assert!(rate("Male") - rate("Female") > 0.15);
    }

    #[test]
    fn test_oversized_request_is_an_error() {
        let err = generate_biased_dataset(usize::MAX, Some(1)).unwrap_err();
        assert!(matches!(err, AuditorError::InvalidData(_)));
    }

    #[test]
    fn test_group_independent_of_features() {
        let ds = generate_biased_dataset(4000, Some(11)).unwrap();
        let mean_a = |g: &str| {
            let rows: Vec<usize> = (0..ds.n_rows()).filter(|&r| ds.groups[r] == g).collect();
            rows.iter().map(|&r| ds.features.get(r, 0)).sum::<f64>() / rows.len() as f64
        };
        assert!((mean_a("Male") - mean_a("Female")).abs() < 0.05);
        assert!(!ds.feature_names.contains(&ds.sensitive_column));
    }

    #[test]
    fn test_labels_follow_formula() {
        let ds = generate_biased_dataset(50, Some(3)).unwrap();
        for row in 0..ds.n_rows() {
            let boost = if ds.groups[row] == "Male" { GROUP_BOOST } else { 0.0 };
            let score = ds.features.get(row, 0) + ds.features.get(row, 1) + boost;
            assert_eq!(ds.labels[row], usize::from(score > 1.0));
        }
    }

    #[test]
    fn test_sample_table_is_deterministic_and_preparable() {
        let a = generate_sample_csv(500, 42).unwrap();
        let b = generate_sample_csv(500, 42).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("age,income,gender,education,approved\n"));

        let table = generate_sample_table(500, 42).unwrap();
        assert_eq!(table.n_rows(), 500);
        let ds = prepare(&table, &DataConfig::default()).unwrap();
        // "age" is the first header that names a sensitive attribute
        assert_eq!(ds.sensitive_column, "age");
        assert!(ds.feature_names.contains(&"gender_Male".to_string()));
        assert_eq!(ds.target_column, "approved");
    }

    #[test]
    fn test_sample_ages_in_range() {
        let table = generate_sample_table(300, 1).unwrap();
        assert!(table
            .column(0)
            .map(|a| a.parse::<u32>().unwrap())
            .all(|a| (20..70).contains(&a)));
    }
}

//! Turn a raw table into a model-ready dataset.
//!
//! Steps: drop rows with missing cells, infer the sensitive and target
//! columns, label-encode the target, one-hot encode text features.
//! The target and sensitive columns never become features.

use std::collections::BTreeSet;

use auditor_common::config::DataConfig;
use auditor_common::error::{AuditorError, Result};

use crate::columns::{detect_sensitive_column, target_column};
use crate::matrix::FeatureMatrix;
use crate::table::{parse_numeric, ColumnKind, Table};

/// Features, binary labels and sensitive group of every row.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub features: FeatureMatrix,
    pub feature_names: Vec<String>,
    /// Class index per row, 0 or 1
    pub labels: Vec<usize>,
    /// Sensitive group label per row
    pub groups: Vec<String>,
    pub sensitive_column: String,
    pub target_column: String,
    /// Original target values, indexed by class
    pub classes: Vec<String>,
    /// Row count of the input before missing values were dropped
    pub raw_rows: usize,
}

impl PreparedDataset {
    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    /// Copy the given rows, in order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select_rows(indices),
            feature_names: self.feature_names.clone(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            groups: indices.iter().map(|&i| self.groups[i].clone()).collect(),
            sensitive_column: self.sensitive_column.clone(),
            target_column: self.target_column.clone(),
            classes: self.classes.clone(),
            raw_rows: self.raw_rows,
        }
    }

    /// Distinct sensitive groups, sorted.
    pub fn group_names(&self) -> Vec<String> {
        self.groups.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect()
    }
}

pub fn prepare(table: &Table, config: &DataConfig) -> Result<PreparedDataset> {
    let raw_rows = table.n_rows();
    let clean = table.drop_missing(&config.na_tokens);
    if clean.n_rows() == 0 {
        return Err(AuditorError::invalid_data(
            "no rows remain after dropping rows with missing values",
        ));
    }

    let sensitive_idx = detect_sensitive_column(&clean, &config.sensitive_candidates)?;
    let target_idx = target_column(&clean)?;

    let (labels, classes) = encode_target(&clean, target_idx)?;
    let groups = encode_groups(&clean, sensitive_idx);

    let mut feature_names = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();
    for idx in 0..clean.n_cols() {
        if idx == target_idx || idx == sensitive_idx {
            continue;
        }
        let name = &clean.headers()[idx];
        match clean.column_kind(idx) {
            ColumnKind::Numeric => {
                feature_names.push(name.clone());
                columns.push(clean.column(idx).filter_map(parse_numeric).collect());
            }
            ColumnKind::Text => {
                for (dummy_name, values) in one_hot(&clean, idx) {
                    feature_names.push(dummy_name);
                    columns.push(values);
                }
            }
        }
    }

    if columns.is_empty() {
        return Err(AuditorError::invalid_data(
            "no feature columns remain once the target and sensitive columns are removed",
        ));
    }

    let features = FeatureMatrix::from_columns(clean.n_rows(), &columns)
        .ok_or_else(|| AuditorError::invalid_data("feature columns have inconsistent lengths"))?;

    let sensitive_column = clean.headers()[sensitive_idx].clone();
    let target_column = clean.headers()[target_idx].clone();
    tracing::info!(
        rows = clean.n_rows(),
        raw_rows,
        features = feature_names.len(),
        sensitive = %sensitive_column,
        target = %target_column,
        "dataset prepared"
    );

    Ok(PreparedDataset {
        features,
        feature_names,
        labels,
        groups,
        sensitive_column,
        target_column,
        classes,
        raw_rows,
    })
}

/// Map target values to class indices 0..k.
///
/// Numeric targets that are already 0/1 keep their values; anything else is
/// label-encoded in sorted order (numeric order for numeric targets).
fn encode_target(table: &Table, idx: usize) -> Result<(Vec<usize>, Vec<String>)> {
    let classes: Vec<String> = match table.column_kind(idx) {
        ColumnKind::Numeric => {
            let mut values: Vec<f64> = table.column(idx).filter_map(parse_numeric).collect();
            values.sort_by(|a, b| a.total_cmp(b));
            values.dedup();
            if values.iter().all(|v| *v == 0.0 || *v == 1.0) {
                vec!["0".to_string(), "1".to_string()]
            } else {
                values.iter().map(|v| format_number(*v)).collect()
            }
        }
        ColumnKind::Text => table
            .column(idx)
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    if classes.len() > 2 {
        return Err(AuditorError::invalid_data(format!(
            "target column '{}' has {} classes; only binary targets are supported",
            table.headers()[idx],
            classes.len()
        )));
    }

    let numeric = table.column_kind(idx) == ColumnKind::Numeric;
    let labels = table
        .column(idx)
        .map(|cell| {
            let key = if numeric {
                parse_numeric(cell).map(format_number).unwrap_or_default()
            } else {
                cell.to_string()
            };
            classes.iter().position(|c| *c == key).unwrap_or(0)
        })
        .collect();

    Ok((labels, classes))
}

/// Sensitive group labels; integral numbers are normalised so "1.0" and "1" agree.
fn encode_groups(table: &Table, idx: usize) -> Vec<String> {
    match table.column_kind(idx) {
        ColumnKind::Numeric => table
            .column(idx)
            .map(|cell| parse_numeric(cell).map(format_number).unwrap_or_else(|| cell.to_string()))
            .collect(),
        ColumnKind::Text => table.column(idx).map(str::to_string).collect(),
    }
}

/// One indicator column per distinct value, named `{column}_{value}`, values sorted.
fn one_hot(table: &Table, idx: usize) -> Vec<(String, Vec<f64>)> {
    let name = &table.headers()[idx];
    let values: BTreeSet<&str> = table.column(idx).collect();
    values
        .into_iter()
        .map(|value| {
            let indicator = table
                .column(idx)
                .map(|cell| if cell == value { 1.0 } else { 0.0 })
                .collect();
            (format!("{name}_{value}"), indicator)
        })
        .collect()
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prep(csv: &str) -> Result<PreparedDataset> {
        let table = Table::from_csv_bytes(csv.as_bytes()).unwrap();
        prepare(&table, &DataConfig::default())
    }

    #[test]
    fn test_excludes_target_and_sensitive() {
        let ds = prep("gender,age,income,education,approved\n\
                       Male,25,low,HS,0\n\
                       Female,40,high,Master,1\n\
                       Female,33,low,Bachelor,1\n")
        .unwrap();

        assert_eq!(ds.sensitive_column, "gender");
        assert_eq!(ds.target_column, "approved");
        assert!(!ds.feature_names.iter().any(|f| f == "gender" || f.starts_with("gender_")));
        assert!(!ds.feature_names.iter().any(|f| f.starts_with("approved")));
        assert_eq!(
            ds.feature_names,
            vec![
                "age",
                "income_high",
                "income_low",
                "education_Bachelor",
                "education_HS",
                "education_Master"
            ]
        );
        assert_eq!(ds.features.row(1), &[40.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(ds.labels, vec![0, 1, 1]);
        assert_eq!(ds.groups, vec!["Male", "Female", "Female"]);
    }

    #[test]
    fn test_numeric_sensitive_column_groups_by_value() {
        let ds = prep("age,gender,approved\n30,Male,0\n41,Female,1\n30,Female,1\n").unwrap();
        assert_eq!(ds.sensitive_column, "age");
        assert_eq!(ds.feature_names, vec!["gender_Female", "gender_Male"]);
        assert_eq!(ds.group_names(), vec!["30", "41"]);
    }

    #[test]
    fn test_text_target_label_encoded() {
        let ds = prep("x,sex,outcome\n1,M,Yes\n2,F,No\n3,F,Yes\n").unwrap();
        assert_eq!(ds.classes, vec!["No", "Yes"]);
        assert_eq!(ds.labels, vec![1, 0, 1]);
    }

    #[test]
    fn test_numeric_non_binary_target_encoded_by_value() {
        let ds = prep("x,sex,grade\n1,M,10\n2,F,2\n3,F,10\n").unwrap();
        assert_eq!(ds.classes, vec!["2", "10"]);
        assert_eq!(ds.labels, vec![1, 0, 1]);
    }

    #[test]
    fn test_multiclass_target_rejected() {
        let err = prep("x,sex,y\n1,M,a\n2,F,b\n3,F,c\n").unwrap_err();
        assert!(matches!(err, AuditorError::InvalidData(_)));
    }

    #[test]
    fn test_missing_rows_dropped_but_raw_count_kept() {
        let ds = prep("x,sex,y\n1,M,0\n,F,1\n3,F,1\n").unwrap();
        assert_eq!(ds.raw_rows, 3);
        assert_eq!(ds.n_rows(), 2);
    }

    #[test]
    fn test_numeric_groups_normalised() {
        let ds = prep("x,sex,y\n1,1.0,0\n2,0,1\n").unwrap();
        assert_eq!(ds.groups, vec!["1", "0"]);
        assert_eq!(ds.group_names(), vec!["0", "1"]);
    }

    #[test]
    fn test_no_features_rejected() {
        let err = prep("gender,y\nMale,0\nFemale,1\n").unwrap_err();
        assert!(matches!(err, AuditorError::InvalidData(_)));
    }

    #[test]
    fn test_all_rows_missing_rejected() {
        let err = prep("x,gender,y\nNA,Male,0\n").unwrap_err();
        assert!(matches!(err, AuditorError::InvalidData(_)));
    }
}

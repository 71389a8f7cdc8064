//! Dense row-major feature matrix.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    n_rows: usize,
    n_cols: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    /// Build from row-major data. Returns None when the length does not match the shape.
    pub fn from_vec(n_rows: usize, n_cols: usize, data: Vec<f64>) -> Option<Self> {
        (data.len() == n_rows * n_cols).then_some(Self { n_rows, n_cols, data })
    }

    /// Caller guarantees `data.len() == n_rows * n_cols`.
    pub(crate) fn from_parts(n_rows: usize, n_cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), n_rows * n_cols);
        Self { n_rows, n_cols, data }
    }

    /// Build from equally sized columns.
    pub fn from_columns(n_rows: usize, columns: &[Vec<f64>]) -> Option<Self> {
        if columns.iter().any(|c| c.len() != n_rows) {
            return None;
        }
        let n_cols = columns.len();
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in 0..n_rows {
            for col in columns {
                data.push(col[row]);
            }
        }
        Some(Self { n_rows, n_cols, data })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.n_cols;
        &self.data[start..start + self.n_cols]
    }

    /// Copy the given rows, in the given order, into a new matrix.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.n_cols);
        for &idx in indices {
            data.extend_from_slice(self.row(idx));
        }
        Self { n_rows: indices.len(), n_cols: self.n_cols, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_columns_is_row_major() {
        let m = FeatureMatrix::from_columns(2, &[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m.row(0), &[1.0, 3.0]);
        assert_eq!(m.row(1), &[2.0, 4.0]);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        assert!(FeatureMatrix::from_vec(2, 2, vec![1.0, 2.0, 3.0]).is_none());
        assert!(FeatureMatrix::from_columns(2, &[vec![1.0], vec![1.0, 2.0]]).is_none());
    }

    #[test]
    fn test_select_rows() {
        let m = FeatureMatrix::from_vec(3, 1, vec![10.0, 20.0, 30.0]).unwrap();
        let s = m.select_rows(&[2, 0]);
        assert_eq!(s.n_rows(), 2);
        assert_eq!(s.get(0, 0), 30.0);
        assert_eq!(s.get(1, 0), 10.0);
    }
}

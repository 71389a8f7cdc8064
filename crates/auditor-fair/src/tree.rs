//! CART decision tree classifier with sample weights.
//!
//! Splits minimise weighted Gini impurity. Thresholds sit at the midpoint
//! between adjacent distinct values; samples with `value <= threshold` go left.

use serde::{Deserialize, Serialize};

use auditor_common::error::{AuditorError, Result};
use auditor_data::FeatureMatrix;

/// Gains at or below this are treated as no improvement.
const MIN_GAIN: f64 = 1e-12;

/// Internal node with a split condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub feature_idx: usize,
    pub threshold: f64,
    pub left: Box<TreeNode>,
    pub right: Box<TreeNode>,
}

/// Leaf with the predicted class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaf {
    pub class_label: usize,
    pub n_samples: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Node(Node),
    Leaf(Leaf),
}

impl TreeNode {
    /// Leaf nodes have depth 0, internal nodes 1 + max(left, right).
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf(_) => 0,
            TreeNode::Node(node) => 1 + node.left.depth().max(node.right.depth()),
        }
    }

    fn predict_row(&self, row: &[f64]) -> usize {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf(leaf) => return leaf.class_label,
                TreeNode::Node(n) => {
                    node = if row[n.feature_idx] <= n.threshold { &n.left } else { &n.right };
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    max_depth: Option<usize>,
    min_samples_split: usize,
    n_features: usize,
    root: Option<TreeNode>,
}

impl Default for DecisionTreeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeClassifier {
    pub fn new() -> Self {
        Self { max_depth: None, min_samples_split: 2, n_features: 0, root: None }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split.max(2);
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    /// Fit on class labels with optional non-negative sample weights (unit weights when absent).
    pub fn fit(&mut self, x: &FeatureMatrix, y: &[usize], sample_weight: Option<&[f64]>) -> Result<()> {
        let n = x.n_rows();
        if n == 0 {
            return Err(AuditorError::training("cannot fit a tree on zero samples"));
        }
        if y.len() != n {
            return Err(AuditorError::training(format!(
                "X has {n} rows but y has {} labels",
                y.len()
            )));
        }
        let weights: Vec<f64> = match sample_weight {
            Some(w) if w.len() != n => {
                return Err(AuditorError::training(format!(
                    "X has {n} rows but {} sample weights were given",
                    w.len()
                )))
            }
            Some(w) if w.iter().any(|v| !v.is_finite() || *v < 0.0) => {
                return Err(AuditorError::training("sample weights must be finite and non-negative"))
            }
            Some(w) => w.to_vec(),
            None => vec![1.0; n],
        };

        let n_classes = y.iter().copied().max().unwrap_or(0) + 1;
        let builder = Builder {
            x,
            y,
            weights: &weights,
            n_classes,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
        };
        let indices: Vec<usize> = (0..n).collect();
        let root = builder.build(indices, 0);

        self.n_features = x.n_cols();
        self.root = Some(root);
        Ok(())
    }

    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<usize>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| AuditorError::training("tree has not been fitted"))?;
        if x.n_cols() != self.n_features {
            return Err(AuditorError::training(format!(
                "tree was fitted on {} features but X has {}",
                self.n_features,
                x.n_cols()
            )));
        }
        Ok((0..x.n_rows()).map(|r| root.predict_row(x.row(r))).collect())
    }
}

struct Builder<'a> {
    x: &'a FeatureMatrix,
    y: &'a [usize],
    weights: &'a [f64],
    n_classes: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
}

struct Split {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

impl Builder<'_> {
    fn class_weights(&self, indices: &[usize]) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_classes];
        for &i in indices {
            totals[self.y[i]] += self.weights[i];
        }
        totals
    }

    fn leaf(&self, indices: &[usize], totals: &[f64]) -> TreeNode {
        TreeNode::Leaf(Leaf {
            class_label: self.majority_class(indices, totals),
            n_samples: indices.len(),
            weight: totals.iter().sum(),
        })
    }

    /// Weighted majority; ties go to the lower class. Falls back to counts when all weights are zero.
    fn majority_class(&self, indices: &[usize], totals: &[f64]) -> usize {
        let sum: f64 = totals.iter().sum();
        let scores: Vec<f64> = if sum > 0.0 {
            totals.to_vec()
        } else {
            let mut counts = vec![0.0; self.n_classes];
            for &i in indices {
                counts[self.y[i]] += 1.0;
            }
            counts
        };
        let mut best = 0;
        for (class, &score) in scores.iter().enumerate() {
            if score > scores[best] {
                best = class;
            }
        }
        best
    }

    fn build(&self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let totals = self.class_weights(&indices);
        let total_weight: f64 = totals.iter().sum();

        let at_max_depth = self.max_depth.is_some_and(|d| depth >= d);
        if at_max_depth
            || indices.len() < self.min_samples_split
            || total_weight <= 0.0
            || gini(&totals, total_weight) <= MIN_GAIN
        {
            return self.leaf(&indices, &totals);
        }

        let Some(split) = self.best_split(&indices, &totals, total_weight) else {
            return self.leaf(&indices, &totals);
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| self.x.get(i, split.feature_idx) <= split.threshold);
        if left.is_empty() || right.is_empty() {
            return self.leaf(&indices, &totals);
        }

        tracing::trace!(depth, feature = split.feature_idx, threshold = split.threshold, gain = split.gain, "split");
        TreeNode::Node(Node {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        })
    }

    fn best_split(&self, indices: &[usize], totals: &[f64], total_weight: f64) -> Option<Split> {
        let parent_impurity = gini(totals, total_weight);
        let mut best: Option<Split> = None;
        let mut order = indices.to_vec();

        for feature_idx in 0..self.x.n_cols() {
            order.sort_by(|&a, &b| self.x.get(a, feature_idx).total_cmp(&self.x.get(b, feature_idx)));

            let mut left = vec![0.0; self.n_classes];
            let mut left_weight = 0.0;
            for pos in 0..order.len() - 1 {
                let i = order[pos];
                left[self.y[i]] += self.weights[i];
                left_weight += self.weights[i];

                let here = self.x.get(i, feature_idx);
                let next = self.x.get(order[pos + 1], feature_idx);
                if next <= here {
                    continue;
                }

                let right_weight = total_weight - left_weight;
                if left_weight <= 0.0 || right_weight <= 0.0 {
                    continue;
                }
                let right_gini = 1.0
                    - totals
                        .iter()
                        .zip(&left)
                        .map(|(t, l)| ((t - l) / right_weight).powi(2))
                        .sum::<f64>();
                let child_impurity =
                    (left_weight * gini(&left, left_weight) + right_weight * right_gini) / total_weight;
                let gain = parent_impurity - child_impurity;

                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = here + (next - here) / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some(Split { feature_idx, threshold, gain });
                }
            }
        }

        best
    }
}

/// Weighted Gini impurity: 1 - Σ(p_i²).
fn gini(class_weights: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - class_weights.iter().map(|w| (w / total).powi(2)).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[f64]]) -> FeatureMatrix {
        let n_cols = rows[0].len();
        FeatureMatrix::from_vec(rows.len(), n_cols, rows.iter().flat_map(|r| r.iter().copied()).collect())
            .unwrap()
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[4.0, 0.0], 4.0), 0.0);
        assert!((gini(&[2.0, 2.0], 4.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fits_threshold_rule() {
        let x = matrix(&[&[1.0], &[2.0], &[3.0], &[10.0], &[11.0], &[12.0]]);
        let y = [0, 0, 0, 1, 1, 1];
        let mut tree = DecisionTreeClassifier::new().with_max_depth(5);
        tree.fit(&x, &y, None).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y.to_vec());
        assert_eq!(tree.depth(), 1);

        let queries = matrix(&[&[6.4], &[6.6]]);
        assert_eq!(tree.predict(&queries).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_xor_needs_depth_two() {
        let x = matrix(&[&[0.0, 0.0], &[0.0, 1.0], &[1.0, 0.0], &[1.0, 1.0]]);
        let y = [0, 1, 1, 0];

        let mut stump = DecisionTreeClassifier::new().with_max_depth(1);
        stump.fit(&x, &y, None).unwrap();
        // no single split reduces impurity, so the root stays a leaf
        assert_eq!(stump.depth(), 0);
    }

    #[test]
    fn test_max_depth_respected() {
        let rows: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        let x = matrix(&refs);
        let y: Vec<usize> = (0..64).map(|i| i % 2).collect();

        let mut tree = DecisionTreeClassifier::new().with_max_depth(3);
        tree.fit(&x, &y, None).unwrap();
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_weights_change_the_leaf_vote() {
        let x = matrix(&[&[1.0], &[1.0], &[1.0]]);
        let y = [0, 0, 1];

        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y, None).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), vec![0, 0, 0]);

        tree.fit(&x, &y, Some(&[1.0, 1.0, 5.0])).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), vec![1, 1, 1]);
    }

    #[test]
    fn test_zero_weight_samples_ignored_by_split() {
        let x = matrix(&[&[1.0], &[2.0], &[3.0], &[4.0]]);
        let y = [0, 1, 0, 1];
        let mut tree = DecisionTreeClassifier::new().with_max_depth(3);
        tree.fit(&x, &y, Some(&[1.0, 0.0, 1.0, 0.0])).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_single_class() {
        let x = matrix(&[&[1.0], &[2.0]]);
        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &[1, 1], None).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_errors() {
        let x = matrix(&[&[1.0], &[2.0]]);
        let mut tree = DecisionTreeClassifier::new();
        assert!(tree.predict(&x).is_err());
        assert!(tree.fit(&x, &[0], None).is_err());
        assert!(tree.fit(&x, &[0, 1], Some(&[1.0, -1.0])).is_err());

        tree.fit(&x, &[0, 1], None).unwrap();
        let wide = matrix(&[&[1.0, 2.0]]);
        assert!(tree.predict(&wide).is_err());
    }
}

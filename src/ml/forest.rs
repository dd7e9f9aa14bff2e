//! Random forest exported as flat per-tree node arrays.
//!
//! Node `i` is a leaf when `children_left[i] == -1`; otherwise samples with
//! `x[feature[i]] <= threshold[i]` go left. Leaf `value` rows hold class counts or
//! fractions and are normalized before averaging across trees.

use serde::{Deserialize, Serialize};

const LEAF: i64 = -1;

/// A single fitted decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Shape: `[n_nodes][n_classes]`.
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        let nodes = self.children_left.len();
        if nodes == 0 {
            return Err("tree has no nodes".to_string());
        }
        if self.children_right.len() != nodes
            || self.feature.len() != nodes
            || self.threshold.len() != nodes
            || self.value.len() != nodes
        {
            return Err("node arrays have different lengths".to_string());
        }
        for node in 0..nodes {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == LEAF {
                if right != LEAF {
                    return Err(format!("node {node} has only a right child"));
                }
                let row = &self.value[node];
                if row.len() != n_classes {
                    return Err(format!(
                        "leaf {node} has {} class values, expected {n_classes}",
                        row.len()
                    ));
                }
                if row.iter().any(|v| !v.is_finite() || *v < 0.0) || row.iter().sum::<f64>() <= 0.0
                {
                    return Err(format!("leaf {node} has no usable class weights"));
                }
                continue;
            }
            // Children always follow their parent, so traversal cannot cycle.
            for child in [left, right] {
                if child <= node as i64 || child as usize >= nodes {
                    return Err(format!("node {node} has out-of-order child {child}"));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!("node {node} splits on unknown feature {feature}"));
            }
            if self.threshold[node].is_nan() {
                return Err(format!("node {node} has a NaN threshold"));
            }
        }
        Ok(())
    }

    fn leaf_for(&self, features: &[f32]) -> usize {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            let value = features[self.feature[node] as usize] as f64;
            node = if value <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        node
    }
}

/// Averaging ensemble of decision trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub n_classes: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Validate structural invariants of every tree.
    pub fn validate(&self) -> Result<(), String> {
        if self.n_features == 0 {
            return Err("n_features must be > 0".to_string());
        }
        if self.n_classes < 2 {
            return Err("forest must have at least 2 classes".to_string());
        }
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.n_classes)
                .map_err(|err| format!("tree {idx}: {err}"))?;
        }
        Ok(())
    }

    /// Mean of the per-tree leaf class distributions. `None` on a length mismatch.
    pub fn predict_proba(&self, features: &[f32]) -> Option<Vec<f32>> {
        if features.len() != self.n_features {
            return None;
        }
        let mut totals = vec![0.0_f64; self.n_classes];
        for tree in &self.trees {
            let row = &tree.value[tree.leaf_for(features)];
            let sum: f64 = row.iter().sum();
            for (total, v) in totals.iter_mut().zip(row) {
                *total += v / sum;
            }
        }
        let trees = self.trees.len() as f64;
        Some(totals.into_iter().map(|t| (t / trees) as f32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(threshold: f64, left: [f64; 2], right: [f64; 2]) -> DecisionTree {
        DecisionTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![0, -2, -2],
            threshold: vec![threshold, -2.0, -2.0],
            value: vec![vec![1.0, 1.0], left.to_vec(), right.to_vec()],
        }
    }

    fn forest() -> RandomForest {
        RandomForest {
            n_features: 1,
            n_classes: 2,
            trees: vec![stump(0.0, [3.0, 1.0], [0.0, 2.0]), stump(1.0, [1.0, 0.0], [0.0, 1.0])],
        }
    }

    #[test]
    fn threshold_is_inclusive_on_the_left() {
        let forest = forest();
        forest.validate().unwrap();
        assert_eq!(forest.predict_proba(&[0.0]), Some(vec![0.875, 0.125]));
        assert_eq!(forest.predict_proba(&[0.5]), Some(vec![0.5, 0.5]));
        assert_eq!(forest.predict_proba(&[2.0]), Some(vec![0.0, 1.0]));
    }

    #[test]
    fn wrong_width_yields_none() {
        assert_eq!(forest().predict_proba(&[0.0, 1.0]), None);
    }

    #[test]
    fn backwards_child_links_are_rejected() {
        let mut forest = forest();
        forest.trees[0].children_left[0] = 0;
        assert!(forest.validate().unwrap_err().contains("out-of-order"));
    }

    #[test]
    fn unknown_split_feature_is_rejected() {
        let mut forest = forest();
        forest.trees[1].feature[0] = 4;
        assert!(forest.validate().is_err());
    }
}

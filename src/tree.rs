//! CART regression trees and random forests.
//!
//! Trees split on the MSE criterion with midpoint thresholds over unique
//! feature values; leaves predict the mean of their training targets. The
//! forest averages trees trained on bootstrap samples, with a fixed random
//! state giving bit-identical models across runs.

use crate::error::Result;
use crate::primitives::{Matrix, Vector};
use serde::{Deserialize, Serialize};

/// Leaf node holding the mean target of the samples that reached it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionLeaf {
    /// Predicted value (mean of y values).
    pub value: f32,
    /// Number of training samples in this leaf.
    pub n_samples: usize,
}

/// Internal node with a split condition and two subtrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionNode {
    /// Index of the feature to split on.
    pub feature_idx: usize,
    /// Threshold value for the split.
    pub threshold: f32,
    /// Samples where feature <= threshold.
    pub left: Box<RegressionTreeNode>,
    /// Samples where feature > threshold.
    pub right: Box<RegressionTreeNode>,
}

/// A node in a regression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegressionTreeNode {
    /// Internal decision node.
    Node(RegressionNode),
    /// Leaf with a value prediction.
    Leaf(RegressionLeaf),
}

impl RegressionTreeNode {
    /// Returns the depth of the tree rooted at this node.
    ///
    /// Leaves have depth 0, internal nodes 1 + max(left, right).
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            RegressionTreeNode::Leaf(_) => 0,
            RegressionTreeNode::Node(node) => 1 + node.left.depth().max(node.right.depth()),
        }
    }
}

/// Decision tree regressor using the CART algorithm.
///
/// Uses Mean Squared Error for the splitting criterion; leaves predict the
/// mean of their target values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    tree: Option<RegressionTreeNode>,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
}

impl DecisionTreeRegressor {
    /// Creates a regressor with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    /// Sets the maximum depth of the tree.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets the minimum number of samples required to split a node (>= 2).
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Sets the minimum number of samples required at a leaf (>= 1).
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Fits the tree to training data.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` and `y` disagree on sample count or are empty.
    pub fn fit(&mut self, x: &Matrix, y: &Vector) -> Result<()> {
        let (n_rows, _) = x.shape();
        if n_rows != y.len() {
            return Err("Number of samples in X and y must match".into());
        }
        if n_rows == 0 {
            return Err("Cannot fit with zero samples".into());
        }

        self.tree = Some(build_regression_tree(
            x,
            y,
            0,
            self.max_depth,
            self.min_samples_split,
            self.min_samples_leaf,
        ));
        Ok(())
    }

    /// Predicts target values for each row of `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if called before `fit`.
    pub fn predict(&self, x: &Matrix) -> Result<Vector> {
        let tree = self
            .tree
            .as_ref()
            .ok_or("Cannot predict with an unfitted tree. Call fit() first.")?;

        let (n_samples, n_features) = x.shape();
        let mut predictions = Vec::with_capacity(n_samples);
        for row in 0..n_samples {
            let mut sample = Vec::with_capacity(n_features);
            for col in 0..n_features {
                sample.push(x.get(row, col));
            }
            predictions.push(predict_one(tree, &sample));
        }
        Ok(Vector::from_vec(predictions))
    }

    /// Returns the fitted tree root, if any.
    #[must_use]
    pub fn root(&self) -> Option<&RegressionTreeNode> {
        self.tree.as_ref()
    }
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

fn predict_one(tree: &RegressionTreeNode, x: &[f32]) -> f32 {
    let mut node = tree;
    loop {
        match node {
            RegressionTreeNode::Leaf(leaf) => return leaf.value,
            RegressionTreeNode::Node(internal) => {
                if x[internal.feature_idx] <= internal.threshold {
                    node = &internal.left;
                } else {
                    node = &internal.right;
                }
            }
        }
    }
}

/// Random forest regressor.
///
/// Ensemble of decision tree regressors trained on bootstrap samples;
/// predictions are averaged across trees.
///
/// # Examples
///
/// ```
/// use cosecha::tree::RandomForestRegressor;
/// use cosecha::primitives::{Matrix, Vector};
///
/// let x = Matrix::from_vec(5, 1, vec![1.0, 2.0, 3.0, 4.0, 5.0]).expect("matrix");
/// let y = Vector::from_slice(&[2.0, 4.0, 6.0, 8.0, 10.0]);
///
/// let mut rf = RandomForestRegressor::new(10).with_random_state(42);
/// rf.fit(&x, &y).expect("fit");
/// let predictions = rf.predict(&x).expect("predict");
/// assert_eq!(predictions.len(), 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<DecisionTreeRegressor>,
    n_estimators: usize,
    max_depth: Option<usize>,
    random_state: Option<u64>,
    n_features: usize,
}

impl RandomForestRegressor {
    /// Creates a forest of `n_estimators` trees.
    #[must_use]
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            random_state: None,
            n_features: 0,
        }
    }

    /// Sets the maximum depth for each tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Sets the random state for reproducible bootstrap sampling.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Returns the number of features the forest was fitted on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Fits the forest, one tree per bootstrap sample.
    ///
    /// Tree `i` draws its sample with seed `random_state + i`, so a fixed
    /// random state makes the whole forest reproducible.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` and `y` disagree on sample count or are empty.
    pub fn fit(&mut self, x: &Matrix, y: &Vector) -> Result<()> {
        let (n_samples, n_features) = x.shape();
        if n_samples != y.len() {
            return Err("Number of samples in X and y must match".into());
        }
        if n_samples == 0 {
            return Err("Cannot fit with zero samples".into());
        }

        self.trees = Vec::with_capacity(self.n_estimators);
        self.n_features = n_features;

        for i in 0..self.n_estimators {
            let seed = self.random_state.map(|s| s + i as u64);
            let bootstrap_indices = bootstrap_sample(n_samples, seed);

            let mut bootstrap_x_data = Vec::with_capacity(n_samples * n_features);
            let mut bootstrap_y_data = Vec::with_capacity(n_samples);
            for &idx in &bootstrap_indices {
                for j in 0..n_features {
                    bootstrap_x_data.push(x.get(idx, j));
                }
                bootstrap_y_data.push(y.as_slice()[idx]);
            }
            let bootstrap_x = Matrix::from_vec(n_samples, n_features, bootstrap_x_data)
                .map_err(|_| "Failed to create bootstrap matrix")?;
            let bootstrap_y = Vector::from_vec(bootstrap_y_data);

            let mut tree = if let Some(max_depth) = self.max_depth {
                DecisionTreeRegressor::new().with_max_depth(max_depth)
            } else {
                DecisionTreeRegressor::new()
            };
            tree.fit(&bootstrap_x, &bootstrap_y)?;
            self.trees.push(tree);
        }

        Ok(())
    }

    /// Predicts by averaging over all trees.
    ///
    /// # Errors
    ///
    /// Returns an error if called before `fit` or if the feature count of
    /// `x` does not match training.
    pub fn predict(&self, x: &Matrix) -> Result<Vector> {
        if self.trees.is_empty() {
            return Err("Cannot predict with an unfitted Random Forest. Call fit() first.".into());
        }
        let (n_samples, n_features) = x.shape();
        if n_features != self.n_features {
            return Err(crate::error::CosechaError::DimensionMismatch {
                expected: format!("{} features", self.n_features),
                actual: format!("{n_features} features"),
            });
        }

        let mut predictions = vec![0.0; n_samples];
        for tree in &self.trees {
            let tree_preds = tree.predict(x)?;
            for (pred, &tree_pred) in predictions.iter_mut().zip(tree_preds.as_slice().iter()) {
                *pred += tree_pred;
            }
        }
        let n_trees = self.trees.len() as f32;
        for pred in &mut predictions {
            *pred /= n_trees;
        }
        Ok(Vector::from_vec(predictions))
    }

    /// Returns feature importances, normalized to sum to 1.0.
    ///
    /// Importance is the number of samples routed through each split node,
    /// accumulated per feature and averaged over trees. `None` before fit.
    #[must_use]
    pub fn feature_importances(&self) -> Option<Vec<f32>> {
        if self.trees.is_empty() {
            return None;
        }

        let mut total_importances = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(root) = tree.root() {
                let mut tree_importances = vec![0.0; self.n_features];
                accumulate_importances(root, &mut tree_importances);
                for (total, importance) in total_importances.iter_mut().zip(&tree_importances) {
                    *total += importance;
                }
            }
        }

        let n_trees = self.trees.len() as f32;
        for importance in &mut total_importances {
            *importance /= n_trees;
        }
        let total_sum: f32 = total_importances.iter().sum();
        if total_sum > 0.0 {
            for importance in &mut total_importances {
                *importance /= total_sum;
            }
        }
        Some(total_importances)
    }
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Draw `n_samples` indices with replacement.
fn bootstrap_sample(n_samples: usize, random_state: Option<u64>) -> Vec<usize> {
    use rand::distributions::{Distribution, Uniform};
    use rand::SeedableRng;

    let dist = Uniform::from(0..n_samples);
    let mut indices = Vec::with_capacity(n_samples);

    if let Some(seed) = random_state {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        for _ in 0..n_samples {
            indices.push(dist.sample(&mut rng));
        }
    } else {
        let mut rng = rand::thread_rng();
        for _ in 0..n_samples {
            indices.push(dist.sample(&mut rng));
        }
    }
    indices
}

fn mean_f32(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

fn variance_f32(y: &[f32]) -> f32 {
    if y.len() <= 1 {
        return 0.0;
    }
    let mean = mean_f32(y);
    let sum_squared_diff: f32 = y.iter().map(|&val| (val - mean).powi(2)).sum();
    sum_squared_diff / y.len() as f32
}

/// Weighted MSE of a candidate split.
fn split_mse(y_left: &[f32], y_right: &[f32]) -> f32 {
    let n_left = y_left.len() as f32;
    let n_right = y_right.len() as f32;
    let n_total = n_left + n_right;
    if n_total == 0.0 {
        return 0.0;
    }
    (n_left / n_total) * variance_f32(y_left) + (n_right / n_total) * variance_f32(y_right)
}

fn unique_feature_values(x: &Matrix, feature_idx: usize, n_samples: usize) -> Vec<f32> {
    let mut values: Vec<f32> = (0..n_samples).map(|i| x.get(i, feature_idx)).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    values
}

fn split_by_threshold(x: &Matrix, y: &[f32], feature_idx: usize, threshold: f32) -> (Vec<f32>, Vec<f32>) {
    let mut y_left = Vec::new();
    let mut y_right = Vec::new();
    for (row, &y_val) in y.iter().enumerate() {
        if x.get(row, feature_idx) <= threshold {
            y_left.push(y_val);
        } else {
            y_right.push(y_val);
        }
    }
    (y_left, y_right)
}

fn split_gain(y_left: &[f32], y_right: &[f32], current_variance: f32) -> Option<f32> {
    if y_left.is_empty() || y_right.is_empty() {
        return None;
    }
    let gain = current_variance - split_mse(y_left, y_right);
    (gain > 0.0).then_some(gain)
}

/// Best (threshold, gain) for one feature, if any split improves on the
/// current variance.
fn best_split_for_feature(
    x: &Matrix,
    y: &[f32],
    feature_idx: usize,
    n_samples: usize,
    current_variance: f32,
) -> Option<(f32, f32)> {
    let feature_values = unique_feature_values(x, feature_idx, n_samples);
    let mut best_threshold = 0.0;
    let mut best_gain = 0.0;

    for i in 0..feature_values.len().saturating_sub(1) {
        let threshold = (feature_values[i] + feature_values[i + 1]) / 2.0;
        let (y_left, y_right) = split_by_threshold(x, y, feature_idx, threshold);
        if let Some(gain) = split_gain(&y_left, &y_right, current_variance) {
            if gain > best_gain {
                best_gain = gain;
                best_threshold = threshold;
            }
        }
    }
    (best_gain > 0.0).then_some((best_threshold, best_gain))
}

/// Best (feature_idx, threshold, gain) over all features.
fn best_split(x: &Matrix, y: &[f32]) -> Option<(usize, f32, f32)> {
    let (n_samples, n_features) = x.shape();
    if n_samples < 2 {
        return None;
    }

    let current_variance = variance_f32(y);
    let mut best_gain = 0.0;
    let mut best_feature = 0;
    let mut best_threshold = 0.0;

    for feature_idx in 0..n_features {
        if let Some((threshold, gain)) =
            best_split_for_feature(x, y, feature_idx, n_samples, current_variance)
        {
            if gain > best_gain {
                best_gain = gain;
                best_feature = feature_idx;
                best_threshold = threshold;
            }
        }
    }
    (best_gain > 0.0).then_some((best_feature, best_threshold, best_gain))
}

fn partition_by_threshold(
    x: &Matrix,
    n_samples: usize,
    feature_idx: usize,
    threshold: f32,
) -> (Vec<usize>, Vec<usize>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for row in 0..n_samples {
        if x.get(row, feature_idx) <= threshold {
            left.push(row);
        } else {
            right.push(row);
        }
    }
    (left, right)
}

fn subset_by_indices(x: &Matrix, y: &[f32], indices: &[usize]) -> (Matrix, Vec<f32>) {
    let (_, n_features) = x.shape();
    let mut subset_data = Vec::with_capacity(indices.len() * n_features);
    let mut subset_labels = Vec::with_capacity(indices.len());
    for &idx in indices {
        for col in 0..n_features {
            subset_data.push(x.get(idx, col));
        }
        subset_labels.push(y[idx]);
    }
    let subset = Matrix::from_vec(indices.len(), n_features, subset_data)
        .unwrap_or_else(|_| Matrix::zeros(0, n_features));
    (subset, subset_labels)
}

fn make_leaf(y_slice: &[f32], n_samples: usize) -> RegressionTreeNode {
    RegressionTreeNode::Leaf(RegressionLeaf {
        value: mean_f32(y_slice),
        n_samples,
    })
}

fn at_max_depth(depth: usize, max_depth: Option<usize>) -> bool {
    max_depth.is_some_and(|max_d| depth >= max_d)
}

fn build_regression_tree(
    x: &Matrix,
    y: &Vector,
    depth: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
) -> RegressionTreeNode {
    let n_samples = y.len();
    let y_slice: Vec<f32> = y.as_slice().to_vec();

    if n_samples < min_samples_split
        || at_max_depth(depth, max_depth)
        || variance_f32(&y_slice) < 1e-10
    {
        return make_leaf(&y_slice, n_samples);
    }

    let Some((feature_idx, threshold, _gain)) = best_split(x, &y_slice) else {
        return make_leaf(&y_slice, n_samples);
    };

    let (left_indices, right_indices) = partition_by_threshold(x, n_samples, feature_idx, threshold);
    if left_indices.len() < min_samples_leaf || right_indices.len() < min_samples_leaf {
        return make_leaf(&y_slice, n_samples);
    }

    let (left_matrix, left_labels) = subset_by_indices(x, &y_slice, &left_indices);
    let (right_matrix, right_labels) = subset_by_indices(x, &y_slice, &right_indices);

    let left_child = build_regression_tree(
        &left_matrix,
        &Vector::from_vec(left_labels),
        depth + 1,
        max_depth,
        min_samples_split,
        min_samples_leaf,
    );
    let right_child = build_regression_tree(
        &right_matrix,
        &Vector::from_vec(right_labels),
        depth + 1,
        max_depth,
        min_samples_split,
        min_samples_leaf,
    );

    RegressionTreeNode::Node(RegressionNode {
        feature_idx,
        threshold,
        left: Box::new(left_child),
        right: Box::new(right_child),
    })
}

/// Accumulate per-feature importances weighted by samples through each split.
fn accumulate_importances(node: &RegressionTreeNode, importances: &mut [f32]) {
    if let RegressionTreeNode::Node(n) = node {
        importances[n.feature_idx] += count_samples(node) as f32;
        accumulate_importances(&n.left, importances);
        accumulate_importances(&n.right, importances);
    }
}

fn count_samples(node: &RegressionTreeNode) -> usize {
    match node {
        RegressionTreeNode::Leaf(leaf) => leaf.n_samples,
        RegressionTreeNode::Node(n) => count_samples(&n.left) + count_samples(&n.right),
    }
}

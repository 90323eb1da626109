//! Native JSON model artifacts.
//!
//! Inference only. Fitting happens elsewhere; the training side exports the
//! fitted parameters (centroids, coefficients, tree arrays) to JSON. The
//! JSON shapes below are converted once into `ndarray` arrays at load time.

use super::{Model, Scaler};
use crate::error::{PredictError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// A fitted model as exported to JSON, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Nearest-centroid assignment
    Kmeans { centroids: Vec<Vec<f64>> },
    /// `intercept + coefficients . x`
    Linear {
        coefficients: Vec<f64>,
        #[serde(default)]
        intercept: f64,
    },
    /// Decision tree ensemble in scikit-learn array layout
    Forest(Forest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForestTask {
    Classification,
    Regression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forest {
    pub task: ForestTask,
    pub n_features: usize,
    /// Class labels, indexed like each node's value row. Defaults to 0..k.
    #[serde(default)]
    pub classes: Option<Vec<f64>>,
    pub trees: Vec<Tree>,
}

/// One exported tree; node `i` is a leaf when `children_left[i] == -1`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// One row per node, all rows the same width
    pub value: Vec<Vec<f64>>,
}

const LEAF: i64 = -1;

/// Stack rows into a matrix; a row of the wrong width is a shape error
fn to_matrix(rows: &[Vec<f64>], width: usize) -> std::result::Result<Array2<f64>, String> {
    let mut matrix = Array2::zeros((0, width));
    for row in rows {
        matrix
            .push_row(ArrayView1::from(row.as_slice()))
            .map_err(|e| format!("row of width {} in a matrix of width {}: {}", row.len(), width, e))?;
    }
    Ok(matrix)
}

/// A tree with its node values as a `[nodes, width]` matrix
#[derive(Debug, Clone)]
pub struct FittedTree {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Array2<f64>,
}

impl FittedTree {
    fn fit(tree: &Tree, n_features: usize, width: usize) -> std::result::Result<Self, String> {
        let n = tree.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if tree.children_right.len() != n
            || tree.feature.len() != n
            || tree.threshold.len() != n
            || tree.value.len() != n
        {
            return Err("tree arrays differ in length".to_string());
        }

        for i in 0..n {
            let (left, right) = (tree.children_left[i], tree.children_right[i]);
            if left == LEAF {
                continue;
            }
            for child in [left, right] {
                if child <= i as i64 || child as usize >= n {
                    return Err(format!("node {} has invalid child {}", i, child));
                }
            }
            if tree.feature[i] < 0 || tree.feature[i] as usize >= n_features {
                return Err(format!("node {} splits on unknown feature {}", i, tree.feature[i]));
            }
        }

        Ok(Self {
            children_left: tree.children_left.clone(),
            children_right: tree.children_right.clone(),
            feature: tree.feature.clone(),
            threshold: tree.threshold.clone(),
            value: to_matrix(&tree.value, width)?,
        })
    }

    /// Value row of the leaf reached by `x`
    fn leaf(&self, x: &ArrayView1<f64>) -> ArrayView1<'_, f64> {
        let mut node = 0usize;
        // fit() guarantees children point forward, so this terminates
        while self.children_left[node] != LEAF {
            let feature = self.feature[node] as usize;
            node = if x[feature] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        self.value.row(node)
    }
}

/// Validated tree ensemble
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    task: ForestTask,
    n_features: usize,
    classes: Array1<f64>,
    trees: Vec<FittedTree>,
}

impl TryFrom<Forest> for TreeEnsemble {
    type Error = String;

    fn try_from(forest: Forest) -> std::result::Result<Self, String> {
        if forest.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if forest.n_features == 0 {
            return Err("forest declares zero features".to_string());
        }

        let classes: Vec<f64> = match (forest.task, forest.classes) {
            (ForestTask::Regression, _) => Vec::new(),
            (ForestTask::Classification, Some(classes)) => classes,
            (ForestTask::Classification, None) => {
                let width = forest.trees[0].value.first().map(Vec::len).unwrap_or(0);
                (0..width).map(|c| c as f64).collect()
            }
        };
        let width = match forest.task {
            ForestTask::Regression => 1,
            ForestTask::Classification if classes.is_empty() => {
                return Err("classification forest has no classes".to_string())
            }
            ForestTask::Classification => classes.len(),
        };

        let trees = forest
            .trees
            .iter()
            .enumerate()
            .map(|(i, t)| {
                FittedTree::fit(t, forest.n_features, width).map_err(|e| format!("tree {}: {}", i, e))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            task: forest.task,
            n_features: forest.n_features,
            classes: Array1::from(classes),
            trees,
        })
    }
}

impl TreeEnsemble {
    fn predict(&self, x: &ArrayView1<f64>) -> f64 {
        let n_trees = self.trees.len() as f64;
        match self.task {
            ForestTask::Regression => self.trees.iter().map(|t| t.leaf(x)[0]).sum::<f64>() / n_trees,
            ForestTask::Classification => {
                let mut proba = Array1::<f64>::zeros(self.classes.len());
                for tree in &self.trees {
                    let leaf = tree.leaf(x);
                    let total = leaf.sum();
                    if total > 0.0 {
                        proba.scaled_add(1.0 / total, &leaf);
                    }
                }
                self.classes[argmax(proba.view())]
            }
        }
    }
}

/// Index of the largest value; the first one wins ties
fn argmax(values: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// A fitted model ready for inference
#[derive(Debug, Clone)]
pub enum NativeModel {
    /// One centroid per row
    Kmeans { centroids: Array2<f64> },
    Linear {
        coefficients: Array1<f64>,
        intercept: f64,
    },
    Forest(TreeEnsemble),
}

impl TryFrom<ModelArtifact> for NativeModel {
    type Error = String;

    fn try_from(artifact: ModelArtifact) -> std::result::Result<Self, String> {
        match artifact {
            ModelArtifact::Kmeans { centroids } => {
                let dim = centroids
                    .first()
                    .map(Vec::len)
                    .ok_or_else(|| "kmeans model has no centroids".to_string())?;
                if dim == 0 {
                    return Err("kmeans centroids are empty".to_string());
                }
                let centroids =
                    to_matrix(&centroids, dim).map_err(|e| format!("kmeans centroids: {}", e))?;
                Ok(NativeModel::Kmeans { centroids })
            }
            ModelArtifact::Linear {
                coefficients,
                intercept,
            } => {
                if coefficients.is_empty() {
                    return Err("linear model has no coefficients".to_string());
                }
                Ok(NativeModel::Linear {
                    coefficients: Array1::from(coefficients),
                    intercept,
                })
            }
            ModelArtifact::Forest(forest) => Ok(NativeModel::Forest(forest.try_into()?)),
        }
    }
}

impl NativeModel {
    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        let artifact: ModelArtifact = serde_json::from_str(json).map_err(|e| e.to_string())?;
        artifact.try_into()
    }
}

impl Model for NativeModel {
    fn name(&self) -> &str {
        match self {
            NativeModel::Kmeans { .. } => "kmeans",
            NativeModel::Linear { .. } => "linear",
            NativeModel::Forest(_) => "forest",
        }
    }

    fn n_features(&self) -> Option<usize> {
        match self {
            NativeModel::Kmeans { centroids } => Some(centroids.ncols()),
            NativeModel::Linear { coefficients, .. } => Some(coefficients.len()),
            NativeModel::Forest(forest) => Some(forest.n_features),
        }
    }

    fn predict(&self, features: &[f64]) -> Result<f64> {
        if let Some(expected) = self.n_features() {
            if features.len() != expected {
                return Err(PredictError::Invocation(format!(
                    "{} model expects {} features, got {}",
                    self.name(),
                    expected,
                    features.len()
                )));
            }
        }

        let x = ArrayView1::from(features);
        let value = match self {
            NativeModel::Kmeans { centroids } => {
                let distances: Array1<f64> = centroids
                    .outer_iter()
                    .map(|c| -(&c - &x).mapv(|d| d * d).sum())
                    .collect();
                argmax(distances.view()) as f64
            }
            NativeModel::Linear {
                coefficients,
                intercept,
            } => intercept + coefficients.dot(&x),
            NativeModel::Forest(forest) => forest.predict(&x),
        };

        Ok(value)
    }
}

/// A fitted feature scaler as exported to JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScalerArtifact {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

/// A fitted scaler ready for inference
#[derive(Debug, Clone)]
pub enum NativeScaler {
    /// Zero entries of `scale` are stored as one
    Standard { mean: Array1<f64>, scale: Array1<f64> },
    MinMax { min: Array1<f64>, scale: Array1<f64> },
}

impl TryFrom<ScalerArtifact> for NativeScaler {
    type Error = String;

    fn try_from(artifact: ScalerArtifact) -> std::result::Result<Self, String> {
        let (offset, scale) = match &artifact {
            ScalerArtifact::Standard { mean, scale } => (mean, scale),
            ScalerArtifact::MinMax { min, scale } => (min, scale),
        };
        if offset.is_empty() || offset.len() != scale.len() {
            return Err(format!(
                "scaler parameter lengths {} and {} are invalid",
                offset.len(),
                scale.len()
            ));
        }

        Ok(match artifact {
            ScalerArtifact::Standard { mean, scale } => NativeScaler::Standard {
                mean: Array1::from(mean),
                scale: Array1::from(scale).mapv(|s| if s == 0.0 { 1.0 } else { s }),
            },
            ScalerArtifact::MinMax { min, scale } => NativeScaler::MinMax {
                min: Array1::from(min),
                scale: Array1::from(scale),
            },
        })
    }
}

impl NativeScaler {
    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        let artifact: ScalerArtifact = serde_json::from_str(json).map_err(|e| e.to_string())?;
        artifact.try_into()
    }
}

impl Scaler for NativeScaler {
    fn n_features(&self) -> usize {
        match self {
            NativeScaler::Standard { mean, .. } => mean.len(),
            NativeScaler::MinMax { min, .. } => min.len(),
        }
    }

    fn transform(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.n_features() {
            return Err(PredictError::SchemaMismatch {
                expected: self.n_features(),
                actual: features.len(),
            });
        }

        let x = ArrayView1::from(features);
        let scaled = match self {
            NativeScaler::Standard { mean, scale } => (&x - mean) / scale,
            NativeScaler::MinMax { min, scale } => &x * scale + min,
        };
        Ok(scaled.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stump_classifier() -> NativeModel {
        // x[0] <= 0.5 -> class "10", else class "20"
        NativeModel::from_json(
            r#"{
                "type": "forest",
                "task": "classification",
                "n_features": 2,
                "classes": [10.0, 20.0],
                "trees": [{
                    "children_left": [1, -1, -1],
                    "children_right": [2, -1, -1],
                    "feature": [0, -2, -2],
                    "threshold": [0.5, -2.0, -2.0],
                    "value": [[5.0, 5.0], [4.0, 1.0], [1.0, 4.0]]
                }]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_kmeans_nearest_centroid() {
        let model = NativeModel::from_json(
            r#"{"type": "kmeans", "centroids": [[0.0, 0.0], [10.0, 10.0], [0.0, 10.0]]}"#,
        )
        .unwrap();

        assert_eq!(model.n_features(), Some(2));
        assert_eq!(model.predict(&[1.0, 1.0]).unwrap(), 0.0);
        assert_eq!(model.predict(&[9.0, 8.0]).unwrap(), 1.0);
        assert_eq!(model.predict(&[1.0, 9.0]).unwrap(), 2.0);
        // Equidistant from 0 and 2: first centroid wins
        assert_eq!(model.predict(&[0.0, 5.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_linear_model() {
        let model = NativeModel::from_json(
            r#"{"type": "linear", "coefficients": [2.0, -1.0], "intercept": 0.5}"#,
        )
        .unwrap();
        assert_eq!(model.predict(&[3.0, 1.0]).unwrap(), 5.5);
        assert!(matches!(
            model.predict(&[3.0]),
            Err(PredictError::Invocation(_))
        ));
    }

    #[test]
    fn test_forest_classification() {
        let model = stump_classifier();
        assert_eq!(model.predict(&[0.2, 99.0]).unwrap(), 10.0);
        assert_eq!(model.predict(&[0.9, 99.0]).unwrap(), 20.0);
        // Threshold is inclusive on the left
        assert_eq!(model.predict(&[0.5, 0.0]).unwrap(), 10.0);
    }

    #[test]
    fn test_forest_regression_averages_trees() {
        let tree = Tree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![0, -2, -2],
            threshold: vec![1.0, -2.0, -2.0],
            value: vec![vec![0.0], vec![2.0], vec![4.0]],
        };
        let mut shifted = tree.clone();
        shifted.value = vec![vec![0.0], vec![6.0], vec![8.0]];

        let model = NativeModel::try_from(ModelArtifact::Forest(Forest {
            task: ForestTask::Regression,
            n_features: 1,
            classes: None,
            trees: vec![tree, shifted],
        }))
        .unwrap();
        assert_eq!(model.predict(&[0.0]).unwrap(), 4.0);
        assert_eq!(model.predict(&[5.0]).unwrap(), 6.0);
    }

    #[test]
    fn test_invalid_artifacts_rejected() {
        assert!(NativeModel::from_json(r#"{"type": "kmeans", "centroids": []}"#).is_err());
        assert!(
            NativeModel::from_json(r#"{"type": "kmeans", "centroids": [[1.0], [1.0, 2.0]]}"#)
                .is_err()
        );
        // Same element count as a 3x2 matrix, still ragged
        assert!(NativeModel::from_json(
            r#"{"type": "kmeans", "centroids": [[1.0, 2.0], [3.0], [4.0, 5.0, 6.0]]}"#
        )
        .is_err());
        assert!(NativeModel::from_json(r#"{"type": "svm"}"#).is_err());
        assert!(NativeModel::from_json("not json").is_err());

        // Child pointing backwards would loop forever
        let looping = r#"{
            "type": "forest", "task": "regression", "n_features": 1,
            "trees": [{
                "children_left": [0], "children_right": [0],
                "feature": [0], "threshold": [0.0], "value": [[1.0]]
            }]
        }"#;
        assert!(NativeModel::from_json(looping).is_err());

        let bad_feature = r#"{
            "type": "forest", "task": "regression", "n_features": 1,
            "trees": [{
                "children_left": [1, -1, -1], "children_right": [2, -1, -1],
                "feature": [3, -2, -2], "threshold": [0.0, 0.0, 0.0],
                "value": [[0.0], [1.0], [2.0]]
            }]
        }"#;
        assert!(NativeModel::from_json(bad_feature).is_err());

        let ragged_values = r#"{
            "type": "forest", "task": "classification", "n_features": 1,
            "classes": [0.0, 1.0],
            "trees": [{
                "children_left": [1, -1, -1], "children_right": [2, -1, -1],
                "feature": [0, -2, -2], "threshold": [0.0, 0.0, 0.0],
                "value": [[1.0, 1.0], [1.0], [0.0, 1.0]]
            }]
        }"#;
        assert!(NativeModel::from_json(ragged_values).is_err());
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let model = stump_classifier();
        let x = [0.7, 1.0];
        let first = model.predict(&x).unwrap();
        for _ in 0..10 {
            assert_eq!(model.predict(&x).unwrap(), first);
        }
    }

    #[test]
    fn test_standard_scaler() {
        let scaler = NativeScaler::from_json(
            r#"{"type": "standard", "mean": [1.0, 2.0, 3.0], "scale": [2.0, 0.0, 1.0]}"#,
        )
        .unwrap();
        assert_eq!(scaler.n_features(), 3);
        assert_eq!(scaler.transform(&[3.0, 5.0, 3.0]).unwrap(), vec![1.0, 3.0, 0.0]);
        assert!(matches!(
            scaler.transform(&[1.0]),
            Err(PredictError::SchemaMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_min_max_scaler() {
        let scaler =
            NativeScaler::from_json(r#"{"type": "min_max", "min": [-1.0], "scale": [0.5]}"#)
                .unwrap();
        assert_eq!(scaler.transform(&[4.0]).unwrap(), vec![1.0]);

        assert!(
            NativeScaler::from_json(r#"{"type": "min_max", "min": [0.0], "scale": []}"#).is_err()
        );
    }

    #[test]
    fn test_kmeans_from_array() {
        let model = NativeModel::Kmeans {
            centroids: array![[0.0], [10.0]],
        };
        assert_eq!(model.predict(&[6.0]).unwrap(), 1.0);
    }
}

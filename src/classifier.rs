//! Classifier collaborator
//!
//! The pipeline only needs `fit`, `predict`, and optional per-feature
//! importances. [`RandomForest`] is the bundled implementation: bagged CART
//! trees split on Gini impurity, deterministic for a given seed.

use crate::error::{Result, StressError};
use crate::labels::Label;
use crate::matrix::FeatureMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Binary classifier over a feature matrix
pub trait Classifier {
    fn fit(&mut self, x: &FeatureMatrix, y: &[Label]) -> Result<()>;

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<Label>>;

    /// Non-negative weight per training column, if the model exposes them
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }
}

/// Default tree depth limit
pub const DEFAULT_MAX_DEPTH: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf {
        label: Label,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict_row(&self, row: &[f64]) -> Label {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { label } => return *label,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Growth limits shared by every tree in a forest
#[derive(Debug, Clone, Copy)]
struct TreeParams {
    max_depth: usize,
    min_samples_split: usize,
    max_features: usize,
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    y: &'a [Label],
    params: TreeParams,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    decrease: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

fn gini(stressed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = stressed as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl<'a> TreeBuilder<'a> {
    fn new(rows: &'a [Vec<f64>], y: &'a [Label], params: TreeParams, n_features: usize) -> Self {
        Self {
            rows,
            y,
            params,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        }
    }

    fn stressed(&self, indices: &[usize]) -> usize {
        indices.iter().filter(|i| self.y[**i].is_stressed()).count()
    }

    fn leaf(&mut self, indices: &[usize]) -> usize {
        let stressed = self.stressed(indices);
        let label = if stressed * 2 > indices.len() {
            Label::Stressed
        } else {
            Label::Neutral
        };
        self.nodes.push(Node::Leaf { label });
        self.nodes.len() - 1
    }

    fn grow(&mut self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let stressed = self.stressed(&indices);
        let pure = stressed == 0 || stressed == indices.len();
        if pure || depth >= self.params.max_depth || indices.len() < self.params.min_samples_split
        {
            return self.leaf(&indices);
        }

        let Some(best) = self.best_split(&indices, stressed, rng) else {
            return self.leaf(&indices);
        };

        self.importances[best.feature] += best.decrease;

        // reserve the slot so children land after their parent
        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf {
            label: Label::Neutral,
        });
        let left = self.grow(best.left, depth + 1, rng);
        let right = self.grow(best.right, depth + 1, rng);
        self.nodes[slot] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        slot
    }

    fn best_split(
        &self,
        indices: &[usize],
        stressed: usize,
        rng: &mut StdRng,
    ) -> Option<BestSplit> {
        let n = indices.len();
        let n_features = self.importances.len();
        let parent = n as f64 * gini(stressed, n);
        // Visit features in random order; look past max_features only while
        // no valid split has been found.
        let order_of_features = rand::seq::index::sample(rng, n_features, n_features);

        let mut best: Option<(usize, f64, f64)> = None;
        for (visited, feature) in order_of_features.iter().enumerate() {
            if visited >= self.params.max_features && best.is_some() {
                break;
            }
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_by(|a, b| self.rows[*a][feature].total_cmp(&self.rows[*b][feature]));

            let mut left_stressed = 0;
            for pos in 0..n - 1 {
                if self.y[order[pos]].is_stressed() {
                    left_stressed += 1;
                }
                let here = self.rows[order[pos]][feature];
                let next = self.rows[order[pos + 1]][feature];
                if here == next {
                    continue;
                }
                let n_left = pos + 1;
                let n_right = n - n_left;
                let impurity = n_left as f64 * gini(left_stressed, n_left)
                    + n_right as f64 * gini(stressed - left_stressed, n_right);
                let decrease = parent - impurity;
                if decrease > 1e-12 && best.map_or(true, |(_, _, d)| decrease > d) {
                    best = Some((feature, (here + next) / 2.0, decrease));
                }
            }
        }

        best.map(|(feature, threshold, decrease)| {
            let (left, right) = indices
                .iter()
                .partition(|i| self.rows[**i][feature] <= threshold);
            BestSplit {
                feature,
                threshold,
                decrease,
                left,
                right,
            }
        })
    }
}

/// Bagged decision-tree ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_estimators: usize,
    max_depth: usize,
    min_samples_split: usize,
    seed: u64,
    n_features: usize,
    trees: Vec<Tree>,
    importances: Vec<f64>,
}

impl RandomForest {
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_split: 2,
            seed,
            n_features: 0,
            trees: Vec::new(),
            importances: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &FeatureMatrix, y: &[Label]) -> Result<()> {
        if x.n_rows() == 0 || x.n_cols() == 0 {
            return Err(StressError::Model("cannot fit on an empty matrix".to_string()));
        }
        if x.n_rows() != y.len() {
            return Err(StressError::Model(format!(
                "{} rows but {} labels",
                x.n_rows(),
                y.len()
            )));
        }
        if self.n_estimators == 0 {
            return Err(StressError::InvalidParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }

        let n = x.n_rows();
        let p = x.n_cols();
        let params = TreeParams {
            max_depth: self.max_depth.max(1),
            min_samples_split: self.min_samples_split.max(2),
            max_features: ((p as f64).sqrt() as usize).max(1),
        };

        let mut trees = Vec::with_capacity(self.n_estimators);
        let mut importances = vec![0.0; p];

        for t in 0..self.n_estimators {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

            let mut builder = TreeBuilder::new(x.rows(), y, params, p);
            builder.grow(sample, 0, &mut rng);

            let total: f64 = builder.importances.iter().sum();
            if total > 0.0 {
                for (acc, v) in importances.iter_mut().zip(&builder.importances) {
                    *acc += v / total;
                }
            }
            trees.push(Tree {
                nodes: builder.nodes,
            });
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        debug!(trees = trees.len(), rows = n, features = p, "fitted forest");

        self.n_features = p;
        self.trees = trees;
        self.importances = importances;
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<Label>> {
        if !self.is_fitted() {
            return Err(StressError::Model("predict called before fit".to_string()));
        }
        if x.n_cols() != self.n_features {
            return Err(StressError::Model(format!(
                "matrix has {} columns, model was trained on {}",
                x.n_cols(),
                self.n_features
            )));
        }

        Ok(x.rows()
            .iter()
            .map(|row| {
                let votes = self
                    .trees
                    .iter()
                    .filter(|t| t.predict_row(row).is_stressed())
                    .count();
                if votes * 2 > self.trees.len() {
                    Label::Stressed
                } else {
                    Label::Neutral
                }
            })
            .collect())
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        if self.is_fitted() {
            Some(self.importances.clone())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (FeatureMatrix, Vec<Label>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let stressed = i % 2 == 1;
            let signal = if stressed { 90.0 + i as f64 } else { 60.0 + i as f64 * 0.1 };
            let noise = (i * 7 % 5) as f64;
            rows.push(vec![signal, noise]);
            y.push(if stressed { Label::Stressed } else { Label::Neutral });
        }
        let matrix = FeatureMatrix::new(vec!["HR".into(), "noise".into()], rows).unwrap();
        (matrix, y)
    }

    #[test]
    fn test_fits_separable_data() {
        let (x, y) = separable();
        let mut forest = RandomForest::new(25, 42);
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_importances_favor_signal() {
        let (x, y) = separable();
        let mut forest = RandomForest::new(25, 42);
        assert!(forest.feature_importances().is_none());
        forest.fit(&x, &y).unwrap();

        let importances = forest.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances.iter().all(|v| *v >= 0.0));
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = separable();
        let mut a = RandomForest::new(10, 7);
        let mut b = RandomForest::new(10, 7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_class_training() {
        let x = FeatureMatrix::new(vec!["a".into()], vec![vec![1.0], vec![2.0]]).unwrap();
        let y = vec![Label::Stressed, Label::Stressed];
        let mut forest = RandomForest::new(3, 1);
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_misuse_errors() {
        let (x, y) = separable();
        let forest = RandomForest::new(3, 1);
        assert!(matches!(forest.predict(&x), Err(StressError::Model(_))));

        let mut forest = RandomForest::new(3, 1);
        assert!(forest.fit(&x, &y[..3]).is_err());
        forest.fit(&x, &y).unwrap();

        let narrow = FeatureMatrix::new(vec!["HR".into()], vec![vec![1.0]]).unwrap();
        assert!(matches!(forest.predict(&narrow), Err(StressError::Model(_))));
    }

    #[test]
    fn test_serde_round_trip_predicts_identically() {
        let (x, y) = separable();
        let mut forest = RandomForest::new(5, 3);
        forest.fit(&x, &y).unwrap();

        let json = serde_json::to_string(&forest).unwrap();
        let loaded: RandomForest = serde_json::from_str(&json).unwrap();
        assert_eq!(forest.predict(&x).unwrap(), loaded.predict(&x).unwrap());
    }
}

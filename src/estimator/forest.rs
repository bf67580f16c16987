use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Estimator, Regressor};
use crate::error::{Error, Result};
use crate::matrix::FeatureMatrix;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// `None` grows each tree until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(15),
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

/// Bagged CART regression trees with variance-reduction splits.
#[derive(Debug, Clone, Default)]
pub struct RandomForest {
    params: ForestParams,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
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
    fn predict(&self, x: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => i = if x[*feature] <= *threshold { *left } else { *right },
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    n_features: usize,
    trees: Vec<Tree>,
    importances: Vec<f64>,
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Grows one tree over a bootstrap sample. Importances accumulate the
/// squared-error reduction of every split on each feature.
struct Grower<'a> {
    x: ArrayView2<'a, f64>,
    y: &'a [f64],
    params: &'a ForestParams,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl<'a> Grower<'a> {
    fn new(x: ArrayView2<'a, f64>, y: &'a [f64], params: &'a ForestParams) -> Self {
        Self {
            x,
            y,
            params,
            nodes: Vec::new(),
            importances: vec![0.0; x.ncols()],
        }
    }

    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        let n = samples.len() as f64;
        let mean = samples.iter().map(|&i| self.y[i]).sum::<f64>() / n;
        self.nodes.push(Node::Leaf { value: mean });

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        let pure = samples.iter().all(|&i| self.y[i] == self.y[samples[0]]);
        if pure || depth_reached || samples.len() < self.params.min_samples_split.max(2) {
            return id;
        }
        let Some(split) = self.best_split(&samples) else {
            return id;
        };

        self.importances[split.feature] += split.gain;
        let (lo, hi): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[[i, split.feature]] <= split.threshold);
        let left = self.grow(lo, depth + 1);
        let right = self.grow(hi, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&self, samples: &[usize]) -> Option<Split> {
        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let total: f64 = samples.iter().map(|&i| self.y[i]).sum();
        let parent = total * total / n as f64;
        let tolerance = 1e-12 * parent.abs().max(1.0);

        let mut best: Option<Split> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);
        for feature in 0..self.x.ncols() {
            pairs.clear();
            pairs.extend(samples.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
            if pairs[0].0 == pairs[n - 1].0 {
                continue;
            }

            let mut left_sum = 0.0;
            for k in 0..n - 1 {
                left_sum += pairs[k].1;
                if pairs[k].0 == pairs[k + 1].0 {
                    continue;
                }
                let (nl, nr) = (k + 1, n - k - 1);
                if nl < min_leaf || nr < min_leaf {
                    continue;
                }
                let right_sum = total - left_sum;
                let score = left_sum * left_sum / nl as f64 + right_sum * right_sum / nr as f64;
                let gain = score - parent;
                if gain > tolerance && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Split {
                        feature,
                        threshold: (pairs[k].0 + pairs[k + 1].0) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

fn normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    }
}

impl Estimator for RandomForest {
    type Fitted = ForestModel;

    fn fit(&self, features: &FeatureMatrix, target: &[f64]) -> Result<ForestModel> {
        let n = features.nrows();
        if n == 0 {
            return Err(Error::Estimator("cannot fit on an empty matrix".into()));
        }
        if target.len() != n {
            return Err(Error::Estimator(format!(
                "{} target values for {n} rows",
                target.len()
            )));
        }
        if self.params.n_estimators == 0 {
            return Err(Error::Estimator("n_estimators must be positive".into()));
        }

        let x = features.values();
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut trees = Vec::with_capacity(self.params.n_estimators);
        let mut importances = vec![0.0; features.ncols()];
        for t in 0..self.params.n_estimators {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut grower = Grower::new(x, target, &self.params);
            grower.grow(sample, 0);
            normalize(&mut grower.importances);
            importances
                .iter_mut()
                .zip(&grower.importances)
                .for_each(|(acc, v)| *acc += v);
            debug!(tree = t, nodes = grower.nodes.len(), "grew tree");
            trees.push(Tree {
                nodes: grower.nodes,
            });
        }
        normalize(&mut importances);

        Ok(ForestModel {
            n_features: features.ncols(),
            trees,
            importances,
        })
    }
}

impl Regressor for ForestModel {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        if features.ncols() != self.n_features {
            return Err(Error::Estimator(format!(
                "model expects {} features, got {}",
                self.n_features,
                features.ncols()
            )));
        }
        let x = features.values();
        let mut row = vec![0.0; self.n_features];
        Ok((0..x.nrows())
            .map(|i| {
                row.iter_mut().zip(x.row(i)).for_each(|(r, v)| *r = *v);
                self.trees.iter().map(|t| t.predict(&row)).sum::<f64>() / self.trees.len() as f64
            })
            .collect())
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        Some(self.importances.clone())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model: Self = serde_json::from_slice(bytes)?;
        model.validate()?;
        Ok(model)
    }
}

impl ForestModel {
    /// Rejects a structurally broken model before it can score anything.
    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(Error::Estimator("forest has no trees".into()));
        }
        if self.importances.len() != self.n_features {
            return Err(Error::Estimator(format!(
                "{} importances for {} features",
                self.importances.len(),
                self.n_features
            )));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            let len = tree.nodes.len();
            if len == 0 {
                return Err(Error::Estimator(format!("tree {t} has no nodes")));
            }
            for node in &tree.nodes {
                let Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } = node
                else {
                    continue;
                };
                if *feature >= self.n_features {
                    return Err(Error::Estimator(format!(
                        "tree {t} splits on feature {feature} of {}",
                        self.n_features
                    )));
                }
                if *left >= len || *right >= len {
                    return Err(Error::Estimator(format!(
                        "tree {t} points past its {len} nodes"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn step_data() -> (FeatureMatrix, Vec<f64>) {
        // y depends on x0 only; x1 is noise-free clutter.
        let n = 40;
        let mut values = Array2::zeros((n, 2));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            values[[i, 0]] = i as f64;
            values[[i, 1]] = (i % 3) as f64;
            y.push(if i < 20 { 100.0 } else { 300.0 });
        }
        let names = vec!["x0".to_string(), "x1".to_string()];
        (FeatureMatrix::new(names, values).unwrap(), y)
    }

    fn small() -> RandomForest {
        RandomForest::new(ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        })
    }

    #[test]
    fn learns_a_step() {
        let (x, y) = step_data();
        let model = small().fit(&x, &y).unwrap();
        let preds = model.predict(&x.select_rows(&[0, 5, 30, 39])).unwrap();
        assert_relative_eq!(preds[0], 100.0);
        assert_relative_eq!(preds[1], 100.0);
        assert_relative_eq!(preds[2], 300.0);
        assert_relative_eq!(preds[3], 300.0);
    }

    #[test]
    fn importance_goes_to_the_informative_feature() {
        let (x, y) = step_data();
        let importances = small().fit(&x, &y).unwrap().feature_importances().unwrap();
        assert_relative_eq!(importances.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn same_seed_same_model() {
        let (x, y) = step_data();
        assert_eq!(small().fit(&x, &y).unwrap(), small().fit(&x, &y).unwrap());
    }

    #[test]
    fn bytes_round_trip() {
        let (x, y) = step_data();
        let model = small().fit(&x, &y).unwrap();
        let restored = ForestModel::from_bytes(&model.to_bytes().unwrap()).unwrap();
        assert_eq!(model.predict(&x).unwrap(), restored.predict(&x).unwrap());
    }

    #[test]
    fn corrupt_bytes_are_rejected() {
        let no_trees = br#"{"n_features":1,"trees":[],"importances":[0.0]}"#;
        assert!(matches!(
            ForestModel::from_bytes(no_trees),
            Err(Error::Estimator(_))
        ));

        let dangling = br#"{"n_features":1,"trees":[{"nodes":[
            {"Split":{"feature":0,"threshold":1.0,"left":1,"right":5}},
            {"Leaf":{"value":1.0}}]}],"importances":[1.0]}"#;
        assert!(matches!(
            ForestModel::from_bytes(dangling),
            Err(Error::Estimator(_))
        ));

        let wide = br#"{"n_features":1,"trees":[{"nodes":[
            {"Split":{"feature":3,"threshold":1.0,"left":1,"right":2}},
            {"Leaf":{"value":1.0}},{"Leaf":{"value":2.0}}]}],"importances":[1.0]}"#;
        assert!(matches!(
            ForestModel::from_bytes(wide),
            Err(Error::Estimator(_))
        ));

        let short = br#"{"n_features":2,"trees":[{"nodes":[{"Leaf":{"value":1.0}}]}],
            "importances":[1.0]}"#;
        assert!(matches!(
            ForestModel::from_bytes(short),
            Err(Error::Estimator(_))
        ));
    }

    #[test]
    fn constant_target_is_a_single_leaf() {
        let (x, _) = step_data();
        let y = vec![7.0; x.nrows()];
        let model = small().fit(&x, &y).unwrap();
        assert!(model.trees.iter().all(|t| t.nodes.len() == 1));
        assert_eq!(model.predict(&x.select_rows(&[3])).unwrap(), vec![7.0]);
    }

    #[test]
    fn rejects_wrong_width() {
        let (x, y) = step_data();
        let model = small().fit(&x, &y).unwrap();
        let narrow = FeatureMatrix::zeros(vec!["x0".into()], 1);
        assert!(matches!(model.predict(&narrow), Err(Error::Estimator(_))));
    }

    #[test]
    fn rejects_empty_and_mismatched_input() {
        let empty = FeatureMatrix::zeros(vec!["x0".into()], 0);
        assert!(small().fit(&empty, &[]).is_err());
        let (x, _) = step_data();
        assert!(small().fit(&x, &[1.0]).is_err());
    }
}

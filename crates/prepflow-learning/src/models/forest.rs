//! Random forests and extremely randomized trees.
//!
//! Trees are grown in parallel on the rayon pool. Tree `i` is seeded with
//! `seed + i`, so results do not depend on thread scheduling.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::tree::{Tree, TreeKind};
use super::{Estimator, MaxFeatures, TreeParams, argmax_rows, check_fit_input, class_count};
use crate::error::{LearningError, Result};

/// Settings shared by the four ensemble variants.
#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// Resample rows with replacement for each tree.
    pub bootstrap: bool,
    pub tree: TreeParams,
}

impl ForestParams {
    fn random_forest(max_features: MaxFeatures, seed: u64) -> Self {
        Self {
            n_estimators: 100,
            bootstrap: true,
            tree: TreeParams {
                max_features,
                seed,
                ..TreeParams::default()
            },
        }
    }

    fn extra_trees(max_features: MaxFeatures, seed: u64) -> Self {
        Self {
            n_estimators: 100,
            bootstrap: false,
            tree: TreeParams {
                max_features,
                random_splits: true,
                seed,
                ..TreeParams::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Ensemble {
    trees: Vec<Tree>,
    n_classes: usize,
}

impl Ensemble {
    fn fit(kind: TreeKind, params: &ForestParams, x: &Array2<f64>, y: &Array1<f64>) -> Self {
        let n_classes = match kind {
            TreeKind::Classifier => class_count(y),
            TreeKind::Regressor => 0,
        };
        let n = x.nrows();

        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let seed = params.tree.seed.wrapping_add(i as u64);
                let rows: Vec<usize> = if params.bootstrap {
                    let mut rng = StdRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15);
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                let tree_params = TreeParams {
                    seed,
                    ..params.tree.clone()
                };
                Tree::grow(kind, &tree_params, x, y, rows, n_classes)
            })
            .collect();

        Self { trees, n_classes }
    }

    fn mean_distribution(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut acc = Array2::zeros((x.nrows(), self.n_classes));
        for tree in &self.trees {
            acc += &tree.predict_distribution(x, self.n_classes);
        }
        acc / self.trees.len().max(1) as f64
    }

    fn mean_values(&self, x: &Array2<f64>) -> Array1<f64> {
        let mut acc = Array1::zeros(x.nrows());
        for tree in &self.trees {
            acc += &tree.predict_values(x);
        }
        acc / self.trees.len().max(1) as f64
    }

    fn importances(&self) -> Array1<f64> {
        let n_features = self.trees.first().map_or(0, |t| t.importances().len());
        let mut acc = Array1::zeros(n_features);
        for tree in &self.trees {
            acc += tree.importances();
        }
        let total = acc.sum();
        if total > 0.0 { acc / total } else { acc }
    }
}

macro_rules! forest_classifier {
    ($name:ident, $label:literal, $ctor:ident) => {
        #[doc = concat!($label, ": averages the class distributions of 100 trees.")]
        #[derive(Debug, Clone)]
        pub struct $name {
            params: ForestParams,
            fitted: Option<Ensemble>,
        }

        impl $name {
            #[must_use]
            pub fn new(seed: u64) -> Self {
                Self {
                    params: ForestParams::$ctor(MaxFeatures::Sqrt, seed),
                    fitted: None,
                }
            }

            /// Override the number of trees.
            #[must_use]
            pub fn with_estimators(mut self, n: usize) -> Self {
                self.params.n_estimators = n.max(1);
                self
            }

            fn ensemble(&self) -> Result<&Ensemble> {
                self.fitted
                    .as_ref()
                    .ok_or_else(|| LearningError::NotFitted($label.into()))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new(42)
            }
        }

        impl Estimator for $name {
            fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
                check_fit_input($label, x, y)?;
                self.fitted = Some(Ensemble::fit(TreeKind::Classifier, &self.params, x, y));
                Ok(())
            }

            fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
                Ok(argmax_rows(&self.ensemble()?.mean_distribution(x)))
            }

            fn predict_proba(&self, x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
                Some(self.ensemble().map(|e| e.mean_distribution(x)))
            }

            fn feature_importances(&self) -> Option<Array1<f64>> {
                self.fitted.as_ref().map(Ensemble::importances)
            }
        }
    };
}

macro_rules! forest_regressor {
    ($name:ident, $label:literal, $ctor:ident) => {
        #[doc = concat!($label, ": averages the predictions of 100 trees.")]
        #[derive(Debug, Clone)]
        pub struct $name {
            params: ForestParams,
            fitted: Option<Ensemble>,
        }

        impl $name {
            #[must_use]
            pub fn new(seed: u64) -> Self {
                Self {
                    params: ForestParams::$ctor(MaxFeatures::All, seed),
                    fitted: None,
                }
            }

            /// Override the number of trees.
            #[must_use]
            pub fn with_estimators(mut self, n: usize) -> Self {
                self.params.n_estimators = n.max(1);
                self
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new(42)
            }
        }

        impl Estimator for $name {
            fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
                check_fit_input($label, x, y)?;
                self.fitted = Some(Ensemble::fit(TreeKind::Regressor, &self.params, x, y));
                Ok(())
            }

            fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
                self.fitted
                    .as_ref()
                    .map(|e| e.mean_values(x))
                    .ok_or_else(|| LearningError::NotFitted($label.into()))
            }

            fn feature_importances(&self) -> Option<Array1<f64>> {
                self.fitted.as_ref().map(Ensemble::importances)
            }
        }
    };
}

forest_classifier!(RandomForestClassifier, "Random Forest Classifier", random_forest);
forest_classifier!(ExtraTreesClassifier, "Extra Trees Classifier", extra_trees);
forest_regressor!(RandomForestRegressor, "Random Forest", random_forest);
forest_regressor!(ExtraTreesRegressor, "Extra Trees", extra_trees);

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.3],
            [0.3, 0.2],
            [5.0, 5.1],
            [5.2, 5.0],
            [5.1, 5.3],
            [5.3, 5.2]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_random_forest_classifier() {
        let (x, y) = blobs();
        let mut model = RandomForestClassifier::new(42).with_estimators(25);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&array![[0.1, 0.1], [5.2, 5.2]]).unwrap(), array![0.0, 1.0]);

        let proba = model.predict_proba(&x).unwrap().unwrap();
        assert_eq!(proba.ncols(), 2);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_extra_trees_regressor_is_deterministic() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut a = ExtraTreesRegressor::new(7).with_estimators(10);
        let mut b = ExtraTreesRegressor::new(7).with_estimators(10);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = blobs();
        let mut model = ExtraTreesClassifier::default().with_estimators(10);
        model.fit(&x, &y).unwrap();
        let imp = model.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }
}

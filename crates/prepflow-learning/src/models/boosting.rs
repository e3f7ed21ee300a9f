//! Gradient boosting with shallow regression trees.
//!
//! Defaults: 100 stages, learning rate 0.1, depth 3. Regression boosts the
//! squared-error residual. Binary classification boosts log-odds; multiclass
//! fits one tree per class per stage on the softmax residual. Leaves hold the
//! mean residual of their rows.

use ndarray::{Array1, Array2, Axis};

use super::tree::{Tree, TreeKind};
use super::{Estimator, TreeParams, argmax_rows, check_fit_input, class_count};
use crate::error::{LearningError, Result};

#[derive(Debug, Clone)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            seed: 42,
        }
    }
}

impl BoostingParams {
    fn tree_params(&self, stage: usize) -> TreeParams {
        TreeParams {
            max_depth: Some(self.max_depth),
            seed: self.seed.wrapping_add(stage as u64),
            ..TreeParams::default()
        }
    }
}

fn fit_stage(params: &BoostingParams, stage: usize, x: &Array2<f64>, residual: &Array1<f64>) -> Tree {
    Tree::grow(
        TreeKind::Regressor,
        &params.tree_params(stage),
        x,
        residual,
        (0..x.nrows()).collect(),
        0,
    )
}

fn summed_importances(trees: &[Tree], n_features: usize) -> Array1<f64> {
    let mut acc = Array1::zeros(n_features);
    for tree in trees {
        acc += tree.importances();
    }
    let total = acc.sum();
    if total > 0.0 { acc / total } else { acc }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Gradient boosting for regression.
#[derive(Debug, Clone, Default)]
pub struct GradientBoostingRegressor {
    params: BoostingParams,
    fitted: Option<(f64, Vec<Tree>)>,
}

impl GradientBoostingRegressor {
    #[must_use]
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }
}

impl Estimator for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input("Gradient Boosting", x, y)?;
        let init = y.mean().unwrap_or(0.0);
        let mut f = Array1::from_elem(y.len(), init);
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for stage in 0..self.params.n_estimators {
            let residual = y - &f;
            let tree = fit_stage(&self.params, stage, x, &residual);
            f.scaled_add(self.params.learning_rate, &tree.predict_values(x));
            trees.push(tree);
        }

        self.fitted = Some((init, trees));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (init, trees) = self
            .fitted
            .as_ref()
            .ok_or_else(|| LearningError::NotFitted("Gradient Boosting".into()))?;
        let mut f = Array1::from_elem(x.nrows(), *init);
        for tree in trees {
            f.scaled_add(self.params.learning_rate, &tree.predict_values(x));
        }
        Ok(f)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.fitted
            .as_ref()
            .map(|(_, trees)| summed_importances(trees, trees.first().map_or(0, |t| t.importances().len())))
    }
}

#[derive(Debug, Clone)]
struct ClassifierState {
    /// Initial raw scores, one per output column.
    init: Vec<f64>,
    /// `stages[m][k]` is the tree for output `k` at stage `m`.
    stages: Vec<Vec<Tree>>,
    n_classes: usize,
}

/// Gradient boosting for classification.
#[derive(Debug, Clone, Default)]
pub struct GradientBoostingClassifier {
    params: BoostingParams,
    fitted: Option<ClassifierState>,
}

impl GradientBoostingClassifier {
    #[must_use]
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    fn raw_scores(&self, state: &ClassifierState, x: &Array2<f64>) -> Array2<f64> {
        let outputs = state.init.len();
        let mut f = Array2::zeros((x.nrows(), outputs));
        for (k, &v) in state.init.iter().enumerate() {
            f.column_mut(k).fill(v);
        }
        for stage in &state.stages {
            for (k, tree) in stage.iter().enumerate() {
                f.column_mut(k)
                    .scaled_add(self.params.learning_rate, &tree.predict_values(x));
            }
        }
        f
    }

    fn probabilities(&self, state: &ClassifierState, x: &Array2<f64>) -> Array2<f64> {
        let raw = self.raw_scores(state, x);
        if state.n_classes == 2 {
            let mut out = Array2::zeros((x.nrows(), 2));
            for (r, &z) in raw.column(0).iter().enumerate() {
                let p = sigmoid(z);
                out[[r, 0]] = 1.0 - p;
                out[[r, 1]] = p;
            }
            out
        } else {
            softmax_rows(&raw)
        }
    }
}

fn softmax_rows(raw: &Array2<f64>) -> Array2<f64> {
    let mut out = raw.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    out
}

impl Estimator for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input("Gradient Boosting Classifier", x, y)?;
        let n_classes = class_count(y);
        let n = y.len() as f64;
        let mut priors = vec![0.0; n_classes];
        for &v in y {
            priors[v as usize] += 1.0 / n;
        }
        if priors.iter().filter(|&&p| p > 0.0).count() < 2 {
            return Err(LearningError::training(
                "Gradient Boosting Classifier",
                "needs samples of at least 2 classes",
            ));
        }

        let state = if n_classes == 2 {
            let p = priors[1].clamp(1e-15, 1.0 - 1e-15);
            let init = (p / (1.0 - p)).ln();
            let mut f = Array1::from_elem(y.len(), init);
            let mut stages = Vec::with_capacity(self.params.n_estimators);
            for stage in 0..self.params.n_estimators {
                let residual = y - &f.mapv(sigmoid);
                let tree = fit_stage(&self.params, stage, x, &residual);
                f.scaled_add(self.params.learning_rate, &tree.predict_values(x));
                stages.push(vec![tree]);
            }
            ClassifierState {
                init: vec![init],
                stages,
                n_classes,
            }
        } else {
            let init: Vec<f64> = priors.iter().map(|&p| p.max(1e-15).ln()).collect();
            let mut f = Array2::zeros((y.len(), n_classes));
            for (k, &v) in init.iter().enumerate() {
                f.column_mut(k).fill(v);
            }
            let mut stages = Vec::with_capacity(self.params.n_estimators);
            for stage in 0..self.params.n_estimators {
                let proba = softmax_rows(&f);
                let mut trees = Vec::with_capacity(n_classes);
                for k in 0..n_classes {
                    let residual: Array1<f64> = y
                        .iter()
                        .zip(proba.column(k))
                        .map(|(&yi, &p)| if yi as usize == k { 1.0 - p } else { -p })
                        .collect();
                    let tree = fit_stage(&self.params, stage, x, &residual);
                    f.column_mut(k)
                        .scaled_add(self.params.learning_rate, &tree.predict_values(x));
                    trees.push(tree);
                }
                stages.push(trees);
            }
            ClassifierState {
                init,
                stages,
                n_classes,
            }
        };

        self.fitted = Some(state);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let state = self
            .fitted
            .as_ref()
            .ok_or_else(|| LearningError::NotFitted("Gradient Boosting Classifier".into()))?;
        Ok(argmax_rows(&self.probabilities(state, x)))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        Some(
            self.fitted
                .as_ref()
                .map(|state| self.probabilities(state, x))
                .ok_or_else(|| LearningError::NotFitted("Gradient Boosting Classifier".into())),
        )
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.fitted.as_ref().map(|state| {
            let trees: Vec<Tree> = state.stages.iter().flatten().cloned().collect();
            let n_features = trees.first().map_or(0, |t| t.importances().len());
            summed_importances(&trees, n_features)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor_reduces_error() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.0, 4.0, 9.0, 16.0, 25.0, 36.0];
        let mut model = GradientBoostingRegressor::default();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        let mse = (&pred - &y).mapv(|d| d * d).mean().unwrap();
        assert!(mse < 1.0, "mse = {mse}");
    }

    #[test]
    fn test_binary_classifier() {
        let x = array![[0.0], [1.0], [2.0], [8.0], [9.0], [10.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = GradientBoostingClassifier::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        let proba = model.predict_proba(&x).unwrap().unwrap();
        assert!(proba[[5, 1]] > 0.8);
    }

    #[test]
    fn test_multiclass_classifier() {
        let x = array![[0.0], [0.5], [5.0], [5.5], [10.0], [10.5]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let mut model = GradientBoostingClassifier::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        assert_eq!(model.predict_proba(&x).unwrap().unwrap().ncols(), 3);
    }

    #[test]
    fn test_single_class_fails() {
        let mut model = GradientBoostingClassifier::default();
        let err = model.fit(&array![[1.0], [2.0]], &array![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, LearningError::TrainingFailed { .. }));
    }
}

//! Linear models.
//!
//! All models fit an intercept by centring `x` and `y` first. Penalties
//! follow the usual `1/(2n)·‖y − Xw‖² + α·penalty(w)` convention, so the
//! coordinate-descent solvers scale the L1/L2 terms by `n`.

use ndarray::{Array1, Array2, Axis};

use super::{Estimator, argmax_rows, check_fit_input, class_count};
use crate::error::{LearningError, Result};
use crate::linalg;

/// Fitted coefficients and intercept.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    pub coef: Array1<f64>,
    pub intercept: f64,
}

impl LinearFit {
    fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&self.coef) + self.intercept
    }
}

fn centre(x: &Array2<f64>, y: &Array1<f64>) -> (Array2<f64>, Array1<f64>, Array1<f64>, f64) {
    let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
    let y_mean = y.mean().unwrap_or(0.0);
    (x - &x_mean, y - y_mean, x_mean, y_mean)
}

/// Closed-form ridge (or ordinary least squares when `alpha == 0`).
fn fit_ridge(model: &str, x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<LinearFit> {
    let (xc, yc, x_mean, y_mean) = centre(x, y);
    let coef = linalg::least_squares(&xc, &yc, alpha)
        .ok_or_else(|| LearningError::training(model, "singular normal equations"))?;
    let intercept = y_mean - x_mean.dot(&coef);
    Ok(LinearFit { coef, intercept })
}

/// Coordinate descent for the elastic-net objective.
fn fit_elastic_net(x: &Array2<f64>, y: &Array1<f64>, alpha: f64, l1_ratio: f64) -> LinearFit {
    const MAX_ITER: usize = 1000;
    const TOL: f64 = 1e-4;

    let (xc, yc, x_mean, y_mean) = centre(x, y);
    let n = x.nrows() as f64;
    let p = x.ncols();
    let l1 = n * alpha * l1_ratio;
    let l2 = n * alpha * (1.0 - l1_ratio);
    let col_sq: Vec<f64> = xc.columns().into_iter().map(|c| c.dot(&c)).collect();

    let mut w = Array1::<f64>::zeros(p);
    let mut residual = yc;
    for _ in 0..MAX_ITER {
        let mut max_step: f64 = 0.0;
        for j in 0..p {
            if col_sq[j] == 0.0 {
                continue;
            }
            let col = xc.column(j);
            let old = w[j];
            let rho = col.dot(&residual) + col_sq[j] * old;
            let new = soft_threshold(rho, l1) / (col_sq[j] + l2);
            let step = new - old;
            if step != 0.0 {
                residual.scaled_add(-step, &col);
                w[j] = new;
            }
            max_step = max_step.max(step.abs());
        }
        if max_step < TOL {
            break;
        }
    }

    let intercept = y_mean - x_mean.dot(&w);
    LinearFit { coef: w, intercept }
}

fn soft_threshold(v: f64, lambda: f64) -> f64 {
    if v > lambda {
        v - lambda
    } else if v < -lambda {
        v + lambda
    } else {
        0.0
    }
}

macro_rules! linear_regressor {
    ($(#[$doc:meta])* $name:ident, $label:literal, |$x:ident, $y:ident| $fit:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default)]
        pub struct $name {
            fitted: Option<LinearFit>,
        }

        impl $name {
            /// Fitted coefficients, if any.
            pub fn fitted(&self) -> Option<&LinearFit> {
                self.fitted.as_ref()
            }
        }

        impl Estimator for $name {
            fn fit(&mut self, $x: &Array2<f64>, $y: &Array1<f64>) -> Result<()> {
                check_fit_input($label, $x, $y)?;
                self.fitted = Some($fit);
                Ok(())
            }

            fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
                self.fitted
                    .as_ref()
                    .map(|f| f.predict(x))
                    .ok_or_else(|| LearningError::NotFitted($label.into()))
            }
        }
    };
}

linear_regressor!(
    /// Ordinary least squares. Rank-deficient designs get a `1e-8` ridge.
    LinearRegression, "Linear Regression", |x, y| fit_ridge("Linear Regression", x, y, 0.0)?
);
linear_regressor!(
    /// L2-penalized least squares, `alpha = 1`.
    Ridge, "Ridge Regression", |x, y| fit_ridge("Ridge Regression", x, y, 1.0)?
);
linear_regressor!(
    /// L1-penalized least squares, `alpha = 1`.
    Lasso, "Lasso", |x, y| fit_elastic_net(x, y, 1.0, 1.0)
);
linear_regressor!(
    /// Mixed L1/L2 penalty, `alpha = 1`, `l1_ratio = 0.5`.
    ElasticNet, "Elastic Net", |x, y| fit_elastic_net(x, y, 1.0, 0.5)
);

/// Column-wise standardization learned at fit time.
#[derive(Debug, Clone)]
struct Standardizer {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    fn fit(x: &Array2<f64>) -> Self {
        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 { s } else { 1.0 });
        Self { mean, scale }
    }

    fn apply(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.scale
    }
}

fn one_hot(y: &Array1<f64>, n_classes: usize, on: f64, off: f64) -> Array2<f64> {
    let mut out = Array2::from_elem((y.len(), n_classes), off);
    for (r, &label) in y.iter().enumerate() {
        out[[r, label as usize]] = on;
    }
    out
}

fn require_two_classes(model: &str, y: &Array1<f64>) -> Result<()> {
    let first = y.first().copied().unwrap_or(0.0);
    if y.iter().all(|&v| v == first) {
        return Err(LearningError::training(
            model,
            "needs samples of at least 2 classes",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct SoftmaxFit {
    scaler: Standardizer,
    weights: Array2<f64>,
    bias: Array1<f64>,
}

/// Multinomial logistic regression with an L2 penalty (`C = 1`),
/// trained by full-batch gradient descent on standardized features.
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    fitted: Option<SoftmaxFit>,
}

impl LogisticRegression {
    const MAX_ITER: usize = 1000;
    const LEARNING_RATE: f64 = 0.5;
    const C: f64 = 1.0;

    fn state(&self) -> Result<&SoftmaxFit> {
        self.fitted
            .as_ref()
            .ok_or_else(|| LearningError::NotFitted("Logistic Regression".into()))
    }

    fn softmax(fit: &SoftmaxFit, xs: &Array2<f64>) -> Array2<f64> {
        let mut z = xs.dot(&fit.weights) + &fit.bias;
        for mut row in z.axis_iter_mut(Axis(0)) {
            let max = row.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        z
    }
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input("Logistic Regression", x, y)?;
        require_two_classes("Logistic Regression", y)?;

        let n_classes = class_count(y);
        let scaler = Standardizer::fit(x);
        let xs = scaler.apply(x);
        let target = one_hot(y, n_classes, 1.0, 0.0);
        let n = x.nrows() as f64;

        let mut fit = SoftmaxFit {
            scaler,
            weights: Array2::zeros((x.ncols(), n_classes)),
            bias: Array1::zeros(n_classes),
        };
        for _ in 0..Self::MAX_ITER {
            let grad_out = (Self::softmax(&fit, &xs) - &target) / n;
            let grad_w = xs.t().dot(&grad_out) + &fit.weights / (Self::C * n);
            let grad_b = grad_out.sum_axis(Axis(0));
            fit.weights.scaled_add(-Self::LEARNING_RATE, &grad_w);
            fit.bias.scaled_add(-Self::LEARNING_RATE, &grad_b);
        }

        self.fitted = Some(fit);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fit = self.state()?;
        Ok(argmax_rows(&Self::softmax(fit, &fit.scaler.apply(x))))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        Some(
            self.state()
                .map(|fit| Self::softmax(fit, &fit.scaler.apply(x))),
        )
    }
}

/// One-vs-all ridge regression on `±1` targets (`alpha = 1`).
///
/// Has no probability model, so the sweep scores its AUC from zeros.
#[derive(Debug, Clone, Default)]
pub struct RidgeClassifier {
    fitted: Option<Vec<LinearFit>>,
}

impl Estimator for RidgeClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input("Ridge Classifier", x, y)?;
        require_two_classes("Ridge Classifier", y)?;

        let targets = one_hot(y, class_count(y), 1.0, -1.0);
        let fits = targets
            .columns()
            .into_iter()
            .map(|t| fit_ridge("Ridge Classifier", x, &t.to_owned(), 1.0))
            .collect::<Result<Vec<_>>>()?;
        self.fitted = Some(fits);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fits = self
            .fitted
            .as_ref()
            .ok_or_else(|| LearningError::NotFitted("Ridge Classifier".into()))?;
        let mut scores = Array2::zeros((x.nrows(), fits.len()));
        for (k, fit) in fits.iter().enumerate() {
            scores.column_mut(k).assign(&fit.predict(x));
        }
        Ok(argmax_rows(&scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line() -> (Array2<f64>, Array1<f64>) {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0], [5.0, 0.0]];
        let y = x.column(0).mapv(|v| 3.0 * v + 2.0) + x.column(1).mapv(|v| -v);
        (x, y)
    }

    #[test]
    fn test_linear_regression_exact() {
        let (x, y) = line();
        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();
        let fit = model.fitted().unwrap();
        assert!((fit.coef[0] - 3.0).abs() < 1e-9);
        assert!((fit.coef[1] + 1.0).abs() < 1e-9);
        assert!((fit.intercept - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_regression_collinear_falls_back() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!((pred[2] - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_ridge_shrinks() {
        let (x, y) = line();
        let mut ols = LinearRegression::default();
        let mut ridge = Ridge::default();
        ols.fit(&x, &y).unwrap();
        ridge.fit(&x, &y).unwrap();
        assert!(ridge.fitted().unwrap().coef[0].abs() < ols.fitted().unwrap().coef[0].abs());
    }

    #[test]
    fn test_lasso_zeroes_weak_feature() {
        let x = array![[1.0, 0.01], [2.0, -0.01], [3.0, 0.01], [4.0, -0.01]];
        let y = array![10.0, 20.0, 30.0, 40.0];
        let mut model = Lasso::default();
        model.fit(&x, &y).unwrap();
        let fit = model.fitted().unwrap();
        assert_eq!(fit.coef[1], 0.0);
        assert!(fit.coef[0] > 8.0);
    }

    #[test]
    fn test_logistic_regression_separable() {
        let x = array![[0.0], [1.0], [2.0], [8.0], [9.0], [10.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        let proba = model.predict_proba(&x).unwrap().unwrap();
        assert!(proba[[0, 0]] > 0.5 && proba[[5, 1]] > 0.5);
    }

    #[test]
    fn test_ridge_classifier_multiclass() {
        let x = array![[0.0, 0.0], [0.5, 0.0], [10.0, 0.0], [10.5, 0.0], [0.0, 10.0], [0.0, 10.5]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let mut model = RidgeClassifier::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        assert!(model.predict_proba(&x).is_none());
    }

    #[test]
    fn test_single_class_rejected() {
        let mut model = LogisticRegression::default();
        assert!(model.fit(&array![[1.0], [2.0]], &array![0.0, 0.0]).is_err());
    }
}

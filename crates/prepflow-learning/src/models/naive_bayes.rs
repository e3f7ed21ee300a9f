//! Gaussian naive Bayes.

use ndarray::{Array1, Array2, Axis};

use super::{Estimator, argmax_rows, check_fit_input, class_count};
use crate::error::{LearningError, Result};

/// Portion of the largest feature variance added to every variance.
const VAR_SMOOTHING: f64 = 1e-9;

#[derive(Debug, Clone)]
struct ClassStats {
    log_prior: f64,
    mean: Array1<f64>,
    var: Array1<f64>,
}

/// Per-class independent Gaussians. Classes absent from training get zero probability.
#[derive(Debug, Clone, Default)]
pub struct GaussianNB {
    fitted: Option<Vec<Option<ClassStats>>>,
}

impl GaussianNB {
    fn joint_log_likelihood(stats: &[Option<ClassStats>], x: &Array2<f64>) -> Array2<f64> {
        let mut out = Array2::from_elem((x.nrows(), stats.len()), f64::NEG_INFINITY);
        for (k, class) in stats.iter().enumerate() {
            let Some(class) = class else { continue };
            let norm: f64 = class
                .var
                .iter()
                .map(|v| (2.0 * std::f64::consts::PI * v).ln())
                .sum::<f64>()
                * -0.5;
            for (r, row) in x.rows().into_iter().enumerate() {
                let quad: f64 = row
                    .iter()
                    .zip(class.mean.iter().zip(&class.var))
                    .map(|(xi, (m, v))| (xi - m).powi(2) / v)
                    .sum();
                out[[r, k]] = class.log_prior + norm - 0.5 * quad;
            }
        }
        out
    }

    fn proba(stats: &[Option<ClassStats>], x: &Array2<f64>) -> Array2<f64> {
        let mut jll = Self::joint_log_likelihood(stats, x);
        for mut row in jll.axis_iter_mut(Axis(0)) {
            let max = row.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        jll
    }
}

impl Estimator for GaussianNB {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input("Naïve Bayes", x, y)?;
        let n = x.nrows() as f64;
        let epsilon = VAR_SMOOTHING
            * x.var_axis(Axis(0), 0.0)
                .iter()
                .fold(0.0_f64, |m, &v| m.max(v));

        let stats = (0..class_count(y))
            .map(|k| {
                let rows: Vec<usize> = y
                    .iter()
                    .enumerate()
                    .filter(|&(_, &v)| v as usize == k)
                    .map(|(i, _)| i)
                    .collect();
                if rows.is_empty() {
                    return None;
                }
                let subset = x.select(Axis(0), &rows);
                let mean = subset.mean_axis(Axis(0))?;
                let var = subset.var_axis(Axis(0), 0.0).mapv(|v| v + epsilon);
                Some(ClassStats {
                    log_prior: (rows.len() as f64 / n).ln(),
                    mean,
                    var,
                })
            })
            .collect::<Vec<_>>();

        if stats.iter().any(|s| s.as_ref().is_some_and(|c| c.var.iter().any(|&v| v <= 0.0))) {
            return Err(LearningError::training(
                "Naïve Bayes",
                "zero variance in every feature",
            ));
        }

        self.fitted = Some(stats);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let stats = self
            .fitted
            .as_ref()
            .ok_or_else(|| LearningError::NotFitted("Naïve Bayes".into()))?;
        Ok(argmax_rows(&Self::joint_log_likelihood(stats, x)))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        Some(
            self.fitted
                .as_ref()
                .map(|stats| Self::proba(stats, x))
                .ok_or_else(|| LearningError::NotFitted("Naïve Bayes".into())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_gaussian_nb_separates() {
        let x = array![[0.0, 1.0], [0.5, 1.5], [1.0, 0.5], [8.0, 9.0], [8.5, 9.5], [9.0, 8.5]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = GaussianNB::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);

        let proba = model.predict_proba(&x).unwrap().unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_features_fail() {
        let x = array![[1.0], [1.0]];
        let y = array![0.0, 1.0];
        let mut model = GaussianNB::default();
        assert!(model.fit(&x, &y).is_err());
    }
}

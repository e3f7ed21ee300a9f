//! k-nearest-neighbour models (Euclidean distance, uniform weights, k = 5).

use ndarray::{Array1, Array2, ArrayView1};

use super::{Estimator, argmax_rows, check_fit_input, class_count};
use crate::error::{LearningError, Result};

const DEFAULT_K: usize = 5;

#[derive(Debug, Clone)]
struct Memory {
    x: Array2<f64>,
    y: Array1<f64>,
}

impl Memory {
    /// Indices of the `k` closest training rows; ties keep training order.
    fn neighbours(&self, query: ArrayView1<'_, f64>, k: usize) -> Vec<usize> {
        let mut dist: Vec<(f64, usize)> = self
            .x
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let d: f64 = row.iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum();
                (d, i)
            })
            .collect();
        dist.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        dist.into_iter().take(k).map(|(_, i)| i).collect()
    }
}

/// Majority vote among the nearest neighbours.
#[derive(Debug, Clone)]
pub struct KNeighborsClassifier {
    k: usize,
    fitted: Option<(Memory, usize)>,
}

impl Default for KNeighborsClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

impl KNeighborsClassifier {
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            fitted: None,
        }
    }

    fn votes(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (memory, n_classes) = self
            .fitted
            .as_ref()
            .ok_or_else(|| LearningError::NotFitted("K Neighbors Classifier".into()))?;
        let k = self.k.min(memory.x.nrows());
        let mut out = Array2::zeros((x.nrows(), *n_classes));
        for (r, row) in x.rows().into_iter().enumerate() {
            for i in memory.neighbours(row, k) {
                out[[r, memory.y[i] as usize]] += 1.0 / k as f64;
            }
        }
        Ok(out)
    }
}

impl Estimator for KNeighborsClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input("K Neighbors Classifier", x, y)?;
        self.fitted = Some((
            Memory {
                x: x.clone(),
                y: y.clone(),
            },
            class_count(y),
        ));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(argmax_rows(&self.votes(x)?))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        Some(self.votes(x))
    }
}

/// Mean target of the nearest neighbours.
#[derive(Debug, Clone)]
pub struct KNeighborsRegressor {
    k: usize,
    fitted: Option<Memory>,
}

impl Default for KNeighborsRegressor {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

impl KNeighborsRegressor {
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            fitted: None,
        }
    }
}

impl Estimator for KNeighborsRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input("KNN Regressor", x, y)?;
        self.fitted = Some(Memory {
            x: x.clone(),
            y: y.clone(),
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let memory = self
            .fitted
            .as_ref()
            .ok_or_else(|| LearningError::NotFitted("KNN Regressor".into()))?;
        let k = self.k.min(memory.x.nrows());
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let idx = memory.neighbours(row, k);
                idx.iter().map(|&i| memory.y[i]).sum::<f64>() / k as f64
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_vote() {
        let x = array![[0.0], [0.1], [0.2], [5.0], [5.1], [5.2]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = KNeighborsClassifier::new(3);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&array![[0.05], [5.05]]).unwrap(), array![0.0, 1.0]);
        let proba = model.predict_proba(&array![[0.05]]).unwrap().unwrap();
        assert!((proba[[0, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let x = array![[0.0], [1.0]];
        let y = array![2.0, 4.0];
        let mut model = KNeighborsRegressor::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&array![[0.0]]).unwrap(), array![3.0]);
    }
}

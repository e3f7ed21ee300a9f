//! Native estimators.
//!
//! Every model implements [`Estimator`]. Classifiers receive class indices
//! (`0.0, 1.0, ...`) as targets and predict indices back; the number of
//! classes is `max(y_train) + 1`.

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod naive_bayes;
pub mod neighbors;
pub mod tree;

use ndarray::{Array1, Array2};

use crate::error::Result;

pub use boosting::{GradientBoostingClassifier, GradientBoostingRegressor};
pub use forest::{ExtraTreesClassifier, ExtraTreesRegressor, RandomForestClassifier, RandomForestRegressor};
pub use linear::{ElasticNet, Lasso, LinearRegression, LogisticRegression, Ridge, RidgeClassifier};
pub use naive_bayes::GaussianNB;
pub use neighbors::{KNeighborsClassifier, KNeighborsRegressor};
pub use tree::{DecisionTreeClassifier, DecisionTreeRegressor, MaxFeatures, TreeParams};

/// A trainable model.
///
/// Estimators are created fresh for every sweep run by a
/// [`ModelFactory`](crate::registry::ModelFactory), so `fit` may assume a
/// blank instance.
pub trait Estimator: Send {
    /// Fit on a feature matrix and target vector.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict one value (or class index) per row.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Class probabilities, one column per class index.
    ///
    /// `None` for regressors and for classifiers without a probability model.
    fn predict_proba(&self, _x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        None
    }

    /// Normalized feature importances, when the model defines them.
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Number of classes implied by index-encoded labels.
pub(crate) fn class_count(y: &Array1<f64>) -> usize {
    y.iter().fold(0.0_f64, |m, &v| m.max(v)) as usize + 1
}

/// Row-wise argmax; ties resolve to the lowest column.
pub(crate) fn argmax_rows(proba: &Array2<f64>) -> Array1<f64> {
    proba
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (i, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = i;
                }
            }
            best as f64
        })
        .collect()
}

/// Validate shapes shared by every `fit` implementation.
pub(crate) fn check_fit_input(model: &str, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(crate::LearningError::training(model, "empty training set"));
    }
    if x.nrows() != y.len() {
        return Err(crate::LearningError::training(
            model,
            format!("x has {} rows but y has {}", x.nrows(), y.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_class_count() {
        assert_eq!(class_count(&array![0.0, 2.0, 1.0]), 3);
        assert_eq!(class_count(&array![0.0, 0.0]), 1);
    }

    #[test]
    fn test_argmax_ties_pick_first() {
        let proba = array![[0.5, 0.5], [0.2, 0.8]];
        assert_eq!(argmax_rows(&proba), array![0.0, 1.0]);
    }
}

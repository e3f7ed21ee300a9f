//! Task-specific evaluation metrics.
//!
//! Classification metrics work on class indices (see [`Dataset`](crate::Dataset)).
//! Precision, recall and F1 are support-weighted over the labels present in
//! either `y_true` or `y_pred`; a label with no predicted (or no true) samples
//! contributes zero for the undefined ratio.

use std::collections::BTreeMap;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{LearningError, Result};

/// Error type returned by user-supplied metric functions.
pub type MetricError = Box<dyn std::error::Error + Send + Sync>;

/// A user-supplied metric `f(y_true, y_pred)`.
///
/// Functions returning `Err` are recorded as `None` for that model.
pub type MetricFn =
    Arc<dyn Fn(&Array1<f64>, &Array1<f64>) -> std::result::Result<f64, MetricError> + Send + Sync>;

/// Wrap a closure as a [`MetricFn`].
pub fn metric_fn<F>(f: F) -> MetricFn
where
    F: Fn(&Array1<f64>, &Array1<f64>) -> std::result::Result<f64, MetricError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Classification scores on the held-out split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    /// ROC AUC from the positive-class probability; `0.0` when not binary.
    pub auc: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Regression scores on the held-out split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    /// `NaN` when any target is non-positive or any prediction is negative.
    pub rmsle: f64,
    /// `NaN` when there are no samples.
    pub mape: f64,
}

/// Metrics for one model, tagged by task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskMetrics {
    Classification(ClassificationMetrics),
    Regression(RegressionMetrics),
}

impl TaskMetrics {
    /// Accuracy for classification, R² for regression.
    pub fn primary(&self) -> f64 {
        match self {
            TaskMetrics::Classification(m) => m.accuracy,
            TaskMetrics::Regression(m) => m.r2,
        }
    }

    /// Named values in display order.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        match self {
            TaskMetrics::Classification(m) => vec![
                ("Accuracy", m.accuracy),
                ("AUC", m.auc),
                ("Precision", m.precision),
                ("Recall", m.recall),
                ("F1", m.f1),
            ],
            TaskMetrics::Regression(m) => vec![
                ("R2", m.r2),
                ("MAE", m.mae),
                ("MSE", m.mse),
                ("RMSE", m.rmse),
                ("RMSLE", m.rmsle),
                ("MAPE", m.mape),
            ],
        }
    }
}

/// Compute classification metrics.
///
/// `proba` is the predicted probability matrix; when it has exactly two
/// columns, AUC is computed from column 1, otherwise AUC is `0.0`.
///
/// # Errors
///
/// Fails when the binary AUC is undefined because `y_true` holds a single class.
pub fn classification_metrics(
    y_true: &Array1<f64>,
    y_pred: &Array1<f64>,
    proba: &Array2<f64>,
) -> Result<ClassificationMetrics> {
    let auc = if proba.ncols() == 2 {
        roc_auc(y_true, &proba.column(1).to_owned())?
    } else {
        0.0
    };
    let (precision, recall, f1) = weighted_prf(y_true, y_pred);

    Ok(ClassificationMetrics {
        accuracy: accuracy(y_true, y_pred),
        auc,
        precision,
        recall,
        f1,
    })
}

/// Compute regression metrics.
pub fn regression_metrics(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> RegressionMetrics {
    let mse = mean_squared_error(y_true, y_pred);
    RegressionMetrics {
        r2: r2_score(y_true, y_pred),
        mae: mean_absolute_error(y_true, y_pred),
        mse,
        rmse: mse.sqrt(),
        rmsle: root_mean_squared_log_error(y_true, y_pred),
        mape: mean_absolute_percentage_error(y_true, y_pred),
    }
}

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return f64::NAN;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    hits as f64 / y_true.len() as f64
}

/// Binary ROC AUC via the Mann-Whitney statistic with mid-ranks for ties.
///
/// Labels equal to `1.0` are positive.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    let n_pos = y_true.iter().filter(|&&y| y == 1.0).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(LearningError::MetricFailed {
            metric: "AUC".to_string(),
            reason: "only one class present in y_true".to_string(),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let mid = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = mid;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|&(&y, _)| y == 1.0)
        .map(|(_, &r)| r)
        .sum();
    let n_pos = n_pos as f64;
    Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

/// Support-weighted precision, recall and F1.
pub fn weighted_prf(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (f64, f64, f64) {
    #[derive(Default)]
    struct Counts {
        tp: usize,
        predicted: usize,
        support: usize,
    }

    let mut per_label: BTreeMap<i64, Counts> = BTreeMap::new();
    for (&t, &p) in y_true.iter().zip(y_pred) {
        let (t, p) = (t as i64, p as i64);
        per_label.entry(t).or_default().support += 1;
        per_label.entry(p).or_default().predicted += 1;
        if t == p {
            per_label.entry(t).or_default().tp += 1;
        }
    }

    let total = y_true.len() as f64;
    if total == 0.0 {
        return (0.0, 0.0, 0.0);
    }

    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for counts in per_label.values() {
        let weight = counts.support as f64 / total;
        let p = ratio(counts.tp, counts.predicted);
        let r = ratio(counts.tp, counts.support);
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }
    (precision, recall, f1)
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Coefficient of determination.
///
/// A constant `y_true` scores `1.0` for a perfect fit and `0.0` otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return f64::NAN;
    }
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(f64::abs).mean().unwrap_or(f64::NAN)
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(|d| d * d).mean().unwrap_or(f64::NAN)
}

/// `sqrt(mean((ln(1+t) - ln(1+p))²))`, or `NaN` when the log is undefined.
pub fn root_mean_squared_log_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.iter().any(|&t| t <= 0.0) || y_pred.iter().any(|&p| p < 0.0) {
        return f64::NAN;
    }
    if y_true.is_empty() {
        return f64::NAN;
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t.ln_1p() - p.ln_1p()).powi(2))
        .sum();
    (sum / y_true.len() as f64).sqrt()
}

/// Mean of `|t - p| / max(|t|, ε)`.
pub fn mean_absolute_percentage_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return f64::NAN;
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs() / t.abs().max(f64::EPSILON))
        .sum();
    sum / y_true.len() as f64
}

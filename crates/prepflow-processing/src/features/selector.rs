//! Feature selection against a target column.

use std::collections::HashMap;

use ndarray::Axis;
use polars::prelude::*;
use prepflow_learning::models::{RandomForestClassifier, RandomForestRegressor};
use prepflow_learning::{Dataset, Estimator, LearningError, TaskType};
use tracing::{debug, info, warn};

use crate::config::SelectionMethod;
use crate::error::Result;
use crate::utils::{
    column_f64, column_names, column_strings, correlation, is_numeric_dtype, valid_values,
    variance,
};

const RFE_TREES: usize = 100;
const RFE_SEED: u64 = 42;

#[derive(Debug, Clone)]
pub struct FeatureSelector {
    method: SelectionMethod,
    k_features: usize,
    task: TaskType,
}

impl FeatureSelector {
    pub fn new(method: SelectionMethod, k_features: usize, task: TaskType) -> Self {
        Self {
            method,
            k_features,
            task,
        }
    }

    /// Keep at most `k_features` numeric feature columns plus the target.
    ///
    /// Returns the reduced frame (selected features, then the target) and
    /// the selected names. Non-numeric features are never selected.
    pub fn select(&self, df: &DataFrame, target: &str) -> Result<(DataFrame, Vec<String>)> {
        let mut candidates = Vec::new();
        for name in column_names(df).into_iter().filter(|c| c != target) {
            if is_numeric_dtype(df.column(&name)?.dtype()) {
                candidates.push(name);
            } else {
                warn!("Excluding non-numeric column '{}' from feature selection", name);
            }
        }
        let k = self.k_features.min(candidates.len());
        info!(
            "Selecting {} of {} feature(s) by {:?}...",
            k,
            candidates.len(),
            self.method
        );

        let selected = match self.method {
            SelectionMethod::Univariate => {
                let scores = self.univariate_scores(df, &candidates, target)?;
                in_column_order(&candidates, top_k(&scores, k))
            }
            SelectionMethod::Rfe => self.recursive_elimination(df, &candidates, target, k)?,
            SelectionMethod::Variance => {
                let scores: Vec<f64> = candidates
                    .iter()
                    .map(|c| {
                        Ok(variance(&valid_values(&column_f64(df, c)?), 1).unwrap_or(f64::NAN))
                    })
                    .collect::<Result<_>>()?;
                top_k(&scores, k)
                    .into_iter()
                    .map(|i| candidates[i].clone())
                    .collect()
            }
        };
        debug!("Selected features: {:?}", selected);

        let mut keep = selected.clone();
        keep.push(target.to_string());
        Ok((df.select(keep)?, selected))
    }

    fn univariate_scores(
        &self,
        df: &DataFrame,
        candidates: &[String],
        target: &str,
    ) -> Result<Vec<f64>> {
        match self.task {
            TaskType::Classification => {
                let labels = column_strings(df, target)?;
                candidates
                    .iter()
                    .map(|c| Ok(f_classif(&column_f64(df, c)?, &labels)))
                    .collect()
            }
            _ => {
                let y = column_f64(df, target)?;
                candidates
                    .iter()
                    .map(|c| Ok(f_regression(&column_f64(df, c)?, &y)))
                    .collect()
            }
        }
    }

    /// Drop the least important feature one at a time until `k` remain.
    fn recursive_elimination(
        &self,
        df: &DataFrame,
        candidates: &[String],
        target: &str,
        k: usize,
    ) -> Result<Vec<String>> {
        let mut columns = candidates.to_vec();
        columns.push(target.to_string());
        let data = Dataset::from_frame(&df.select(columns)?, target, self.task)?;

        let mut remaining: Vec<usize> = (0..candidates.len()).collect();
        while remaining.len() > k {
            let x = data.x.select(Axis(1), &remaining);
            let mut estimator: Box<dyn Estimator> = match self.task {
                TaskType::Classification => {
                    Box::new(RandomForestClassifier::new(RFE_SEED).with_estimators(RFE_TREES))
                }
                _ => Box::new(RandomForestRegressor::new(RFE_SEED).with_estimators(RFE_TREES)),
            };
            estimator.fit(&x, &data.y)?;
            let importances = estimator.feature_importances().ok_or_else(|| {
                LearningError::InvalidData("estimator has no feature importances".to_string())
            })?;

            let weakest = importances
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1).then(a.0.cmp(&b.0)))
                .map_or(0, |(i, _)| i);
            debug!(
                "RFE: dropping '{}' ({} left)",
                candidates[remaining[weakest]],
                remaining.len() - 1
            );
            remaining.remove(weakest);
        }

        Ok(remaining.into_iter().map(|i| candidates[i].clone()).collect())
    }
}

/// Indices of the `k` highest scores, best first; NaN ranks last, ties by index.
fn top_k(scores: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        let (x, y) = (scores[a], scores[b]);
        match (x.is_nan(), y.is_nan()) {
            (true, true) => a.cmp(&b),
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => y.total_cmp(&x).then(a.cmp(&b)),
        }
    });
    order.truncate(k);
    order
}

fn in_column_order(candidates: &[String], mut picked: Vec<usize>) -> Vec<String> {
    picked.sort_unstable();
    picked.into_iter().map(|i| candidates[i].clone()).collect()
}

/// One-way ANOVA F statistic of `x` grouped by `labels`.
fn f_classif(x: &[Option<f64>], labels: &[Option<String>]) -> f64 {
    let mut groups: HashMap<&str, (f64, usize)> = HashMap::new();
    let (mut sum, mut sum_sq, mut n) = (0.0, 0.0, 0usize);
    for (value, label) in x.iter().zip(labels) {
        if let (Some(v), Some(label)) = (value, label)
            && !v.is_nan()
        {
            let group = groups.entry(label.as_str()).or_insert((0.0, 0));
            group.0 += v;
            group.1 += 1;
            sum += v;
            sum_sq += v * v;
            n += 1;
        }
    }
    let k = groups.len();
    if k < 2 || n <= k {
        return f64::NAN;
    }
    let correction = sum * sum / n as f64;
    let ss_total = sum_sq - correction;
    let ss_between = groups
        .values()
        .map(|(s, c)| s * s / *c as f64)
        .sum::<f64>()
        - correction;
    let ss_within = ss_total - ss_between;
    let ms_between = ss_between / (k - 1) as f64;
    let ms_within = ss_within / (n - k) as f64;
    ms_between / ms_within
}

/// F statistic of the univariate linear regression of `y` on `x`.
fn f_regression(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
    let n = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_some_and(|v| !v.is_nan()) && b.is_some_and(|v| !v.is_nan()))
        .count();
    if n < 3 {
        return f64::NAN;
    }
    match correlation(x, y) {
        Some(r) => r * r / (1.0 - r * r) * (n - 2) as f64,
        None => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame() -> DataFrame {
        df![
            "noise" => [0.3, 0.1, 0.4, 0.1, 0.5, 0.9, 0.2, 0.6],
            "signal" => [0.0, 0.1, 0.2, 0.1, 5.0, 5.1, 5.2, 5.3],
            "wide" => [100.0, -100.0, 50.0, -50.0, 100.0, -100.0, 50.0, -50.0],
            "city" => ["a", "b", "a", "b", "a", "b", "a", "b"],
            "target" => [0i64, 0, 0, 0, 1, 1, 1, 1],
        ]
        .unwrap()
    }

    #[test]
    fn test_univariate_classification() {
        let selector = FeatureSelector::new(SelectionMethod::Univariate, 1, TaskType::Classification);
        let (out, selected) = selector.select(&frame(), "target").unwrap();
        assert_eq!(selected, vec!["signal"]);
        assert_eq!(column_names(&out), vec!["signal", "target"]);
    }

    #[test]
    fn test_k_larger_than_candidates() {
        let selector = FeatureSelector::new(SelectionMethod::Univariate, 10, TaskType::Regression);
        let (out, selected) = selector.select(&frame(), "target").unwrap();
        assert_eq!(selected, vec!["noise", "signal", "wide"]);
        assert_eq!(out.width(), 4);
    }

    #[test]
    fn test_variance_orders_by_variance() {
        let selector = FeatureSelector::new(SelectionMethod::Variance, 2, TaskType::Classification);
        let (_, selected) = selector.select(&frame(), "target").unwrap();
        assert_eq!(selected, vec!["wide", "signal"]);
    }

    #[test]
    fn test_rfe_keeps_k() {
        let selector = FeatureSelector::new(SelectionMethod::Rfe, 2, TaskType::Classification);
        let (out, selected) = selector.select(&frame(), "target").unwrap();
        assert_eq!(selected.len(), 2);
        assert!(selected.contains(&"signal".to_string()));
        assert_eq!(out.width(), 3);
    }

    #[test]
    fn test_f_statistics() {
        let x = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let perfect = f_regression(&x, &x);
        assert!(perfect.is_infinite() || perfect > 1e10);
        let labels: Vec<Option<String>> = ["a", "a", "b", "b"].iter().map(|s| Some(s.to_string())).collect();
        // between 4.0 over 1 df, within 1.0 over 2 df
        assert!((f_classif(&x, &labels) - 8.0).abs() < 1e-9);
        assert!(top_k(&[f64::NAN, 1.0, 3.0], 2) == vec![2, 1]);
    }
}

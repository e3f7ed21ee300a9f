//! Result types returned by the sweep.

use serde::Serialize;

use crate::config::TaskType;
use crate::error::LearningError;
use crate::metrics::TaskMetrics;

/// Scores for one successfully trained model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelResult {
    /// Registry name.
    pub model: String,
    pub metrics: TaskMetrics,
    /// Wall-clock seconds spent in `fit` only.
    pub training_time_secs: f64,
    /// User metrics in registration order; `None` where the function failed.
    pub custom_metrics: Vec<(String, Option<f64>)>,
}

impl ModelResult {
    /// Accuracy (classification) or R² (regression).
    pub fn primary_metric(&self) -> f64 {
        self.metrics.primary()
    }

    /// Look up a custom metric by name.
    pub fn custom_metric(&self, name: &str) -> Option<f64> {
        self.custom_metrics
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| *v)
    }
}

/// Outcome of one registry entry, success or failure.
#[derive(Debug, Serialize)]
pub struct ModelRun {
    pub name: String,
    pub outcome: Result<ModelResult, LearningError>,
}

/// Everything a sweep produced, in registry order.
#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub task: TaskType,
    pub n_train: usize,
    pub n_test: usize,
    pub runs: Vec<ModelRun>,
}

impl SweepReport {
    /// Successful results in registry order.
    pub fn results(&self) -> Vec<ModelResult> {
        self.runs
            .iter()
            .filter_map(|run| run.outcome.as_ref().ok().cloned())
            .collect()
    }

    /// Names and errors of models that were skipped.
    pub fn failures(&self) -> Vec<(&str, &LearningError)> {
        self.runs
            .iter()
            .filter_map(|run| run.outcome.as_ref().err().map(|e| (run.name.as_str(), e)))
            .collect()
    }
}

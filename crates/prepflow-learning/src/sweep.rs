//! Model sweep: train every registered model, score it, pick winners.

use std::time::Instant;

use polars::prelude::DataFrame;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cancellation::StopCondition;
use crate::config::{SweepConfig, TaskType};
use crate::data::{Dataset, TrainTestSplit, train_test_split};
use crate::error::{LearningError, Result};
use crate::metrics::{self, MetricFn, TaskMetrics};
use crate::registry::{ModelFactory, ModelRegistry};
use crate::types::{ModelResult, ModelRun, SweepReport};

/// Results at or above this primary score are treated as leakage artifacts.
pub const LEAKAGE_CUTOFF: f64 = 0.9999;

/// Trains a registry of estimators for one task.
///
/// # Example
///
/// ```rust,ignore
/// let sweep = ModelSweep::new(TaskType::Classification, SweepConfig::default())?;
/// let report = sweep.run(&df, "target")?;
/// let best = ModelSelector::new(TaskType::Classification).select_best(&report.results())?;
/// ```
pub struct ModelSweep {
    task: TaskType,
    config: SweepConfig,
    registry: ModelRegistry,
    custom_metrics: Vec<(String, MetricFn)>,
}

impl ModelSweep {
    /// Create a sweep over the built-in registry for `task`.
    ///
    /// # Errors
    ///
    /// [`LearningError::UnsupportedTask`] for clustering.
    pub fn new(task: TaskType, config: SweepConfig) -> Result<Self> {
        let registry = ModelRegistry::for_task(task, config.random_seed)?;
        Ok(Self {
            task,
            config,
            registry,
            custom_metrics: Vec::new(),
        })
    }

    /// Add or replace a model by name.
    #[must_use]
    pub fn with_model(mut self, name: impl Into<String>, make: ModelFactory) -> Self {
        self.registry.register(name, make);
        self
    }

    /// Add or replace a custom metric by name.
    #[must_use]
    pub fn with_metric(mut self, name: impl Into<String>, metric: MetricFn) -> Self {
        let name = name.into();
        match self.custom_metrics.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = metric,
            None => self.custom_metrics.push((name, metric)),
        }
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn task(&self) -> TaskType {
        self.task
    }

    /// Split `df` on `target` and run every model.
    pub fn run(&self, df: &DataFrame, target: &str) -> Result<SweepReport> {
        let data = Dataset::from_frame(df, target, self.task)?;
        let split = train_test_split(&data, self.config.test_size, self.config.random_seed)?;
        info!(
            "Model sweep: {} task, {} train / {} test rows, {} features",
            self.task,
            split.x_train.nrows(),
            split.x_test.nrows(),
            data.feature_names.len()
        );
        Ok(self.run_split(&split))
    }

    /// Run every model on a prepared split.
    pub fn run_split(&self, split: &TrainTestSplit) -> SweepReport {
        let stop = StopCondition::new(self.config.cancellation.clone(), self.config.deadline);
        let entries = self.registry.entries();

        let runs: Vec<ModelRun> = if self.config.parallel {
            entries
                .par_iter()
                .map(|(name, make)| self.run_one(name, make, split, &stop))
                .collect()
        } else {
            entries
                .iter()
                .map(|(name, make)| self.run_one(name, make, split, &stop))
                .collect()
        };

        let succeeded = runs.iter().filter(|r| r.outcome.is_ok()).count();
        info!("Training completed for {} of {} models", succeeded, runs.len());

        SweepReport {
            task: self.task,
            n_train: split.x_train.nrows(),
            n_test: split.x_test.nrows(),
            runs,
        }
    }

    fn run_one(
        &self,
        name: &str,
        make: &ModelFactory,
        split: &TrainTestSplit,
        stop: &StopCondition,
    ) -> ModelRun {
        let outcome = stop
            .check()
            .and_then(|()| self.evaluate(name, make, split));
        match &outcome {
            Ok(result) => debug!("{}: primary metric {:.4}", name, result.primary_metric()),
            Err(e) => warn!("Error training {}: {}", name, e),
        }
        ModelRun {
            name: name.to_string(),
            outcome,
        }
    }

    fn evaluate(&self, name: &str, make: &ModelFactory, split: &TrainTestSplit) -> Result<ModelResult> {
        let mut model = make();

        let start = Instant::now();
        model
            .fit(&split.x_train, &split.y_train)
            .map_err(|e| per_model(name, e))?;
        let training_time_secs = start.elapsed().as_secs_f64();

        let y_pred = model.predict(&split.x_test).map_err(|e| per_model(name, e))?;
        if y_pred.len() != split.y_test.len() {
            return Err(LearningError::training(
                name,
                format!("predicted {} rows, expected {}", y_pred.len(), split.y_test.len()),
            ));
        }

        let task_metrics = match self.task {
            TaskType::Classification => {
                let proba = match model.predict_proba(&split.x_test) {
                    Some(Ok(p)) if p.nrows() == split.y_test.len() => p,
                    _ => ndarray::Array2::zeros((split.y_test.len(), 2)),
                };
                TaskMetrics::Classification(
                    metrics::classification_metrics(&split.y_test, &y_pred, &proba)
                        .map_err(|e| per_model(name, e))?,
                )
            }
            _ => TaskMetrics::Regression(metrics::regression_metrics(&split.y_test, &y_pred)),
        };

        let custom_metrics = self
            .custom_metrics
            .iter()
            .map(|(metric_name, f)| {
                let value = match f(&split.y_test, &y_pred) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        debug!("Custom metric '{}' failed for {}: {}", metric_name, name, e);
                        None
                    }
                };
                (metric_name.clone(), value)
            })
            .collect();

        Ok(ModelResult {
            model: name.to_string(),
            metrics: task_metrics,
            training_time_secs,
            custom_metrics,
        })
    }
}

/// Fold any estimator error into a per-model training failure.
fn per_model(name: &str, err: LearningError) -> LearningError {
    match err {
        LearningError::TrainingFailed { .. } => err,
        other => LearningError::training(name, other.to_string()),
    }
}

/// Leakage filter and ranking over sweep results.
#[derive(Debug, Clone, Copy)]
pub struct ModelSelector {
    task: TaskType,
}

impl ModelSelector {
    pub fn new(task: TaskType) -> Self {
        Self { task }
    }

    /// Keep results whose primary metric is strictly below [`LEAKAGE_CUTOFF`].
    ///
    /// `NaN` scores never pass.
    pub fn filter_results<'a>(&self, results: &'a [ModelResult]) -> Vec<&'a ModelResult> {
        results
            .iter()
            .filter(|r| r.primary_metric() < LEAKAGE_CUTOFF)
            .collect()
    }

    /// Name of the highest-scoring eligible model; the first wins ties.
    ///
    /// # Errors
    ///
    /// [`LearningError::NoEligibleModels`] when nothing survives the filter.
    pub fn select_best(&self, results: &[ModelResult]) -> Result<String> {
        let filtered = self.filter_results(results);
        let mut best: Option<&ModelResult> = None;
        for candidate in filtered {
            if best.is_none_or(|b| candidate.primary_metric() > b.primary_metric()) {
                best = Some(candidate);
            }
        }
        best.map(|r| r.model.clone())
            .ok_or_else(|| self.no_eligible(results.len()))
    }

    /// Names of the `k` highest-scoring eligible models, best first.
    ///
    /// Equal scores keep registry order.
    pub fn top_k(&self, results: &[ModelResult], k: usize) -> Result<Vec<String>> {
        let mut filtered = self.filter_results(results);
        if filtered.is_empty() {
            return Err(self.no_eligible(results.len()));
        }
        filtered.sort_by(|a, b| b.primary_metric().total_cmp(&a.primary_metric()));
        Ok(filtered.into_iter().take(k).map(|r| r.model.clone()).collect())
    }

    fn no_eligible(&self, total: usize) -> LearningError {
        LearningError::NoEligibleModels(format!(
            "all {total} result(s) have {} >= {LEAKAGE_CUTOFF} or failed",
            self.task.primary_metric()
        ))
    }
}

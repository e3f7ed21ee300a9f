//! Configuration types for the model sweep.
//!
//! This module provides [`SweepConfig`] and its builder, as well as the
//! [`TaskType`] enum used to pick a model registry and metric set.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use prepflow_learning::SweepConfig;
//!
//! let config = SweepConfig::builder()
//!     .test_size(0.25)
//!     .top_k(5)
//!     .deadline(Duration::from_secs(60))
//!     .build()
//!     .expect("valid config");
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cancellation::CancellationToken;
use crate::error::LearningError;

/// The kind of learning task a sweep runs.
///
/// - [`Classification`](Self::Classification): accuracy, AUC, weighted precision/recall/F1
/// - [`Regression`](Self::Regression): R², MAE, MSE, RMSE, RMSLE, MAPE
/// - [`Clustering`](Self::Clustering): accepted by parsing, but no registry exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TaskType {
    /// Discrete class labels.
    #[default]
    Classification,
    /// Continuous numeric target.
    Regression,
    /// Unsupervised grouping.
    Clustering,
}

impl TaskType {
    /// Returns the lowercase wire name.
    ///
    /// ```
    /// use prepflow_learning::TaskType;
    ///
    /// assert_eq!(TaskType::Classification.as_str(), "classification");
    /// assert_eq!(TaskType::Regression.as_str(), "regression");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Regression => "regression",
            TaskType::Clustering => "clustering",
        }
    }

    /// Name of the metric used to rank models for this task.
    #[must_use]
    pub fn primary_metric(&self) -> &'static str {
        match self {
            TaskType::Classification => "accuracy",
            TaskType::Regression | TaskType::Clustering => "r2",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" => Ok(TaskType::Classification),
            "regression" => Ok(TaskType::Regression),
            "clustering" => Ok(TaskType::Clustering),
            other => Err(LearningError::InvalidConfig(format!(
                "unknown task type '{other}' (expected classification, regression or clustering)"
            ))),
        }
    }
}

/// Configuration for a model sweep.
///
/// Use [`SweepConfig::builder()`] to construct one with validation.
///
/// # Validation
///
/// - `test_size` must be in range `(0.0, 1.0)` (exclusive)
/// - `top_k` must be at least 1
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Fraction of rows held out for scoring (default: 0.2).
    pub test_size: f64,

    /// Seed for the train/test shuffle and every seeded estimator (default: 42).
    pub random_seed: u64,

    /// How many models [`ModelSelector::top_k`](crate::ModelSelector::top_k) returns (default: 3).
    pub top_k: usize,

    /// Train models on the rayon pool (default: true).
    ///
    /// Result order is the registry order either way.
    pub parallel: bool,

    /// Wall-clock budget for the whole sweep, measured from the start of
    /// [`ModelSweep::run`](crate::ModelSweep::run).
    pub deadline: Option<Duration>,

    /// Token checked before each model starts.
    pub cancellation: Option<CancellationToken>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_seed: 42,
            top_k: 3,
            parallel: true,
            deadline: None,
            cancellation: None,
        }
    }
}

impl SweepConfig {
    /// Create a new builder for `SweepConfig`.
    #[must_use]
    pub fn builder() -> SweepConfigBuilder {
        SweepConfigBuilder::default()
    }
}

/// Builder for [`SweepConfig`].
#[derive(Debug, Clone, Default)]
pub struct SweepConfigBuilder {
    config: SweepConfig,
}

impl SweepConfigBuilder {
    /// Set the test size fraction (default: 0.2).
    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.config.test_size = size;
        self
    }

    /// Set the random seed (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set how many models `top_k` returns (default: 3).
    #[must_use]
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Enable or disable parallel training (default: true).
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Set a wall-clock budget for the sweep.
    #[must_use]
    pub fn deadline(mut self, budget: Duration) -> Self {
        self.config.deadline = Some(budget);
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = Some(token);
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if `test_size` is outside
    /// `(0.0, 1.0)` or `top_k` is zero.
    pub fn build(self) -> Result<SweepConfig, LearningError> {
        if !(self.config.test_size > 0.0 && self.config.test_size < 1.0) {
            return Err(LearningError::InvalidConfig(
                "test_size must be between 0.0 and 1.0 (exclusive)".to_string(),
            ));
        }

        if self.config.top_k == 0 {
            return Err(LearningError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }

        Ok(self.config)
    }
}

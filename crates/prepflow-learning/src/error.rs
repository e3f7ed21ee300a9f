//! Error types for the prepflow-learning crate.
//!
//! This module defines [`LearningError`], the error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! Errors fall into two groups:
//! - **Fatal**: configuration and data-shape problems surface to the caller
//!   immediately (e.g. [`TargetNotFound`](LearningError::TargetNotFound)).
//! - **Per-model**: a single estimator failing to fit or predict is recorded
//!   against that model in the sweep results and never aborts the sweep.
//!
//! # Example
//!
//! ```
//! use prepflow_learning::{LearningError, SweepConfig};
//!
//! fn configure() -> Result<SweepConfig, LearningError> {
//!     let config = SweepConfig::builder().test_size(0.25).build()?;
//!     Ok(config)
//! }
//! # configure().unwrap();
//! ```

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for prepflow-learning operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Invalid configuration provided to the sweep.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data provided for training or inference.
    ///
    /// Common causes:
    /// - Feature columns contain null values
    /// - Feature columns are not numeric
    /// - Too few rows to build a train/test split
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The specified target column was not found in the DataFrame.
    #[error("Target column '{0}' not found")]
    TargetNotFound(String),

    /// The task type has no model registry (e.g. clustering).
    #[error("Unsupported task type for model sweep: {0}")]
    UnsupportedTask(String),

    /// An estimator was used before `fit` was called.
    #[error("Model '{0}' has not been fitted")]
    NotFitted(String),

    /// An estimator failed to fit or predict.
    #[error("Training failed for '{model}': {reason}")]
    TrainingFailed {
        /// Registry name of the failing model.
        model: String,
        /// Human-readable cause.
        reason: String,
    },

    /// A metric could not be computed on the held-out split.
    #[error("Metric '{metric}' failed: {reason}")]
    MetricFailed {
        /// Metric name.
        metric: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Every candidate was removed by the leakage filter (primary metric >= 0.9999),
    /// or the sweep produced no successful results at all.
    #[error("No eligible models: {0}")]
    NoEligibleModels(String),

    /// The sweep was cancelled before this model started.
    #[error("Sweep cancelled")]
    Cancelled,

    /// The sweep deadline passed before this model started.
    #[error("Sweep deadline exceeded")]
    DeadlineExceeded,

    /// Polars error while reading the input table.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// ndarray shape error while assembling matrices.
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl LearningError {
    /// Build a [`TrainingFailed`](Self::TrainingFailed) error for a model.
    pub fn training(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TrainingFailed {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Get a stable error code for API consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::TargetNotFound(_) => "TARGET_NOT_FOUND",
            Self::UnsupportedTask(_) => "UNSUPPORTED_TASK",
            Self::NotFitted(_) => "NOT_FITTED",
            Self::TrainingFailed { .. } => "TRAINING_FAILED",
            Self::MetricFailed { .. } => "METRIC_FAILED",
            Self::NoEligibleModels(_) => "NO_ELIGIBLE_MODELS",
            Self::Cancelled => "CANCELLED",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Shape(_) => "SHAPE_ERROR",
        }
    }

    /// Whether the error only affects a single model within a sweep.
    pub fn is_per_model(&self) -> bool {
        matches!(
            self,
            Self::TrainingFailed { .. }
                | Self::MetricFailed { .. }
                | Self::NotFitted(_)
                | Self::Cancelled
                | Self::DeadlineExceeded
        )
    }
}

impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LearningError::TargetNotFound("price".to_string());
        assert_eq!(err.to_string(), "Target column 'price' not found");

        let err = LearningError::training("Lasso", "singular matrix");
        assert_eq!(
            err.to_string(),
            "Training failed for 'Lasso': singular matrix"
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LearningError::NoEligibleModels("all filtered".into()).error_code(),
            "NO_ELIGIBLE_MODELS"
        );
        assert_eq!(LearningError::Cancelled.error_code(), "CANCELLED");
    }

    #[test]
    fn test_per_model_classification() {
        assert!(LearningError::training("x", "y").is_per_model());
        assert!(LearningError::DeadlineExceeded.is_per_model());
        assert!(!LearningError::InvalidConfig("bad".into()).is_per_model());
        assert!(!LearningError::NoEligibleModels("none".into()).is_per_model());
    }

    #[test]
    fn test_error_serialization() {
        let err = LearningError::UnsupportedTask("clustering".into());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("UNSUPPORTED_TASK"));
        assert!(json.contains("clustering"));
    }
}

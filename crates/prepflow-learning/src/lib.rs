//! prepflow-learning: native model sweep over tabular data.
//!
//! This crate trains a registry of candidate estimators on a train/test
//! split of a Polars [`DataFrame`](polars::prelude::DataFrame), scores each
//! with task-appropriate metrics, and selects winners while filtering out
//! suspiciously perfect scores.
//!
//! # Features
//!
//! - **Native estimators**: linear models, CART trees, random forests,
//!   extra trees, gradient boosting, k-NN and Gaussian naive Bayes on `ndarray`
//! - **Parallel sweep**: models train on the rayon pool; result order is the
//!   registry order regardless of scheduling
//! - **Per-model failure isolation**: every registry entry yields a
//!   `Result`, so callers can see which models failed and why
//! - **Extensible**: inject extra models and metric functions by name
//! - **Deadline and cancellation**: stop launching models once a budget
//!   expires or a token is cancelled
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use prepflow_learning::{ModelSelector, ModelSweep, SweepConfig, TaskType};
//!
//! let config = SweepConfig::builder().test_size(0.2).build()?;
//! let sweep = ModelSweep::new(TaskType::Classification, config)?;
//! let report = sweep.run(&df, "target")?;
//!
//! let selector = ModelSelector::new(TaskType::Classification);
//! let best = selector.select_best(&report.results())?;
//! let top3 = selector.top_k(&report.results(), 3)?;
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, LearningError>`]. Data and
//! configuration problems fail the whole call; a model that fails to fit or
//! predict only fails its own [`ModelRun`].

pub mod cancellation;
pub mod config;
pub mod data;
pub mod error;
pub mod linalg;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod sweep;
pub mod types;

pub use cancellation::{CancellationToken, StopCondition};
pub use config::{SweepConfig, SweepConfigBuilder, TaskType};
pub use data::{Dataset, TrainTestSplit, train_test_split};
pub use error::{LearningError, Result};
pub use metrics::{ClassificationMetrics, MetricFn, RegressionMetrics, TaskMetrics, metric_fn};
pub use models::Estimator;
pub use registry::{ModelFactory, ModelRegistry, factory};
pub use sweep::{LEAKAGE_CUTOFF, ModelSelector, ModelSweep};
pub use types::{ModelResult, ModelRun, SweepReport};

//! Tabular data preparation library built with Rust and Polars.
//!
//! # Overview
//!
//! This library covers the data side of an ML pipeline:
//!
//! - **Ingestion**: load CSV/TSV/JSON/Parquet files or merge several on join keys
//! - **Quality Checking**: schema validation, missing values, duplicates,
//!   outliers, class imbalance and more, reported as issues with pros and cons
//! - **Preprocessing**: configurable stages (imputation, outliers, rare
//!   categories, skewness, encoding, scaling, class resampling) in a fixed order,
//!   or a one-shot auto-clean mode
//! - **Feature Engineering**: automatic and expression-based features,
//!   transforms, selection and PCA with column provenance
//! - **Reporting**: plain-text and JSON reports
//!
//! Model training lives in the companion `prepflow-learning` crate; its sweep
//! and selection types are re-exported here.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use prepflow_processing::{
//!     DataIngestion, DataPreprocessor, IngestionSource, PreprocessingConfig, TaskType,
//! };
//! use prepflow_processing::config::ImputationConfig;
//!
//! let ingested = DataIngestion::process(&IngestionSource::file("heart.csv"), None, "heart")?;
//! println!("{} quality issues", ingested.report.issues.len());
//!
//! let config = PreprocessingConfig::builder()
//!     .imputation(ImputationConfig {
//!         median: vec!["chol".into()],
//!         ..Default::default()
//!     })
//!     .build()?;
//!
//! let mut preprocessor = DataPreprocessor::builder()
//!     .config(config)
//!     .task(TaskType::Classification)
//!     .build()?;
//! let outcome = preprocessor.preprocess(ingested.data, Some("target"))?;
//!
//! for step in &outcome.processing_steps {
//!     println!("- {}", step);
//! }
//! ```
//!
//! # Errors
//!
//! Fallible calls return [`PreprocessingResult`]. Configuration problems and
//! unreadable input abort the call; a column that does not meet a stage's
//! preconditions is logged and skipped, and data-quality findings are
//! returned as report entries, never as errors.

pub mod cleaner;
pub mod config;
pub mod error;
pub mod features;
pub mod imputers;
pub mod ingestion;
pub mod pipeline;
pub mod quality;
pub mod reporting;
pub mod schema;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::AutoCleaner;
pub use config::{
    ConfigValidationError, FeatureEngineeringConfig, FeatureEngineeringConfigBuilder,
    FeatureMode, PreprocessingConfig, PreprocessingConfigBuilder, SelectionMethod,
};
pub use error::{PreprocessingError, Result as PreprocessingResult, ResultExt};
pub use features::FeatureEngineer;
pub use imputers::{IterativeImputer, KNNImputer, StatisticalImputer};
pub use ingestion::{DataIngestion, DataLoader, FileType, IngestionSource, LoadOptions, MergeSpec};
pub use pipeline::{ClassImbalanceHandler, DataPreprocessor, DataPreprocessorBuilder};
pub use quality::{DataQualityChecker, SchemaValidator};
pub use reporting::ReportGenerator;
pub use schema::{ColumnSchema, DataSchema};
pub use types::{
    DatasetDiagnostics, FeatureDiagnostics, FeatureEngineeringOutcome, FeatureProvenance,
    FeatureRange, IngestionOutcome, PreprocessingOutcome, QualityIssue, QualityReport, Severity,
};

pub use prepflow_learning::{
    CancellationToken, LEAKAGE_CUTOFF, ModelResult, ModelSelector, ModelSweep, SweepConfig,
    SweepReport, TaskType,
};

static_assertions::assert_impl_all!(PreprocessingError: Send, Sync);
static_assertions::assert_impl_all!(DataSchema: Send, Sync);

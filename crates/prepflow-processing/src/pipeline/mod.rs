//! Preprocessing pipeline.
//!
//! [`DataPreprocessor`] sequences the stage handlers below. Each handler
//! follows the same shape: `new(config)`, `fit_transform(df, steps)` which
//! learns its parameters and appends narrative lines, read-only accessors
//! for the fitted state, and `transform(&df)` to replay it on new data.

pub mod detectors;
mod diagnostics;
mod encoding;
mod executor;
mod imbalance;
mod missing;
pub mod outliers;
mod rare;
mod scaling;
mod skewness;

pub use detectors::{IsolationForest, LocalOutlierFactor};
pub use encoding::{CategoricalEncoder, FittedCategories};
pub use executor::{DataPreprocessor, DataPreprocessorBuilder};
pub use imbalance::ClassImbalanceHandler;
pub use missing::{ColumnStatistic, ImputationStrategy, MissingValueHandler};
pub use outliers::{OutlierCaps, OutlierHandler};
pub use rare::{RareCategories, RareCategoryHandler};
pub use scaling::{FeatureScaler, FittedScaler, ScalerParams};
pub use skewness::{FittedSkew, SkewTransform, SkewnessHandler};

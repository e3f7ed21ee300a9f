//! Configuration types for preprocessing and feature engineering.
//!
//! Every stage is a `serde` struct with defaults, so the JSON mappings the
//! API layer stores deserialize directly. A stage that is absent from the
//! top-level config (`None`) is not applied. Both top-level configs have a
//! builder whose `build()` runs [`validate`](PreprocessingConfig::validate).
//!
//! # Example
//!
//! ```rust,ignore
//! use prepflow_processing::config::*;
//!
//! let config = PreprocessingConfig::builder()
//!     .imputation(ImputationConfig {
//!         median: vec!["age".into()],
//!         ..Default::default()
//!     })
//!     .outlier(OutlierConfig::default())
//!     .build()?;
//! ```

mod features;
mod preprocessing;

pub use features::{
    FeatureEngineeringConfig, FeatureEngineeringConfigBuilder, FeatureMode, ManualFeature,
    SelectionMethod,
};
pub use preprocessing::{
    ClassImbalanceConfig, DropHighMissing, EncodingConfig, FillValue, ImbalanceMethod,
    ImputationConfig, InterpolateConfig, InterpolationMethod, OutlierAction, OutlierConfig,
    OutlierMethod, PreprocessingConfig, PreprocessingConfigBuilder, RareCategoryConfig,
    ScalingConfig, SkewMethod, SkewnessConfig,
};

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be in (0.0, 1.0])")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid percentiles: low={low}, high={high} (need 0.0 <= low < high <= 1.0)")]
    InvalidPercentiles { low: f64, high: f64 },

    #[error("Invalid value for '{field}': {value} (must be at least 1)")]
    MustBePositive { field: String, value: usize },

    #[error("Invalid value for '{field}': {value} (must be a non-negative number)")]
    MustBeNonNegative { field: String, value: f64 },

    #[error("Duplicate manual feature name '{0}'")]
    DuplicateFeatureName(String),
}

pub(crate) fn check_unit_threshold(field: &str, value: f64) -> Result<(), ConfigValidationError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigValidationError::InvalidThreshold {
            field: field.to_string(),
            value,
        })
    }
}

pub(crate) fn check_positive(field: &str, value: usize) -> Result<(), ConfigValidationError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(ConfigValidationError::MustBePositive {
            field: field.to_string(),
            value,
        })
    }
}

pub(crate) fn check_non_negative(field: &str, value: f64) -> Result<(), ConfigValidationError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigValidationError::MustBeNonNegative {
            field: field.to_string(),
            value,
        })
    }
}

//! Error types for ingestion, preprocessing and feature engineering.
//!
//! Data-quality findings are never errors: they are reported as
//! [`QualityIssue`](crate::types::QualityIssue) entries. This enum covers the
//! conditions that abort a call: bad configuration, unreadable input and
//! stage failures that cannot be confined to a single column.
//!
//! Errors serialize as `{code, message}` so the API layer can forward them.

use std::path::PathBuf;

use prepflow_learning::LearningError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the processing crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PreprocessingError {
    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid or missing configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Schema could not be applied (e.g. a regex that does not compile).
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Ingestion does not support this file type.
    #[error("Unsupported file type '{0}'")]
    UnsupportedFileType(String),

    /// A file could not be read or parsed.
    #[error("Failed to load '{path}'")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No valid values found in a column for computation.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// Type conversion failed.
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// Class-balance resampling could not run.
    #[error("Resampling failed: {0}")]
    ResamplingFailed(String),

    /// A manual feature expression could not be parsed or evaluated.
    #[error("Expression error: {0}")]
    Expression(String),

    /// Error raised by the model sweep or its estimators.
    #[error(transparent)]
    Learning(#[from] LearningError),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PreprocessingError>,
    },
}

impl PreprocessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PreprocessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap a load failure, keeping the original cause.
    pub fn load_failed(
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        PreprocessingError::LoadFailed {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Stable code for API consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidSchema(_) => "INVALID_SCHEMA",
            Self::UnsupportedFileType(_) => "UNSUPPORTED_FILE_TYPE",
            Self::LoadFailed { .. } => "LOAD_FAILED",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::ResamplingFailed(_) => "RESAMPLING_FAILED",
            Self::Expression(_) => "EXPRESSION_ERROR",
            Self::Learning(e) => e.error_code(),
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Configuration problems the caller can fix and retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidConfig(_) | Self::InvalidSchema(_) | Self::ColumnNotFound(_) => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

impl From<crate::config::ConfigValidationError> for PreprocessingError {
    fn from(e: crate::config::ConfigValidationError) -> Self {
        PreprocessingError::InvalidConfig(e.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PreprocessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PreprocessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, PreprocessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PreprocessingError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            PreprocessingError::ColumnNotFound("test".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
        assert_eq!(
            PreprocessingError::UnsupportedFileType("excel".to_string()).error_code(),
            "UNSUPPORTED_FILE_TYPE"
        );
    }

    #[test]
    fn test_learning_error_keeps_code() {
        let error: PreprocessingError = LearningError::NoEligibleModels("x".into()).into();
        assert_eq!(
            error.error_code(),
            LearningError::NoEligibleModels("x".into()).error_code()
        );
    }

    #[test]
    fn test_is_recoverable() {
        assert!(PreprocessingError::InvalidConfig("x".to_string()).is_recoverable());
        assert!(
            PreprocessingError::InvalidSchema("x".to_string())
                .with_context("During ingestion")
                .is_recoverable()
        );
        assert!(!PreprocessingError::ResamplingFailed("x".to_string()).is_recoverable());
    }

    #[test]
    fn test_load_failed_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = PreprocessingError::load_failed("data.csv", io);
        let source = std::error::Error::source(&error).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("no such file"));
        assert_eq!(error.error_code(), "LOAD_FAILED");
    }

    #[test]
    fn test_error_serialization() {
        let error = PreprocessingError::ColumnNotFound("Age".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("Age"));
    }

    #[test]
    fn test_with_context() {
        let error =
            PreprocessingError::ColumnNotFound("test".to_string()).with_context("During encoding");
        assert!(error.to_string().contains("During encoding"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND");
    }
}

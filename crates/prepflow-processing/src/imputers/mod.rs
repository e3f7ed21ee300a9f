//! Imputation strategies for filling missing values.
//!
//! These work on plain value buffers; the missing-value stage in
//! [`crate::pipeline`] reads columns out of the frame and writes them back.
//!
//! - Statistical imputation (mean, median, mode)
//! - KNN imputation
//! - Iterative (round-robin regression) imputation
//! - Interpolation

pub mod fill;
mod iterative;
mod knn;
mod statistical;

pub use iterative::IterativeImputer;
pub use knn::{KNNImputer, nan_euclidean};
pub use statistical::StatisticalImputer;

/// Null or NaN.
#[inline]
pub(crate) fn is_missing(value: Option<f64>) -> bool {
    value.is_none_or(f64::is_nan)
}

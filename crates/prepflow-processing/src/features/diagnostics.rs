//! Checks over the engineered frame, reported next to the provenance.

use polars::prelude::*;

use crate::error::Result;
use crate::types::{FeatureDiagnostics, FeatureRange};
use crate::utils::{
    categorical_columns, column_f64, correlation, mean, min_max, numeric_columns, std_dev,
    valid_values,
};

const TOP_CORRELATIONS: usize = 10;
const OUTLIER_Z: f64 = 3.0;

pub fn diagnose(
    df: &DataFrame,
    input_shape: (usize, usize),
    target: Option<&str>,
) -> Result<FeatureDiagnostics> {
    let numeric = numeric_columns(df);
    let mut ranges = Vec::with_capacity(numeric.len());
    let mut outliers = Vec::with_capacity(numeric.len());
    for name in &numeric {
        let values = valid_values(&column_f64(df, name)?);
        let range = min_max(&values);
        ranges.push(FeatureRange {
            column: name.clone(),
            min: range.map(|r| r.0),
            max: range.map(|r| r.1),
            mean: mean(&values),
            std: std_dev(&values, 1),
        });
        outliers.push((name.clone(), zscore_outliers(&values)));
    }

    let mut target_correlations = Vec::new();
    if let Some(target) = target
        && numeric.iter().any(|c| c == target)
    {
        let y = column_f64(df, target)?;
        for name in numeric.iter().filter(|c| *c != target) {
            if let Some(r) = correlation(&column_f64(df, name)?, &y) {
                target_correlations.push((name.clone(), r.abs()));
            }
        }
        target_correlations.sort_by(|a, b| b.1.total_cmp(&a.1));
        target_correlations.truncate(TOP_CORRELATIONS);
    }

    Ok(FeatureDiagnostics {
        input_shape,
        numeric,
        categorical: categorical_columns(df),
        ranges,
        target_correlations,
        outliers,
    })
}

/// Population z-scores; a constant column has no outliers.
fn zscore_outliers(values: &[f64]) -> usize {
    match (mean(values), std_dev(values, 0)) {
        (Some(m), Some(s)) if s > 0.0 => values
            .iter()
            .filter(|v| ((**v - m) / s).abs() > OUTLIER_Z)
            .count(),
        _ => 0,
    }
}

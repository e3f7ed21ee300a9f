//! Statistical imputation: mean, median and most-frequent fills.

use polars::prelude::*;

use super::is_missing;
use crate::utils::{mean, median, value_counts};

/// Column statistics used to fill missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Mean of the observed values.
    pub fn mean(values: &[Option<f64>]) -> Option<f64> {
        mean(&observed(values))
    }

    /// Median of the observed values.
    pub fn median(values: &[Option<f64>]) -> Option<f64> {
        median(&observed(values))
    }

    /// Most frequent observed value; ties resolve to the smallest.
    pub fn mode(values: &[Option<f64>]) -> Option<f64> {
        let series = Series::new("value".into(), observed(values));
        let counts = series
            .value_counts(false, false, "count".into(), false)
            .ok()?;
        let keys = counts.column("value").ok()?.as_materialized_series().f64().ok()?;
        let totals = counts
            .column("count")
            .ok()?
            .as_materialized_series()
            .cast(&DataType::UInt64)
            .ok()?;
        keys.into_iter()
            .zip(totals.u64().ok()?)
            .filter_map(|(v, n)| Some((v?, n?)))
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.total_cmp(&a.0)))
            // -0.0 and 0.0 are the same category
            .map(|(v, _)| if v == 0.0 { 0.0 } else { v })
    }

    /// Most frequent non-null string; ties resolve to the lexicographically smallest.
    pub fn mode_text(values: &[Option<String>]) -> Option<String> {
        value_counts(values)
            .ok()?
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(v, _)| v)
    }

    /// Replace missing entries (null or NaN) with `fill`.
    pub fn fill(values: &[Option<f64>], fill: f64) -> Vec<Option<f64>> {
        values
            .iter()
            .map(|v| if is_missing(*v) { Some(fill) } else { *v })
            .collect()
    }

    /// Replace null entries with `fill`.
    pub fn fill_text(values: &[Option<String>], fill: &str) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| Some(v.clone().unwrap_or_else(|| fill.to_string())))
            .collect()
    }
}

fn observed(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().filter(|v| !is_missing(**v)).flatten().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mean_and_median_skip_missing() {
        let values = vec![Some(1.0), None, Some(f64::NAN), Some(5.0), Some(3.0)];
        assert_eq!(StatisticalImputer::mean(&values), Some(3.0));
        assert_eq!(StatisticalImputer::median(&values), Some(3.0));
        assert_eq!(StatisticalImputer::mean(&[None, None]), None);
    }

    #[test]
    fn test_mode_tie_breaks_to_smallest() {
        let values = vec![Some(3.0), Some(1.0), Some(3.0), Some(1.0), Some(2.0)];
        assert_eq!(StatisticalImputer::mode(&values), Some(1.0));

        let text: Vec<Option<String>> = ["b", "a", "b", "a"]
            .iter()
            .map(|s| Some(s.to_string()))
            .collect();
        assert_eq!(StatisticalImputer::mode_text(&text), Some("a".to_string()));
    }

    #[test]
    fn test_fill() {
        let values = vec![Some(1.0), None, Some(f64::NAN)];
        assert_eq!(
            StatisticalImputer::fill(&values, 9.0),
            vec![Some(1.0), Some(9.0), Some(9.0)]
        );
    }
}

//! Before/after snapshot of a preprocessing run.

use polars::prelude::*;

use crate::error::Result;
use crate::types::DatasetDiagnostics;
use crate::utils::{
    categorical_columns, column_f64, column_names, correlation, duplicate_count, mean,
    n_unique, numeric_columns, std_dev, total_nulls, valid_values,
};

const OUTLIER_SIGMAS: f64 = 3.0;
const CORRELATION_CUTOFF: f64 = 0.9;

impl DatasetDiagnostics {
    pub fn compute(df: &DataFrame) -> Result<Self> {
        let numeric = numeric_columns(df);

        let mut constant_columns = Vec::new();
        for name in column_names(df) {
            if n_unique(df, &name)? <= 1 {
                constant_columns.push(name);
            }
        }

        let values: Vec<Vec<Option<f64>>> = numeric
            .iter()
            .map(|c| column_f64(df, c))
            .collect::<Result<_>>()?;

        let outlier_columns = numeric
            .iter()
            .zip(&values)
            .filter(|(_, column)| has_extreme_value(column))
            .map(|(name, _)| name.clone())
            .collect();

        let mut correlated_pairs = Vec::new();
        for i in 0..numeric.len() {
            for j in (i + 1)..numeric.len() {
                if correlation(&values[i], &values[j])
                    .is_some_and(|r| r.abs() > CORRELATION_CUTOFF)
                {
                    correlated_pairs.push((numeric[i].clone(), numeric[j].clone()));
                }
            }
        }

        Ok(Self {
            shape: (df.height(), df.width()),
            missing_values: total_nulls(df),
            duplicate_rows: duplicate_count(df)?,
            numeric_columns: numeric,
            categorical_columns: categorical_columns(df),
            constant_columns,
            outlier_columns,
            correlated_pairs,
        })
    }
}

/// Any value beyond mean ± 3 sample standard deviations.
fn has_extreme_value(column: &[Option<f64>]) -> bool {
    let values = valid_values(column);
    match (mean(&values), std_dev(&values, 1)) {
        (Some(mu), Some(sigma)) if sigma > 0.0 => values
            .iter()
            .any(|v| (v - mu).abs() > OUTLIER_SIGMAS * sigma),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_snapshot_fields() {
        let mut spike = vec![1.0; 20];
        spike.push(100.0);
        let linear: Vec<f64> = (0..21).map(|i| i as f64).collect();
        let doubled: Vec<f64> = linear.iter().map(|v| v * 2.0 + 1.0).collect();
        let mut city = vec![Some("x"); 20];
        city.push(None);
        let df = df![
            "spike" => spike,
            "linear" => linear,
            "doubled" => doubled,
            "flag" => vec![7i64; 21],
            "city" => city,
        ]
        .unwrap();

        let diag = DatasetDiagnostics::compute(&df).unwrap();
        assert_eq!(diag.shape, (21, 5));
        assert_eq!(diag.missing_values, 1);
        assert_eq!(diag.categorical_columns, vec!["city"]);
        assert_eq!(diag.constant_columns, vec!["flag", "city"]);
        assert_eq!(diag.outlier_columns, vec!["spike"]);
        assert_eq!(
            diag.correlated_pairs,
            vec![("linear".to_string(), "doubled".to_string())]
        );
    }

    #[test]
    fn test_duplicate_rows_counted() {
        let df = df!["a" => [1i64, 1, 2], "b" => ["x", "x", "y"]].unwrap();
        assert_eq!(DatasetDiagnostics::compute(&df).unwrap().duplicate_rows, 1);
    }
}

//! Automatic skew/variance transforms and the non-finite cleanup pass.

use polars::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::imputers::StatisticalImputer;
use crate::utils::{
    categorical_columns, column_f64, column_strings, mean, numeric_columns, set_f64_column,
    set_string_column, skewness_unbiased, std_dev, valid_values, variance,
};

const SKEW_THRESHOLD: f64 = 1.0;
const VARIANCE_THRESHOLD: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureTransform {
    Log,
    Scaled,
}

/// Adds `{c}_log` for strongly right-skewed positive columns and
/// `{c}_scaled` (z-score) for high-variance columns.
#[derive(Debug, Clone, Default)]
pub struct FeatureTransformer {
    applied: Vec<(String, FeatureTransform)>,
}

impl FeatureTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// New columns and the transform that produced each.
    pub fn applied(&self) -> &[(String, FeatureTransform)] {
        &self.applied
    }

    pub fn apply(&mut self, df: DataFrame, target: Option<&str>) -> Result<DataFrame> {
        self.applied.clear();
        let mut df = df;
        let columns: Vec<String> = numeric_columns(&df)
            .into_iter()
            .filter(|c| Some(c.as_str()) != target)
            .collect();

        for column in columns {
            let raw = column_f64(&df, &column)?;
            let values = valid_values(&raw);
            if values.is_empty() {
                continue;
            }

            let skew = skewness_unbiased(&values);
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            if skew > SKEW_THRESHOLD && min > 0.0 {
                let name = format!("{column}_log");
                set_f64_column(&mut df, &name, raw.iter().map(|v| v.map(f64::ln)).collect())?;
                debug!("'{}' skew {:.3}: added '{}'", column, skew, name);
                self.applied.push((name, FeatureTransform::Log));
            }

            if variance(&values, 1).is_some_and(|v| v > VARIANCE_THRESHOLD)
                && let (Some(mu), Some(sigma)) = (mean(&values), std_dev(&values, 1))
            {
                let name = format!("{column}_scaled");
                let scaled = raw.iter().map(|v| v.map(|x| (x - mu) / sigma)).collect();
                set_f64_column(&mut df, &name, scaled)?;
                debug!("'{}' variance above {}: added '{}'", column, VARIANCE_THRESHOLD, name);
                self.applied.push((name, FeatureTransform::Scaled));
            }
        }

        Ok(df)
    }
}

/// Replace nulls, NaN and ±inf with zero; text nulls become `"0"`.
///
/// Returns the frame and the number of cells replaced.
pub fn replace_non_finite(df: DataFrame) -> Result<(DataFrame, usize)> {
    let mut df = df;
    let mut replaced = 0;
    for name in numeric_columns(&df) {
        let column = df.column(&name)?;
        let is_float = matches!(column.dtype(), DataType::Float32 | DataType::Float64);
        if !is_float {
            if column.null_count() > 0 {
                replaced += column.null_count();
                let filled = column
                    .as_materialized_series()
                    .fill_null(FillNullStrategy::Zero)?;
                df.replace(&name, filled)?;
            }
            continue;
        }

        let values = column_f64(&df, &name)?;
        let bad = values.iter().filter(|v| !v.is_some_and(f64::is_finite)).count();
        if bad > 0 {
            replaced += bad;
            let cleaned = values
                .into_iter()
                .map(|v| Some(v.filter(|x| x.is_finite()).unwrap_or(0.0)))
                .collect();
            set_f64_column(&mut df, &name, cleaned)?;
        }
    }
    for name in categorical_columns(&df) {
        let values = column_strings(&df, &name)?;
        let nulls = values.iter().filter(|v| v.is_none()).count();
        if nulls > 0 {
            replaced += nulls;
            set_string_column(&mut df, &name, StatisticalImputer::fill_text(&values, "0"))?;
        }
    }
    Ok((df, replaced))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_names;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_adds_log_and_scaled() {
        let df = df![
            "skewed" => [1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 50.0],
            "wide" => [-500.0, 0.0, 500.0, 1000.0, -1000.0, 200.0, 100.0],
            "target" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 1000.0],
        ]
        .unwrap();
        let mut transformer = FeatureTransformer::new();
        let out = transformer.apply(df, Some("target")).unwrap();

        assert_eq!(
            column_names(&out),
            vec!["skewed", "wide", "target", "skewed_log", "wide_scaled"]
        );
        assert_eq!(transformer.applied().len(), 2);
    }

    #[test]
    fn test_replace_non_finite() {
        let df = df![
            "f" => [Some(1.0), Some(f64::NAN), Some(f64::INFINITY), None],
            "i" => [Some(1i64), None, Some(3), Some(4)],
            "s" => [Some("a"), None, Some("b"), Some("c")],
        ]
        .unwrap();
        let (out, replaced) = replace_non_finite(df).unwrap();
        assert_eq!(replaced, 5);
        assert_eq!(
            column_f64(&out, "f").unwrap(),
            vec![Some(1.0), Some(0.0), Some(0.0), Some(0.0)]
        );
        assert_eq!(out.column("i").unwrap().null_count(), 0);
        assert_eq!(
            column_strings(&out, "s").unwrap(),
            vec![Some("a".into()), Some("0".into()), Some("b".into()), Some("c".into())]
        );
    }
}

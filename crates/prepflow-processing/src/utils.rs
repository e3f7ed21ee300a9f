//! Shared utilities for the processing crate.
//!
//! Column access helpers convert between Polars columns and plain
//! `Vec<Option<_>>` buffers, which is what the per-column stage code works on.
//! Statistics run on Polars aggregations over the valid values (nulls and
//! NaN removed by the caller); percentiles use linear interpolation.

use polars::prelude::cov::pearson_corr;
use polars::prelude::*;

use crate::error::{PreprocessingError, Result};

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float). Booleans are not numeric.
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType holds text categories.
#[inline]
pub fn is_text_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

// =============================================================================
// Column Access
// =============================================================================

/// All column names in frame order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Numeric column names in frame order.
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| is_numeric_dtype(c.dtype()))
        .map(|c| c.name().to_string())
        .collect()
}

/// String/categorical column names in frame order.
pub fn categorical_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| is_text_dtype(c.dtype()))
        .map(|c| c.name().to_string())
        .collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Error unless `name` is a column of `df`.
pub fn require_column(df: &DataFrame, name: &str) -> Result<()> {
    if has_column(df, name) {
        Ok(())
    } else {
        Err(PreprocessingError::ColumnNotFound(name.to_string()))
    }
}

/// Read a column as `f64`, keeping nulls.
pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PreprocessingError::ColumnNotFound(name.to_string()))?;
    let series = column.as_materialized_series();
    if !is_numeric_dtype(series.dtype()) && !matches!(series.dtype(), DataType::Boolean) {
        return Err(PreprocessingError::TypeConversionFailed {
            column: name.to_string(),
            target_type: "Float64".to_string(),
            reason: format!("column has non-numeric dtype {}", series.dtype()),
        });
    }
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Read a column as strings, keeping nulls.
pub fn column_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| PreprocessingError::ColumnNotFound(name.to_string()))?;
    let series = column.as_materialized_series();
    if is_numeric_dtype(series.dtype()) {
        // Match the keys produced by `value_key` for JSON numbers.
        let cast = series.cast(&DataType::Float64)?;
        return Ok(cast
            .f64()?
            .into_iter()
            .map(|v| v.map(|f| f.to_string()))
            .collect());
    }
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Replace (or append) a `Float64` column.
pub fn set_f64_column(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<()> {
    let series = Series::new(name.into(), values);
    if has_column(df, name) {
        df.replace(name, series)?;
    } else {
        df.with_column(series)?;
    }
    Ok(())
}

/// Replace (or append) a `String` column.
pub fn set_string_column(
    df: &mut DataFrame,
    name: &str,
    values: Vec<Option<String>>,
) -> Result<()> {
    let series = Series::new(name.into(), values);
    if has_column(df, name) {
        df.replace(name, series)?;
    } else {
        df.with_column(series)?;
    }
    Ok(())
}

/// Drop the named columns, ignoring names that are not present.
pub fn drop_columns(df: DataFrame, names: &[String]) -> DataFrame {
    let present: Vec<PlSmallStr> = names
        .iter()
        .filter(|n| has_column(&df, n))
        .map(|s| s.as_str().into())
        .collect();
    if present.is_empty() {
        df
    } else {
        df.drop_many(present)
    }
}

/// Keep rows where `keep` is true.
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("mask".into(), keep);
    Ok(df.filter(&mask)?)
}

// =============================================================================
// Statistics
// =============================================================================

/// Finite, non-null values in order.
pub fn valid_values(values: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .flatten()
        .copied()
        .filter(|v| !v.is_nan())
        .collect()
}

fn float_series(values: &[f64]) -> Series {
    Series::new(PlSmallStr::EMPTY, values)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    float_series(values).mean()
}

/// Variance with `ddof` delta degrees of freedom.
pub fn variance(values: &[f64], ddof: u8) -> Option<f64> {
    float_series(values).var(ddof)
}

pub fn std_dev(values: &[f64], ddof: u8) -> Option<f64> {
    float_series(values).std(ddof)
}

pub fn median(values: &[f64]) -> Option<f64> {
    float_series(values).median()
}

/// Smallest and largest value.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let ca = Float64Chunked::from_slice(PlSmallStr::EMPTY, values);
    ca.min().zip(ca.max())
}

/// Percentile `q` in [0, 1] with linear interpolation between ranks.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    Float64Chunked::from_slice(PlSmallStr::EMPTY, values)
        .quantile(q.clamp(0.0, 1.0), QuantileMethod::Linear)
        .ok()
        .flatten()
}

/// Several percentiles over one sort of the data.
pub fn percentiles(values: &[f64], qs: &[f64]) -> Option<Vec<f64>> {
    let ordered = Float64Chunked::from_slice(PlSmallStr::EMPTY, values).sort(false);
    qs.iter()
        .map(|q| {
            ordered
                .quantile(q.clamp(0.0, 1.0), QuantileMethod::Linear)
                .ok()
                .flatten()
        })
        .collect()
}

/// Population skewness `m3 / m2^1.5`. NaN for constant or empty input.
pub fn skewness(values: &[f64]) -> f64 {
    float_series(values)
        .skew(true)
        .ok()
        .flatten()
        .unwrap_or(f64::NAN)
}

/// Sample skewness with the `sqrt(n(n-1)) / (n-2)` bias adjustment.
pub fn skewness_unbiased(values: &[f64]) -> f64 {
    float_series(values)
        .skew(false)
        .ok()
        .flatten()
        .unwrap_or(f64::NAN)
}

/// Pearson correlation over rows where both values are present.
pub fn correlation(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let present = |values: &[Option<f64>]| -> Float64Chunked {
        values
            .iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect()
    };
    let (a, b) = (present(a), present(b));
    let pairs = (&a)
        .into_iter()
        .zip(&b)
        .filter(|(x, y)| x.is_some() && y.is_some())
        .count();
    if pairs < 2 {
        return None;
    }
    pearson_corr(&a, &b).filter(|r| r.is_finite())
}

/// Category counts ordered by count descending, ties by first appearance.
pub fn value_counts(values: &[Option<String>]) -> Result<Vec<(String, usize)>> {
    let frame = DataFrame::new(vec![Column::new("value".into(), values)])?;
    let counts = frame
        .lazy()
        .filter(col("value").is_not_null())
        .group_by_stable([col("value")])
        .agg([len().alias("count")])
        .sort(
            ["count"],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .collect()?;

    let keys = counts.column("value")?.as_materialized_series().str()?;
    let totals = counts
        .column("count")?
        .as_materialized_series()
        .cast(&DataType::UInt64)?;
    Ok(keys
        .into_iter()
        .zip(totals.u64()?)
        .filter_map(|(k, n)| Some((k?.to_string(), n? as usize)))
        .collect())
}

/// Distinct non-null values in a column.
pub fn n_unique(df: &DataFrame, name: &str) -> Result<usize> {
    let column = df
        .column(name)
        .map_err(|_| PreprocessingError::ColumnNotFound(name.to_string()))?;
    Ok(column.as_materialized_series().drop_nulls().n_unique()?)
}

// =============================================================================
// Row Utilities
// =============================================================================

/// Rows equal to an earlier row. Nulls compare equal, as do `0.0` and `-0.0`.
pub fn duplicate_count(df: &DataFrame) -> Result<usize> {
    if df.width() == 0 {
        return Ok(0);
    }
    let distinct = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
    Ok(df.height() - distinct.height())
}

/// Total null cells across all columns.
pub fn total_nulls(df: &DataFrame) -> usize {
    df.get_columns().iter().map(|c| c.null_count()).sum()
}

// =============================================================================
// Formatting
// =============================================================================

/// `1234567` -> `"1,234,567"`.
pub fn format_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `["a", "b"]` -> `"[a, b]"`, for narrative lines.
pub fn bracket_list(names: &[String]) -> String {
    format!("[{}]", names.join(", "))
}

/// Human-readable cell values: text quoted, whole floats with one decimal.
pub fn display_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| PreprocessingError::ColumnNotFound(name.to_string()))?;
    let series = column.as_materialized_series();
    let dtype = series.dtype().clone();

    if is_text_dtype(&dtype) {
        let cast = series.cast(&DataType::String)?;
        return Ok(cast
            .str()?
            .into_iter()
            .map(|v| v.map(|s| format!("'{}'", s)))
            .collect());
    }
    if matches!(dtype, DataType::Float32 | DataType::Float64) {
        let cast = series.cast(&DataType::Float64)?;
        return Ok(cast
            .f64()?
            .into_iter()
            .map(|v| {
                v.map(|f| {
                    if f.is_finite() && f.fract() == 0.0 {
                        format!("{:.1}", f)
                    } else {
                        f.to_string()
                    }
                })
            })
            .collect());
    }
    if matches!(dtype, DataType::Boolean) {
        return Ok(series
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| if b { "True" } else { "False" }.to_string()))
            .collect());
    }
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

// =============================================================================
// Hashing
// =============================================================================

/// 64-bit FNV-1a. Fixed across runs and platforms.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(PRIME)
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dtype_predicates() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
        assert!(is_text_dtype(&DataType::String));
        assert!(!is_text_dtype(&DataType::Int64));
    }

    #[test]
    fn test_percentile_linear() {
        let values = [4.0, 1000.0, 1.0, 3.0, 2.0];
        let p95 = percentile(&values, 0.95).unwrap();
        let p05 = percentile(&values, 0.05).unwrap();
        assert!((p95 - 800.8).abs() < 1e-9);
        assert!((p05 - 1.2).abs() < 1e-9);
        assert_eq!(median(&[3.0, 1.0, 2.0, 10.0]), Some(2.5));
        assert_eq!(percentile(&[], 0.5), None);

        let several = percentiles(&values, &[0.0, 0.5, 1.0]).unwrap();
        assert_eq!(several, vec![1.0, 3.0, 1000.0]);
        assert_eq!(min_max(&values), Some((1.0, 1000.0)));
    }

    #[test]
    fn test_skewness() {
        assert!(skewness(&[1.0, 2.0, 3.0]).abs() < 1e-12);
        assert!(skewness(&[1.0, 1.0, 1.0, 10.0]) > 1.0);
        assert!(skewness(&[5.0, 5.0]).is_nan());
    }

    #[test]
    fn test_variance_ddof() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((variance(&values, 0).unwrap() - 1.25).abs() < 1e-12);
        assert!((variance(&values, 1).unwrap() - 5.0 / 3.0).abs() < 1e-12);
        assert_eq!(variance(&[1.0], 1), None);
    }

    #[test]
    fn test_value_counts_order() {
        let values: Vec<Option<String>> = ["b", "a", "b", "c", "a", "b"]
            .iter()
            .map(|s| Some(s.to_string()))
            .chain(std::iter::once(None))
            .collect();
        assert_eq!(
            value_counts(&values).unwrap(),
            vec![("b".to_string(), 3), ("a".to_string(), 2), ("c".to_string(), 1)]
        );
    }

    #[test]
    fn test_duplicate_count_with_nulls() {
        let df = df![
            "a" => [Some(1), Some(1), None, None, Some(2)],
            "b" => ["x", "x", "y", "y", "x"],
        ]
        .unwrap();
        assert_eq!(duplicate_count(&df).unwrap(), 2);
    }

    #[test]
    fn test_duplicate_count_signed_zero() {
        let df = df!["a" => [0.0, -0.0, 1.0]].unwrap();
        assert_eq!(duplicate_count(&df).unwrap(), 1);
    }

    #[test]
    fn test_n_unique_skips_nulls() {
        let df = df!["a" => [Some(1i64), None, Some(1), Some(2)]].unwrap();
        assert_eq!(n_unique(&df, "a").unwrap(), 2);
    }

    #[test]
    fn test_column_strings_numeric_keys() {
        let df = df!["n" => [1i64, 2, 3]].unwrap();
        let values = column_strings(&df, "n").unwrap();
        assert_eq!(values[0].as_deref(), Some("1"));
    }

    #[test]
    fn test_column_f64_rejects_text() {
        let df = df!["s" => ["a", "b"]].unwrap();
        let err = column_f64(&df, "s").unwrap_err();
        assert_eq!(err.error_code(), "TYPE_CONVERSION_FAILED");
    }

    #[test]
    fn test_correlation() {
        let a = vec![Some(1.0), Some(2.0), Some(3.0), None];
        let b = vec![Some(2.0), Some(4.0), Some(6.0), Some(1.0)];
        assert!((correlation(&a, &b).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_display_values() {
        let df = df![
            "s" => [Some("a"), None],
            "f" => [1.0, 2.5],
            "i" => [3i64, 4],
        ]
        .unwrap();
        assert_eq!(display_values(&df, "s").unwrap(), vec![Some("'a'".to_string()), None]);
        assert_eq!(
            display_values(&df, "f").unwrap(),
            vec![Some("1.0".to_string()), Some("2.5".to_string())]
        );
        assert_eq!(display_values(&df, "i").unwrap()[0].as_deref(), Some("3"));
    }

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a_64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63_dc4c_8601_ec8c);
    }
}

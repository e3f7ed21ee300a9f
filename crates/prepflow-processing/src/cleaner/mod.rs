//! Generic automatic cleaning used by the auto-clean preprocessing mode.
//!
//! The cleaner:
//! - Removes duplicate rows
//! - Drops columns with more than 70% missing values
//! - Drops rows with more than 80% missing values
//! - Fills numeric nulls with the median and text nulls with the mode
//! - Label-encodes text columns (sorted categories, codes from 0)

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::Result;
use crate::imputers::StatisticalImputer;
use crate::utils::{
    categorical_columns, column_f64, column_names, column_strings, drop_columns,
    numeric_columns, set_f64_column, set_string_column,
};

const COLUMN_MISSING_THRESHOLD: f64 = 0.7;
const ROW_MISSING_THRESHOLD: f64 = 0.8;

/// Note recorded in the narrative when auto-clean runs.
pub const AUTO_CLEAN_NOTE: &str = "Applied automatic cleaning (duplicates, sparse columns and rows, median/mode fill, label encoding)";

/// Stateless cleaner for the auto-clean mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoCleaner;

impl AutoCleaner {
    pub fn clean(&self, df: DataFrame) -> Result<DataFrame> {
        info!("Performing automatic data cleaning...");
        let mut df = df;

        // 1. Remove duplicate rows
        let before = df.height();
        df = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
        debug!("Removed {} duplicate rows", before - df.height());

        // 2. Remove columns with >70% missing values
        if df.height() > 0 {
            let rows = df.height() as f64;
            let sparse: Vec<String> = df
                .get_columns()
                .iter()
                .filter(|c| c.null_count() as f64 / rows > COLUMN_MISSING_THRESHOLD)
                .map(|c| c.name().to_string())
                .collect();
            debug!("Removing {} sparse column(s): {:?}", sparse.len(), sparse);
            df = drop_columns(df, &sparse);
        }

        // 3. Remove rows with >80% missing data
        if df.width() > 0 {
            let mut null_counts = Series::new("nulls".into(), vec![0u32; df.height()]);
            for col in df.get_columns() {
                let null_int = col.as_materialized_series().is_null().cast(&DataType::UInt32)?;
                null_counts = (&null_counts + &null_int)?;
            }
            let null_pct = &null_counts.cast(&DataType::Float64)? / df.width() as f64;
            let mask = null_pct.lt_eq(ROW_MISSING_THRESHOLD)?;
            let before = df.height();
            df = df.filter(&mask)?;
            debug!("Removed {} rows with >80% missing data", before - df.height());
        }

        // 4. Fill what is left
        for name in numeric_columns(&df) {
            let values = column_f64(&df, &name)?;
            if let Some(median) = StatisticalImputer::median(&values)
                && values.iter().any(Option::is_none)
            {
                set_f64_column(&mut df, &name, StatisticalImputer::fill(&values, median))?;
            }
        }
        for name in categorical_columns(&df) {
            let values = column_strings(&df, &name)?;
            if let Some(mode) = StatisticalImputer::mode_text(&values)
                && values.iter().any(Option::is_none)
            {
                set_string_column(&mut df, &name, StatisticalImputer::fill_text(&values, &mode))?;
            }
        }

        // 5. Label-encode text
        for name in categorical_columns(&df) {
            let codes = label_codes(&column_strings(&df, &name)?);
            df.replace(&name, Series::new(name.as_str().into(), codes))?;
        }

        debug!("Auto-cleaned columns: {:?}", column_names(&df));
        Ok(df)
    }
}

fn label_codes(values: &[Option<String>]) -> Vec<Option<i64>> {
    let mut categories: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
    categories.sort_unstable();
    categories.dedup();
    values
        .iter()
        .map(|v| {
            v.as_deref()
                .and_then(|s| categories.binary_search(&s).ok())
                .map(|i| i as i64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_auto_clean() {
        let df = df![
            "age" => [Some(30.0), Some(30.0), None, Some(50.0), None],
            "city" => [Some("b"), Some("b"), Some("a"), None, None],
            "sparse" => [None::<f64>, None, None, None, Some(1.0)],
            "id" => [Some(1i64), Some(1), Some(2), Some(3), None],
        ]
        .unwrap();

        let out = AutoCleaner.clean(df).unwrap();

        // duplicate row removed, sparse column dropped, last row is 3/3 null
        assert_eq!(out.shape(), (3, 3));
        assert_eq!(out.column("age").unwrap().null_count(), 0);
        let city: Vec<Option<i64>> = out
            .column("city")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(city, vec![Some(1), Some(0), Some(0)]);
    }
}

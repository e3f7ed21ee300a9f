//! Categorical encoding stage.
//!
//! Encoders run in a fixed order: one-hot, ordinal, frequency, target mean,
//! binary hash. Categories are compared by their string form, so numeric
//! codes such as `1` and text labels are handled the same way.
//!
//! The binary encoder hashes each value with FNV-1a and keeps the low
//! `ceil(log2(distinct))` bits. It is not invertible and distinct
//! categories may share a bit pattern.

use std::collections::{BTreeSet, HashMap};

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EncodingConfig;
use crate::error::Result;
use crate::utils::{
    bracket_list, column_f64, column_strings, fnv1a_64, has_column, set_f64_column, value_counts,
};

/// Hash input used for nulls by the binary encoder.
const NULL_HASH_KEY: &str = "nan";
const UNKNOWN_ORDINAL: f64 = -1.0;

/// Sorted categories seen at fit time for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FittedCategories {
    pub column: String,
    pub categories: Vec<String>,
}

impl FittedCategories {
    fn index_of(&self, value: &str) -> Option<usize> {
        self.categories.binary_search_by(|c| c.as_str().cmp(value)).ok()
    }
}

#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    config: EncodingConfig,
    onehot: Vec<FittedCategories>,
    ordinal: Vec<FittedCategories>,
    frequency: Vec<(String, HashMap<String, usize>)>,
    target_means: Vec<(String, HashMap<String, f64>)>,
    binary: Vec<(String, usize)>,
}

impl CategoricalEncoder {
    pub fn new(config: EncodingConfig) -> Self {
        Self {
            config,
            onehot: Vec::new(),
            ordinal: Vec::new(),
            frequency: Vec::new(),
            target_means: Vec::new(),
            binary: Vec::new(),
        }
    }

    /// Categories behind each one-hot block; indicator `i` is `{column}_{categories[i]}`.
    pub fn onehot_categories(&self) -> &[FittedCategories] {
        &self.onehot
    }

    /// Ordinal codes: category `i` encodes as `i`, anything else as -1.
    pub fn ordinal_maps(&self) -> &[FittedCategories] {
        &self.ordinal
    }

    /// Bit count per binary-encoded column.
    pub fn binary_widths(&self) -> &[(String, usize)] {
        &self.binary
    }

    /// Fit every configured encoder and apply it.
    ///
    /// `target` names the column used for target mean encoding; without it
    /// that encoder is skipped.
    pub fn fit_transform(
        &mut self,
        df: DataFrame,
        target: Option<&str>,
        processing_steps: &mut Vec<String>,
    ) -> Result<DataFrame> {
        info!("Encoding categorical columns...");
        let mut df = df;
        let config = self.config.clone();

        self.onehot.clear();
        for column in present(&df, &config.onehot, "one-hot") {
            let fitted = fit_categories(&df, &column)?;
            df = apply_onehot(df, &fitted)?;
            processing_steps.push(format!(
                "One-hot encoded '{}' into {} column(s)",
                column,
                fitted.categories.len()
            ));
            self.onehot.push(fitted);
        }

        self.ordinal.clear();
        for column in present(&df, &config.ordinal, "ordinal") {
            let fitted = fit_categories(&df, &column)?;
            apply_ordinal(&mut df, &fitted)?;
            processing_steps.push(format!(
                "Ordinal encoded '{}' ({} categories)",
                column,
                fitted.categories.len()
            ));
            self.ordinal.push(fitted);
        }

        self.frequency.clear();
        for column in present(&df, &config.frequency, "frequency") {
            let counts: HashMap<String, usize> =
                value_counts(&column_strings(&df, &column)?)?.into_iter().collect();
            apply_lookup(&mut df, &column, |key| counts.get(key).map(|c| *c as f64))?;
            processing_steps.push(format!("Frequency encoded '{}'", column));
            self.frequency.push((column, counts));
        }

        self.target_means.clear();
        if !config.target.is_empty() {
            match target.filter(|t| has_column(&df, t)) {
                None => warn!(
                    "Skipping target encoding for {}: no target column",
                    bracket_list(&config.target)
                ),
                Some(target) => {
                    let y = column_f64(&df, target)?;
                    for column in present(&df, &config.target, "target") {
                        let means = fit_target_means(&column_strings(&df, &column)?, &y);
                        apply_lookup(&mut df, &column, |key| means.get(key).copied())?;
                        processing_steps.push(format!(
                            "Target encoded '{}' with the mean of '{}'",
                            column, target
                        ));
                        self.target_means.push((column, means));
                    }
                }
            }
        }

        self.binary.clear();
        for column in present(&df, &config.binary, "binary") {
            let values = column_strings(&df, &column)?;
            let distinct: BTreeSet<Option<&str>> = values.iter().map(Option::as_deref).collect();
            let bits = bit_width(distinct.len());
            df = apply_binary(df, &column, bits)?;
            processing_steps.push(format!(
                "Binary encoded '{}' into {} bit column(s)",
                column, bits
            ));
            self.binary.push((column, bits));
        }

        Ok(df)
    }

    /// Apply the fitted encoders to new data. Unknown categories give all-zero
    /// one-hot rows, ordinal -1 and null frequency/target values.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = df.clone();
        for fitted in &self.onehot {
            if has_column(&df, &fitted.column) {
                df = apply_onehot(df, fitted)?;
            }
        }
        for fitted in &self.ordinal {
            if has_column(&df, &fitted.column) {
                apply_ordinal(&mut df, fitted)?;
            }
        }
        for (column, counts) in &self.frequency {
            if has_column(&df, column) {
                apply_lookup(&mut df, column, |key| counts.get(key).map(|c| *c as f64))?;
            }
        }
        for (column, means) in &self.target_means {
            if has_column(&df, column) {
                apply_lookup(&mut df, column, |key| means.get(key).copied())?;
            }
        }
        for (column, bits) in &self.binary {
            if has_column(&df, column) {
                df = apply_binary(df, column, *bits)?;
            }
        }
        Ok(df)
    }
}

fn present(df: &DataFrame, listed: &[String], encoder: &str) -> Vec<String> {
    listed
        .iter()
        .filter(|c| {
            let found = has_column(df, c);
            if !found {
                warn!("Skipping {} encoding for '{}': column not found", encoder, c);
            }
            found
        })
        .cloned()
        .collect()
}

fn fit_categories(df: &DataFrame, column: &str) -> Result<FittedCategories> {
    let categories: BTreeSet<String> = column_strings(df, column)?.into_iter().flatten().collect();
    debug!("'{}': {} categories", column, categories.len());
    Ok(FittedCategories {
        column: column.to_string(),
        categories: categories.into_iter().collect(),
    })
}

/// Replace `column` with one Float64 indicator per fitted category, appended last.
fn apply_onehot(mut df: DataFrame, fitted: &FittedCategories) -> Result<DataFrame> {
    let values = column_strings(&df, &fitted.column)?;
    let codes: Vec<Option<usize>> = values
        .iter()
        .map(|v| v.as_deref().and_then(|s| fitted.index_of(s)))
        .collect();
    df = df.drop(&fitted.column)?;
    for (i, category) in fitted.categories.iter().enumerate() {
        let indicator: Vec<f64> = codes
            .iter()
            .map(|c| if *c == Some(i) { 1.0 } else { 0.0 })
            .collect();
        let name = format!("{}_{}", fitted.column, category);
        df.with_column(Series::new(name.into(), indicator))?;
    }
    Ok(df)
}

fn apply_ordinal(df: &mut DataFrame, fitted: &FittedCategories) -> Result<()> {
    apply_lookup(df, &fitted.column, |key| {
        Some(fitted.index_of(key).map_or(UNKNOWN_ORDINAL, |i| i as f64))
    })
}

/// Map every non-null value through `lookup`; nulls stay null.
fn apply_lookup<F>(df: &mut DataFrame, column: &str, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<f64>,
{
    let mapped = column_strings(df, column)?
        .iter()
        .map(|v| v.as_deref().and_then(&lookup))
        .collect();
    set_f64_column(df, column, mapped)
}

/// Mean of `y` per category, over rows where both are present.
fn fit_target_means(categories: &[Option<String>], y: &[Option<f64>]) -> HashMap<String, f64> {
    let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
    for (category, value) in categories.iter().zip(y) {
        if let (Some(category), Some(value)) = (category, value)
            && !value.is_nan()
        {
            let entry = sums.entry(category.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(k, (sum, n))| (k, sum / n as f64))
        .collect()
}

/// `ceil(log2(distinct))`, zero for one distinct value or fewer.
fn bit_width(distinct: usize) -> usize {
    if distinct <= 1 {
        0
    } else {
        (usize::BITS - (distinct - 1).leading_zeros()) as usize
    }
}

/// Replace `column` with `bits` Int64 columns `{column}_bit_{i}`, appended last.
fn apply_binary(mut df: DataFrame, column: &str, bits: usize) -> Result<DataFrame> {
    let hashes: Vec<u64> = column_strings(&df, column)?
        .iter()
        .map(|v| fnv1a_64(v.as_deref().unwrap_or(NULL_HASH_KEY).as_bytes()))
        .collect();
    df = df.drop(column)?;
    for i in 0..bits {
        let bit: Vec<i64> = hashes.iter().map(|h| ((h >> i) & 1) as i64).collect();
        df.with_column(Series::new(format!("{}_bit_{}", column, i).into(), bit))?;
    }
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_names;
    use pretty_assertions::assert_eq;

    fn encoder(config: EncodingConfig) -> CategoricalEncoder {
        CategoricalEncoder::new(config)
    }

    #[test]
    fn test_onehot_columns_and_unknowns() {
        let df = df![
            "id" => [1i64, 2, 3, 4],
            "color" => [Some("red"), Some("blue"), None, Some("red")],
        ]
        .unwrap();
        let mut enc = encoder(EncodingConfig {
            onehot: vec!["color".into()],
            ..Default::default()
        });
        let out = enc.fit_transform(df, None, &mut Vec::new()).unwrap();

        assert_eq!(column_names(&out), vec!["id", "color_blue", "color_red"]);
        assert_eq!(
            column_f64(&out, "color_red").unwrap(),
            vec![Some(1.0), Some(0.0), Some(0.0), Some(1.0)]
        );
        assert_eq!(enc.onehot_categories()[0].categories, vec!["blue", "red"]);

        let new = df!["id" => [5i64], "color" => ["green"]].unwrap();
        let out = enc.transform(&new).unwrap();
        assert_eq!(column_f64(&out, "color_blue").unwrap(), vec![Some(0.0)]);
        assert_eq!(column_f64(&out, "color_red").unwrap(), vec![Some(0.0)]);
    }

    #[test]
    fn test_ordinal_and_frequency() {
        let df = df![
            "size" => ["m", "s", "l", "m"],
            "city" => ["x", "y", "x", "x"],
        ]
        .unwrap();
        let mut enc = encoder(EncodingConfig {
            ordinal: vec!["size".into()],
            frequency: vec!["city".into()],
            ..Default::default()
        });
        let out = enc.fit_transform(df, None, &mut Vec::new()).unwrap();
        assert_eq!(
            column_f64(&out, "size").unwrap(),
            vec![Some(1.0), Some(2.0), Some(0.0), Some(1.0)]
        );
        assert_eq!(
            column_f64(&out, "city").unwrap(),
            vec![Some(3.0), Some(1.0), Some(3.0), Some(3.0)]
        );

        let new = df!["size" => ["xl"], "city" => ["y"]].unwrap();
        let out = enc.transform(&new).unwrap();
        assert_eq!(column_f64(&out, "size").unwrap(), vec![Some(-1.0)]);
        assert_eq!(column_f64(&out, "city").unwrap(), vec![Some(1.0)]);
    }

    #[test]
    fn test_target_mean_encoding() {
        let df = df![
            "grp" => ["a", "b", "a", "b"],
            "y" => [1.0, 10.0, 3.0, 20.0],
        ]
        .unwrap();
        let mut enc = encoder(EncodingConfig {
            target: vec!["grp".into()],
            ..Default::default()
        });
        let out = enc.fit_transform(df.clone(), Some("y"), &mut Vec::new()).unwrap();
        assert_eq!(
            column_f64(&out, "grp").unwrap(),
            vec![Some(2.0), Some(15.0), Some(2.0), Some(15.0)]
        );

        let mut no_target = encoder(EncodingConfig {
            target: vec!["grp".into()],
            ..Default::default()
        });
        let out = no_target.fit_transform(df, None, &mut Vec::new()).unwrap();
        assert_eq!(out.column("grp").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_target_encoding_requires_numeric_target() {
        let df = df!["grp" => ["a"], "label" => ["yes"]].unwrap();
        let mut enc = encoder(EncodingConfig {
            target: vec!["grp".into()],
            ..Default::default()
        });
        let err = enc.fit_transform(df, Some("label"), &mut Vec::new()).unwrap_err();
        assert_eq!(err.error_code(), "TYPE_CONVERSION_FAILED");
    }

    #[test]
    fn test_binary_encoding_is_stable() {
        let df = df!["c" => [Some("a"), Some("b"), Some("c"), None, Some("a")]].unwrap();
        let mut enc = encoder(EncodingConfig {
            binary: vec!["c".into()],
            ..Default::default()
        });
        let out = enc.fit_transform(df.clone(), None, &mut Vec::new()).unwrap();
        assert_eq!(column_names(&out), vec!["c_bit_0", "c_bit_1"]);
        assert_eq!(enc.binary_widths(), &[("c".to_string(), 2)]);

        let bit0: Vec<Option<i64>> = out
            .column("c_bit_0")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(bit0[0], Some((fnv1a_64(b"a") & 1) as i64));
        assert_eq!(bit0[3], Some((fnv1a_64(b"nan") & 1) as i64));
        assert_eq!(bit0[0], bit0[4]);

        let again = enc.transform(&df).unwrap();
        assert!(again.equals(&out));
    }

    #[test]
    fn test_bit_width() {
        assert_eq!(bit_width(0), 0);
        assert_eq!(bit_width(1), 0);
        assert_eq!(bit_width(2), 1);
        assert_eq!(bit_width(3), 2);
        assert_eq!(bit_width(4), 2);
        assert_eq!(bit_width(5), 3);
    }
}

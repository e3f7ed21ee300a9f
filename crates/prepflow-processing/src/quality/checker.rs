//! Rule-driven audit of a loaded table.
//!
//! The checker never mutates the frame and never fails on data problems:
//! findings become [`QualityIssue`] entries plus human-readable pro/con
//! lines. Only an unusable schema or a frame Polars cannot read aborts.

use std::collections::{HashMap, HashSet};

use polars::prelude::DataFrame;
use tracing::{debug, info};

use crate::error::Result;
use crate::schema::DataSchema;
use crate::types::{
    CategoricalSummary, ColumnDescription, NumericSummary, QualityIssue, QualityReport, Severity,
    SummaryStats,
};
use crate::utils::{
    categorical_columns, column_f64, column_names, column_strings, display_values,
    duplicate_count, format_thousands, has_column, is_numeric_dtype, mean, n_unique,
    min_max, numeric_columns, percentiles, skewness, std_dev, valid_values, value_counts,
};

const MIN_ROWS: usize = 10;
const MIN_COLUMNS: usize = 3;
const HIGH_MISSING_PCT: f64 = 70.0;
const HIGH_DUPLICATE_PCT: f64 = 70.0;
const SEVERE_IMBALANCE: f64 = 0.1;
const MODERATE_IMBALANCE: f64 = 0.3;
const HIGH_SKEW: f64 = 2.0;
const MODERATE_SKEW: f64 = 1.0;
const HIGH_CONCENTRATION: f64 = 0.9;
const MODERATE_CONCENTRATION: f64 = 0.7;
const DOMAIN_EXAMPLES: usize = 5;
const CATEGORICAL_NUMERIC_MAX_UNIQUE: usize = 20;

/// Columns whose values must never be negative.
const NON_NEGATIVE_NAMES: [&str; 4] = ["age", "price", "salary", "income"];

pub struct DataQualityChecker<'a> {
    df: &'a DataFrame,
    schema: Option<&'a DataSchema>,
    issues: Vec<QualityIssue>,
    pros: Vec<String>,
    cons: Vec<String>,
}

impl<'a> DataQualityChecker<'a> {
    pub fn new(df: &'a DataFrame, schema: Option<&'a DataSchema>) -> Self {
        Self {
            df,
            schema,
            issues: Vec::new(),
            pros: Vec::new(),
            cons: Vec::new(),
        }
    }

    /// Run every check in order and build the report.
    pub fn check(mut self) -> Result<QualityReport> {
        if let Some(schema) = self.schema {
            schema.validate()?;
        }

        self.check_basic_info();
        self.check_data_types();
        self.check_missing_values();
        self.check_duplicates()?;
        self.check_uniqueness()?;
        self.check_range_constraints()?;
        self.check_domain_constraints()?;
        self.check_regex_patterns()?;
        self.check_class_imbalance()?;
        self.check_value_distributions()?;
        self.check_invalid_values()?;

        let summary_stats = summary_stats(self.df)?;
        info!(
            "Quality check finished: {} issue(s), {} pro(s), {} con(s)",
            self.issues.len(),
            self.pros.len(),
            self.cons.len()
        );

        Ok(QualityReport {
            total_rows: self.df.height(),
            total_columns: self.df.width(),
            issues: self.issues,
            pros: self.pros,
            cons: self.cons,
            summary_stats,
            runtime_secs: None,
        })
    }

    fn add_issue(&mut self, issue: QualityIssue) {
        debug!("{} [{}] {}", issue.severity.as_str(), issue.category, issue.message);
        self.issues.push(issue);
    }

    fn pro(&mut self, message: impl AsRef<str>) {
        self.pros.push(format!("✅ {}", message.as_ref()));
    }

    fn con(&mut self, message: impl AsRef<str>) {
        self.cons.push(format!("❌ {}", message.as_ref()));
    }

    fn check_basic_info(&mut self) {
        let rows = self.df.height();
        if rows == 0 {
            self.add_issue(QualityIssue::new(Severity::Error, "Basic", None, "Dataset is empty"));
            self.con("Dataset contains no rows");
        } else if rows < MIN_ROWS {
            let message = format!("Dataset has very few rows ({})", rows);
            self.add_issue(QualityIssue::new(Severity::Warning, "Basic", None, &message));
            self.con(message);
        } else {
            self.pro(format!("Dataset contains {} rows", format_thousands(rows)));
        }

        let columns = self.df.width();
        if columns == 0 {
            self.add_issue(QualityIssue::new(
                Severity::Error,
                "Basic",
                None,
                "Dataset has no columns",
            ));
            self.con("Dataset contains no columns");
        } else if columns < MIN_COLUMNS {
            let message = format!("Dataset has very few columns ({})", columns);
            self.add_issue(QualityIssue::new(Severity::Warning, "Basic", None, &message));
            self.con(message);
        } else {
            self.pro(format!("Dataset contains {} columns", columns));
        }

        if let Some(target) = self.schema.and_then(|s| s.target_column.as_deref()) {
            if has_column(self.df, target) {
                self.pro(format!("Target column '{}' is present", target));
            } else {
                let message = format!("Target column '{}' is missing from dataset", target);
                self.add_issue(QualityIssue::new(
                    Severity::Error,
                    "Target",
                    Some(target),
                    &message,
                ));
                self.con(message);
            }
        }
    }

    fn check_data_types(&mut self) {
        let Some(schema) = self.schema else {
            return;
        };

        let mut checked = 0;
        let mut correct = 0;
        for column in &schema.columns {
            let Ok(actual) = self.df.column(&column.name) else {
                continue;
            };
            checked += 1;
            let actual = actual.dtype();
            if column.matches_dtype(actual) {
                correct += 1;
            } else {
                self.add_issue(QualityIssue::new(
                    Severity::Warning,
                    "DataType",
                    Some(&column.name),
                    format!("Expected {}, got {}", column.dtype, actual),
                ));
                self.con(format!(
                    "Column '{}' has incorrect data type (expected {}, got {})",
                    column.name, column.dtype, actual
                ));
            }
        }

        if checked > 0 && correct == checked {
            self.pro("All columns have correct data types");
        } else if correct > 0 {
            self.pro(format!("{}/{} columns have correct data types", correct, checked));
        }
    }

    fn check_missing_values(&mut self) {
        let rows = self.df.height();
        let missing: Vec<(String, usize)> = self
            .df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.null_count()))
            .filter(|(_, n)| *n > 0)
            .collect();

        if missing.is_empty() {
            self.pro("No missing values found");
        }
        for (name, count) in missing {
            let percentage = count as f64 / rows as f64 * 100.0;
            if percentage >= HIGH_MISSING_PCT {
                self.add_issue(
                    QualityIssue::new(
                        Severity::Warning,
                        "Missing",
                        Some(&name),
                        format!("{} missing values ({:.1}%)", count, percentage),
                    )
                    .with_count(count)
                    .with_percentage(percentage),
                );
            }
            self.con(format!(
                "Column '{}' has {} missing values ({:.1}%)",
                name, count, percentage
            ));
        }

        let Some(schema) = self.schema else {
            return;
        };
        for column in schema.columns.iter().filter(|c| !c.nullable) {
            let has_nulls = self
                .df
                .column(&column.name)
                .map(|c| c.null_count() > 0)
                .unwrap_or(false);
            if has_nulls {
                self.add_issue(QualityIssue::new(
                    Severity::Error,
                    "Missing",
                    Some(&column.name),
                    "Column marked as non-nullable but contains missing values",
                ));
                self.con(format!(
                    "Non-nullable column '{}' contains missing values",
                    column.name
                ));
            }
        }
    }

    fn check_duplicates(&mut self) -> Result<()> {
        let duplicates = duplicate_count(self.df)?;
        if duplicates == 0 {
            self.pro("No duplicate rows found");
            return Ok(());
        }

        let percentage = duplicates as f64 / self.df.height() as f64 * 100.0;
        if percentage >= HIGH_DUPLICATE_PCT {
            self.add_issue(
                QualityIssue::new(
                    Severity::Warning,
                    "Duplicates",
                    None,
                    format!("{} duplicate rows ({:.1}%)", duplicates, percentage),
                )
                .with_count(duplicates)
                .with_percentage(percentage),
            );
        }
        self.con(format!(
            "{} duplicate rows found ({:.1}%)",
            duplicates, percentage
        ));

        for (row, count) in repeated_rows(self.df)? {
            self.con(format!(
                "Row {} appears {} times → {} duplicates",
                row,
                count,
                count - 1
            ));
        }
        Ok(())
    }

    fn check_uniqueness(&mut self) -> Result<()> {
        let Some(schema) = self.schema else {
            return Ok(());
        };

        for column in schema.columns.iter().filter(|c| c.unique) {
            let Ok(values) = self.df.column(&column.name) else {
                continue;
            };
            let non_null = values.len() - values.null_count();
            let distinct = n_unique(self.df, &column.name)?;

            if distinct == non_null {
                self.pro(format!(
                    "Column '{}' maintains uniqueness constraint",
                    column.name
                ));
            } else {
                let duplicates = non_null - distinct;
                let message = format!("should be unique but has {} duplicates", duplicates);
                self.add_issue(QualityIssue::new(
                    Severity::Error,
                    "Uniqueness",
                    Some(&column.name),
                    format!("Column {}", message),
                ));
                self.con(format!("Column '{}' {}", column.name, message));
            }
        }
        Ok(())
    }

    fn check_range_constraints(&mut self) -> Result<()> {
        let Some(schema) = self.schema else {
            return Ok(());
        };

        for column in &schema.columns {
            let numeric = self
                .df
                .column(&column.name)
                .map(|c| is_numeric_dtype(c.dtype()))
                .unwrap_or(false);
            if !numeric || (column.min_value.is_none() && column.max_value.is_none()) {
                continue;
            }
            let values = column_f64(self.df, &column.name)?;

            if let Some(min) = column.min_value {
                let below = values.iter().flatten().filter(|v| **v < min).count();
                if below > 0 {
                    self.add_issue(
                        QualityIssue::new(
                            Severity::Error,
                            "Range",
                            Some(&column.name),
                            format!("{} values below minimum ({})", below, min),
                        )
                        .with_count(below),
                    );
                    self.con(format!(
                        "Column '{}' has {} values below minimum ({})",
                        column.name, below, min
                    ));
                } else {
                    self.pro(format!(
                        "Column '{}' respects minimum value constraint",
                        column.name
                    ));
                }
            }

            if let Some(max) = column.max_value {
                let above = values.iter().flatten().filter(|v| **v > max).count();
                if above > 0 {
                    self.add_issue(
                        QualityIssue::new(
                            Severity::Error,
                            "Range",
                            Some(&column.name),
                            format!("{} values above maximum ({})", above, max),
                        )
                        .with_count(above),
                    );
                    self.con(format!(
                        "Column '{}' has {} values above maximum ({})",
                        column.name, above, max
                    ));
                } else {
                    self.pro(format!(
                        "Column '{}' respects maximum value constraint",
                        column.name
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_domain_constraints(&mut self) -> Result<()> {
        let Some(schema) = self.schema else {
            return Ok(());
        };

        for column in &schema.columns {
            let Some(allowed) = column.allowed_keys().filter(|a| !a.is_empty()) else {
                continue;
            };
            if !has_column(self.df, &column.name) {
                continue;
            }
            let allowed: HashSet<String> = allowed.into_iter().collect();
            let keys = column_strings(self.df, &column.name)?;
            let shown = display_values(self.df, &column.name)?;

            let mut invalid = 0;
            let mut examples: Vec<String> = Vec::new();
            for (key, display) in keys.iter().zip(&shown) {
                let (Some(key), Some(display)) = (key, display) else {
                    continue;
                };
                if !allowed.contains(key) {
                    invalid += 1;
                    if !examples.contains(display) {
                        examples.push(display.clone());
                    }
                }
            }

            if invalid == 0 {
                self.pro(format!(
                    "Column '{}' contains only allowed values",
                    column.name
                ));
            } else {
                examples.truncate(DOMAIN_EXAMPLES);
                self.add_issue(
                    QualityIssue::new(
                        Severity::Error,
                        "Domain",
                        Some(&column.name),
                        format!(
                            "{} values not in allowed domain: [{}]",
                            invalid,
                            examples.join(", ")
                        ),
                    )
                    .with_count(invalid),
                );
                self.con(format!(
                    "Column '{}' has {} values outside allowed domain",
                    column.name, invalid
                ));
            }
        }
        Ok(())
    }

    fn check_regex_patterns(&mut self) -> Result<()> {
        let Some(schema) = self.schema else {
            return Ok(());
        };

        for column in &schema.columns {
            if !has_column(self.df, &column.name) {
                continue;
            }
            let (Some(regex), Some(pattern)) =
                (column.compiled_pattern()?, column.regex_pattern.as_deref())
            else {
                continue;
            };

            let values = column_strings(self.df, &column.name)?;
            let invalid = values
                .iter()
                .flatten()
                .filter(|v| !regex.is_match(v))
                .count();

            if invalid == 0 {
                self.pro(format!("Column '{}' matches required pattern", column.name));
            } else {
                self.add_issue(
                    QualityIssue::new(
                        Severity::Error,
                        "Pattern",
                        Some(&column.name),
                        format!("{} values don't match pattern '{}'", invalid, pattern),
                    )
                    .with_count(invalid),
                );
                self.con(format!(
                    "Column '{}' has {} values not matching required pattern",
                    column.name, invalid
                ));
            }
        }
        Ok(())
    }

    fn check_class_imbalance(&mut self) -> Result<()> {
        let Some(target) = self.schema.and_then(|s| s.target_column.as_deref()) else {
            return Ok(());
        };
        if !has_column(self.df, target) {
            return Ok(());
        }

        let counts = value_counts(&column_strings(self.df, target)?)?;
        if counts.len() < 2 {
            return Ok(());
        }
        let total: usize = counts.iter().map(|(_, n)| n).sum();
        let smallest = counts.iter().map(|(_, n)| *n).min().unwrap_or(0);
        let ratio = smallest as f64 / total as f64;
        let pct = ratio * 100.0;

        if ratio < SEVERE_IMBALANCE {
            self.add_issue(QualityIssue::new(
                Severity::Warning,
                "Imbalance",
                Some(target),
                format!("Severe class imbalance detected. Smallest class: {:.1}%", pct),
            ));
            self.con(format!(
                "Severe class imbalance in target column (smallest class: {:.1}%)",
                pct
            ));
        } else if ratio < MODERATE_IMBALANCE {
            self.add_issue(QualityIssue::new(
                Severity::Info,
                "Imbalance",
                Some(target),
                format!("Moderate class imbalance detected. Smallest class: {:.1}%", pct),
            ));
            self.con(format!(
                "Moderate class imbalance in target column (smallest class: {:.1}%)",
                pct
            ));
        } else {
            self.pro("Target column classes are reasonably balanced");
        }
        Ok(())
    }

    fn check_value_distributions(&mut self) -> Result<()> {
        for name in numeric_columns(self.df) {
            let skew = skewness(&valid_values(&column_f64(self.df, &name)?));
            if skew.abs() > HIGH_SKEW {
                self.add_issue(QualityIssue::new(
                    Severity::Warning,
                    "Distribution",
                    Some(&name),
                    format!("Highly skewed distribution (skewness: {:.2})", skew),
                ));
                self.con(format!(
                    "Column '{}' has highly skewed distribution (skewness: {:.2})",
                    name, skew
                ));
            } else if skew.abs() > MODERATE_SKEW {
                self.add_issue(QualityIssue::new(
                    Severity::Info,
                    "Distribution",
                    Some(&name),
                    format!("Moderately skewed distribution (skewness: {:.2})", skew),
                ));
            } else {
                // NaN skew (constant or empty column) lands here.
                self.pro(format!("Column '{}' has approximately normal distribution", name));
            }
        }

        let rows = self.df.height();
        for name in categorical_columns(self.df) {
            let counts = value_counts(&column_strings(self.df, &name)?)?;
            let Some((_, top)) = counts.first() else {
                continue;
            };
            let ratio = *top as f64 / rows as f64;
            let pct = ratio * 100.0;

            if ratio > HIGH_CONCENTRATION {
                self.add_issue(QualityIssue::new(
                    Severity::Warning,
                    "Distribution",
                    Some(&name),
                    format!(
                        "Highly concentrated values ({:.1}% in most common category)",
                        pct
                    ),
                ));
                self.con(format!(
                    "Column '{}' has highly concentrated values ({:.1}% in most common)",
                    name, pct
                ));
            } else if ratio > MODERATE_CONCENTRATION {
                self.add_issue(QualityIssue::new(
                    Severity::Info,
                    "Distribution",
                    Some(&name),
                    format!(
                        "Moderately concentrated values ({:.1}% in most common category)",
                        pct
                    ),
                ));
            } else {
                self.pro(format!("Column '{}' has well-distributed values", name));
            }
        }
        Ok(())
    }

    fn check_invalid_values(&mut self) -> Result<()> {
        let text: HashSet<String> = categorical_columns(self.df).into_iter().collect();
        let numeric: HashSet<String> = numeric_columns(self.df).into_iter().collect();

        for name in column_names(self.df) {
            if numeric.contains(&name) {
                let values = column_f64(self.df, &name)?;
                let infinite = values.iter().flatten().filter(|v| v.is_infinite()).count();
                if infinite > 0 {
                    self.add_issue(
                        QualityIssue::new(
                            Severity::Error,
                            "Invalid",
                            Some(&name),
                            format!("{} infinite values detected", infinite),
                        )
                        .with_count(infinite),
                    );
                    self.con(format!("Column '{}' contains {} infinite values", name, infinite));
                } else {
                    self.pro(format!("Column '{}' contains no infinite values", name));
                }

                if NON_NEGATIVE_NAMES.contains(&name.to_lowercase().as_str()) {
                    let negative = values.iter().flatten().filter(|v| **v < 0.0).count();
                    if negative > 0 {
                        self.add_issue(
                            QualityIssue::new(
                                Severity::Error,
                                "Logic",
                                Some(&name),
                                format!(
                                    "{} negative values in column that should be positive",
                                    negative
                                ),
                            )
                            .with_count(negative),
                        );
                        self.con(format!(
                            "Column '{}' contains {} negative values (should be positive)",
                            name, negative
                        ));
                    }
                }
            } else if text.contains(&name) {
                let values = column_strings(self.df, &name)?;
                let empty = values.iter().flatten().filter(|v| v.is_empty()).count();
                let whitespace = values
                    .iter()
                    .flatten()
                    .filter(|v| !v.is_empty() && v.trim().is_empty())
                    .count();

                if empty > 0 {
                    self.add_issue(
                        QualityIssue::new(
                            Severity::Warning,
                            "Invalid",
                            Some(&name),
                            format!("{} empty string values", empty),
                        )
                        .with_count(empty),
                    );
                    self.con(format!("Column '{}' contains {} empty strings", name, empty));
                }
                if whitespace > 0 {
                    self.add_issue(
                        QualityIssue::new(
                            Severity::Warning,
                            "Invalid",
                            Some(&name),
                            format!("{} whitespace-only values", whitespace),
                        )
                        .with_count(whitespace),
                    );
                    self.con(format!(
                        "Column '{}' contains {} whitespace-only values",
                        name, whitespace
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Fully non-null rows that occur more than once, as `(tuple, count)`,
/// most frequent first and ties in order of first appearance.
fn repeated_rows(df: &DataFrame) -> Result<Vec<(String, usize)>> {
    let columns = column_names(df)
        .iter()
        .map(|name| display_values(df, name))
        .collect::<Result<Vec<_>>>()?;

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for row in 0..df.height() {
        let cells: Option<Vec<&str>> = columns.iter().map(|c| c[row].as_deref()).collect();
        let Some(cells) = cells else {
            continue;
        };
        let key = if cells.len() == 1 {
            format!("({},)", cells[0])
        } else {
            format!("({})", cells.join(", "))
        };
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }

    counts.retain(|(_, n)| *n > 1);
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(counts)
}

fn summary_stats(df: &DataFrame) -> Result<SummaryStats> {
    let numeric = numeric_columns(df);
    let mut describe = Vec::with_capacity(numeric.len());
    let mut numeric_summary = Vec::with_capacity(numeric.len());

    for name in &numeric {
        let values = valid_values(&column_f64(df, name)?);
        let std = std_dev(&values, 1);
        let range = min_max(&values);
        let quartiles = percentiles(&values, &[0.25, 0.5, 0.75]);
        let quartile = |i: usize| quartiles.as_ref().map(|q| q[i]);
        describe.push(ColumnDescription {
            column: name.clone(),
            count: values.len(),
            mean: mean(&values),
            std,
            min: range.map(|r| r.0),
            q25: quartile(0),
            q50: quartile(1),
            q75: quartile(2),
            max: range.map(|r| r.1),
        });
        numeric_summary.push(NumericSummary {
            column: name.clone(),
            mean: mean(&values),
            std,
            min: range.map(|r| r.0),
            max: range.map(|r| r.1),
        });
    }

    let mut nunique = Vec::with_capacity(df.width());
    for name in column_names(df) {
        let distinct = n_unique(df, &name)?;
        nunique.push((name, distinct));
    }

    let mut categorical = categorical_columns(df);
    for name in &numeric {
        if n_unique(df, name)? < CATEGORICAL_NUMERIC_MAX_UNIQUE {
            categorical.push(name.clone());
        }
    }
    let mut categorical_summary = Vec::with_capacity(categorical.len());
    for name in categorical {
        let counts = value_counts(&column_strings(df, &name)?)?;
        categorical_summary.push(CategoricalSummary {
            column: name,
            unique_count: counts.len(),
            most_common: counts.first().map(|(v, _)| v.clone()),
        });
    }

    Ok(SummaryStats {
        shape: df.shape(),
        columns: column_names(df),
        dtypes: df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.dtype().to_string()))
            .collect(),
        describe,
        nunique,
        memory_usage_bytes: df.estimated_size(),
        numeric_summary,
        categorical_summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSchema;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn messages(report: &QualityReport, category: &str) -> Vec<String> {
        report
            .issues
            .iter()
            .filter(|i| i.category == category)
            .map(|i| i.message.clone())
            .collect()
    }

    #[test]
    fn test_small_dataset_warnings() {
        let df = df!["a" => [1, 2, 3]].unwrap();
        let report = DataQualityChecker::new(&df, None).check().unwrap();

        assert_eq!(
            messages(&report, "Basic"),
            vec![
                "Dataset has very few rows (3)".to_string(),
                "Dataset has very few columns (1)".to_string(),
            ]
        );
        assert!(report.cons.contains(&"❌ Dataset has very few rows (3)".to_string()));
        assert!(report.pros.contains(&"✅ No missing values found".to_string()));
    }

    #[test]
    fn test_missing_value_warning_threshold() {
        let df = df![
            "mostly_null" => [None, None, None, Some(1.0)],
            "some_null" => [None, Some(1.0), Some(2.0), Some(3.0)],
        ]
        .unwrap();
        let report = DataQualityChecker::new(&df, None).check().unwrap();

        let missing: Vec<&QualityIssue> = report
            .issues
            .iter()
            .filter(|i| i.category == "Missing")
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].column.as_deref(), Some("mostly_null"));
        assert_eq!(missing[0].message, "3 missing values (75.0%)");
        assert_eq!(missing[0].count, Some(3));
        assert!(
            report
                .cons
                .contains(&"❌ Column 'some_null' has 1 missing values (25.0%)".to_string())
        );
    }

    #[test]
    fn test_non_nullable_column_is_error() {
        let df = df!["id" => [Some(1), None]].unwrap();
        let schema = DataSchema::new(vec![ColumnSchema::new("id", "int").non_nullable()]);
        let report = DataQualityChecker::new(&df, Some(&schema)).check().unwrap();
        assert!(report.has_errors());
    }

    #[test]
    fn test_duplicate_rows_reported() {
        let df = df![
            "a" => [1, 1, 1, 2],
            "b" => ["x", "x", "x", "y"],
        ]
        .unwrap();
        let report = DataQualityChecker::new(&df, None).check().unwrap();
        assert!(report.cons.contains(&"❌ 2 duplicate rows found (50.0%)".to_string()));
        assert!(
            report
                .cons
                .contains(&"❌ Row (1, 'x') appears 3 times → 2 duplicates".to_string())
        );
    }

    #[test]
    fn test_schema_constraints() {
        let df = df![
            "id" => [1, 2, 2, 4],
            "age" => [-1, 20, 30, 200],
            "grade" => ["A", "B", "Z", "Q"],
            "code" => ["AB1", "CD2", "x", "EF3"],
        ]
        .unwrap();
        let schema = DataSchema::new(vec![
            ColumnSchema::new("id", "int").unique(),
            ColumnSchema::new("age", "int").min(0.0).max(120.0),
            ColumnSchema::new("grade", "string").allowed(["A", "B"]),
            ColumnSchema::new("code", "string").pattern(r"[A-Z]{2}\d"),
        ]);
        let report = DataQualityChecker::new(&df, Some(&schema)).check().unwrap();

        assert_eq!(
            messages(&report, "Uniqueness"),
            vec!["Column should be unique but has 1 duplicates".to_string()]
        );
        assert_eq!(
            messages(&report, "Range"),
            vec![
                "1 values below minimum (0)".to_string(),
                "1 values above maximum (120)".to_string(),
            ]
        );
        assert_eq!(
            messages(&report, "Domain"),
            vec!["2 values not in allowed domain: ['Z', 'Q']".to_string()]
        );
        assert_eq!(
            messages(&report, "Pattern"),
            vec![r"1 values don't match pattern '[A-Z]{2}\d'".to_string()]
        );
        assert_eq!(
            messages(&report, "Logic"),
            vec!["1 negative values in column that should be positive".to_string()]
        );
    }

    #[test]
    fn test_class_imbalance_levels() {
        let mut labels = vec![0i64; 95];
        labels.extend(vec![1i64; 5]);
        let df = df!["target" => labels].unwrap();
        let schema = DataSchema::new(vec![ColumnSchema::new("target", "int")]).with_target("target");
        let report = DataQualityChecker::new(&df, Some(&schema)).check().unwrap();

        let imbalance: Vec<&QualityIssue> = report
            .issues
            .iter()
            .filter(|i| i.category == "Imbalance")
            .collect();
        assert_eq!(imbalance.len(), 1);
        assert_eq!(imbalance[0].severity, Severity::Warning);
        assert_eq!(
            imbalance[0].message,
            "Severe class imbalance detected. Smallest class: 5.0%"
        );

        let mut labels = vec![0i64; 80];
        labels.extend(vec![1i64; 20]);
        let df = df!["target" => labels].unwrap();
        let report = DataQualityChecker::new(&df, Some(&schema)).check().unwrap();
        assert!(report.issues_with(Severity::Info).any(|i| i.category == "Imbalance"));
    }

    #[test]
    fn test_distribution_checks() {
        let mut skewed = vec![1.0; 19];
        skewed.push(1000.0);
        let mut concentrated = vec!["a"; 19];
        concentrated.push("b");
        let df = df![
            "skewed" => skewed,
            "flat" => [1.0; 20],
            "concentrated" => concentrated,
        ]
        .unwrap();
        let report = DataQualityChecker::new(&df, None).check().unwrap();

        let distribution: Vec<(Severity, Option<String>)> = report
            .issues
            .iter()
            .filter(|i| i.category == "Distribution")
            .map(|i| (i.severity, i.column.clone()))
            .collect();
        assert_eq!(
            distribution,
            vec![
                (Severity::Warning, Some("skewed".to_string())),
                (Severity::Warning, Some("concentrated".to_string())),
            ]
        );
        assert!(
            report
                .pros
                .contains(&"✅ Column 'flat' has approximately normal distribution".to_string())
        );
    }

    #[test]
    fn test_invalid_values() {
        let df = df![
            "x" => [1.0, f64::INFINITY, 2.0],
            "s" => ["", "  ", "ok"],
        ]
        .unwrap();
        let report = DataQualityChecker::new(&df, None).check().unwrap();
        assert_eq!(
            messages(&report, "Invalid"),
            vec![
                "1 infinite values detected".to_string(),
                "1 empty string values".to_string(),
                "1 whitespace-only values".to_string(),
            ]
        );
    }

    #[test]
    fn test_summary_stats() {
        let df = df![
            "n" => [1.0, 2.0, 3.0, 4.0],
            "s" => ["a", "b", "a", "a"],
        ]
        .unwrap();
        let report = DataQualityChecker::new(&df, None).check().unwrap();
        let stats = &report.summary_stats;

        assert_eq!(stats.shape, (4, 2));
        assert_eq!(stats.describe[0].q50, Some(2.5));
        assert_eq!(stats.nunique, vec![("n".to_string(), 4), ("s".to_string(), 2)]);
        // Numeric columns with few distinct values count as categorical here.
        let categorical: Vec<&str> = stats
            .categorical_summary
            .iter()
            .map(|c| c.column.as_str())
            .collect();
        assert_eq!(categorical, vec!["s", "n"]);
        assert_eq!(stats.categorical_summary[0].most_common.as_deref(), Some("a"));
    }

    #[test]
    fn test_invalid_regex_aborts() {
        let df = df!["code" => ["a"]].unwrap();
        let schema = DataSchema::new(vec![ColumnSchema::new("code", "string").pattern("(")]);
        let err = DataQualityChecker::new(&df, Some(&schema)).check().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SCHEMA");
    }

    #[test]
    fn test_check_is_deterministic() {
        let df = df![
            "a" => [Some(1.0), None, Some(3.0), Some(3.0)],
            "b" => ["x", "y", "x", "x"],
        ]
        .unwrap();
        let first = DataQualityChecker::new(&df, None).check().unwrap();
        let second = DataQualityChecker::new(&df, None).check().unwrap();
        assert_eq!(first, second);
    }
}

//! Missing value stage.
//!
//! Strategies run in a fixed order: drop high-missing columns, constant,
//! mean, median, mode, KNN, iterative, forward fill, backward fill,
//! interpolation. Each strategy only touches the columns listed for it.

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{FillValue, ImputationConfig, InterpolationMethod};
use crate::error::{PreprocessingError, Result};
use crate::imputers::fill::interpolate;
use crate::imputers::{IterativeImputer, KNNImputer, StatisticalImputer, is_missing};
use crate::utils::{
    bracket_list, column_f64, column_strings, drop_columns, has_column, is_numeric_dtype,
    require_column, set_f64_column, set_string_column,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStrategy {
    Constant,
    Mean,
    Median,
    Mode,
}

impl ImputationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImputationStrategy::Constant => "constant",
            ImputationStrategy::Mean => "mean",
            ImputationStrategy::Median => "median",
            ImputationStrategy::Mode => "mode",
        }
    }
}

/// Fill value learned (or configured) for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStatistic {
    pub column: String,
    pub strategy: ImputationStrategy,
    pub value: FillValue,
}

#[derive(Debug, Clone)]
pub struct MissingValueHandler {
    config: ImputationConfig,
    dropped: Vec<String>,
    statistics: Vec<ColumnStatistic>,
    knn: Option<(Vec<String>, KNNImputer)>,
    iterative: Option<(Vec<String>, IterativeImputer)>,
}

impl MissingValueHandler {
    pub fn new(config: ImputationConfig) -> Self {
        Self {
            config,
            dropped: Vec::new(),
            statistics: Vec::new(),
            knn: None,
            iterative: None,
        }
    }

    /// Fill values per column, in the order they were learned.
    pub fn statistics(&self) -> &[ColumnStatistic] {
        &self.statistics
    }

    /// Columns removed by the high-missing rule.
    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped
    }

    pub fn fit_transform(
        &mut self,
        df: DataFrame,
        processing_steps: &mut Vec<String>,
    ) -> Result<DataFrame> {
        info!("Handling missing values...");
        self.dropped.clear();
        self.statistics.clear();
        self.knn = None;
        self.iterative = None;

        let mut df = df;
        if let Some(rule) = &self.config.drop_high_missing
            && df.height() > 0
        {
            let height = df.height() as f64;
            self.dropped = df
                .get_columns()
                .iter()
                .filter(|c| c.null_count() as f64 / height > rule.threshold)
                .map(|c| c.name().to_string())
                .collect();
            if !self.dropped.is_empty() {
                df = drop_columns(df, &self.dropped);
                processing_steps.push(format!(
                    "Dropped {} column(s) with > {}% missing values: {}",
                    self.dropped.len(),
                    (rule.threshold * 10000.0).round() / 100.0,
                    bracket_list(&self.dropped)
                ));
            }
        }

        let config = self.config.clone();

        // Statistics, neighbours and fills all need at least one observed value.
        let mut unobserved = Vec::new();
        if df.height() > 0 {
            for column in config.learned_columns() {
                if has_column(&df, column)
                    && !config.constant.contains(column)
                    && !unobserved.contains(column)
                    && !has_observed(&df, column)?
                {
                    unobserved.push(column.clone());
                }
            }
        }
        if !unobserved.is_empty() {
            warn!(
                "Dropping {} column(s) with no observed values: {}",
                unobserved.len(),
                bracket_list(&unobserved)
            );
            df = drop_columns(df, &unobserved);
            processing_steps.push(format!(
                "Dropped {} column(s) with no observed values: {}",
                unobserved.len(),
                bracket_list(&unobserved)
            ));
            self.dropped.extend(unobserved);
        }

        for column in self.listed(&df, &config.constant) {
            self.learn(&df, &column, ImputationStrategy::Constant, Some(config.fill_value.clone()));
        }
        for column in self.listed(&df, &config.mean) {
            let values = column_f64(&df, &column)?;
            let stat = StatisticalImputer::mean(&values).map(FillValue::Number);
            self.learn(&df, &column, ImputationStrategy::Mean, stat);
        }
        for column in self.listed(&df, &config.median) {
            let values = column_f64(&df, &column)?;
            let stat = StatisticalImputer::median(&values).map(FillValue::Number);
            self.learn(&df, &column, ImputationStrategy::Median, stat);
        }
        for column in self.listed(&df, &config.mode) {
            let stat = if numeric_like(&df, &column) {
                StatisticalImputer::mode(&column_f64(&df, &column)?).map(FillValue::Number)
            } else {
                StatisticalImputer::mode_text(&column_strings(&df, &column)?).map(FillValue::Text)
            };
            self.learn(&df, &column, ImputationStrategy::Mode, stat);
        }

        for stat in &self.statistics {
            apply_fill(&mut df, &stat.column, &stat.value)?;
            processing_steps.push(format!(
                "Imputed '{}' with {}: {}",
                stat.column,
                stat.strategy.as_str(),
                stat.value
            ));
        }

        let knn_columns = self.listed(&df, &config.knn);
        if !knn_columns.is_empty() {
            let rows = read_rows(&df, &knn_columns)?;
            let mut imputer = KNNImputer::new(config.n_neighbors);
            let filled = imputer.fit_transform(&rows);
            write_rows(&mut df, &knn_columns, &filled)?;
            processing_steps.push(format!(
                "KNN-imputed {} with k={}",
                bracket_list(&knn_columns),
                config.n_neighbors
            ));
            self.knn = Some((knn_columns, imputer));
        }

        let iterative_columns = self.listed(&df, &config.iterative);
        if !iterative_columns.is_empty() {
            let rows = read_rows(&df, &iterative_columns)?;
            let mut imputer = IterativeImputer::new(config.max_iter);
            let filled = imputer.fit_transform(&rows);
            write_rows(&mut df, &iterative_columns, &filled)?;
            processing_steps.push(format!(
                "Iteratively imputed {} in {} round(s)",
                bracket_list(&iterative_columns),
                imputer.n_iter()
            ));
            self.iterative = Some((iterative_columns, imputer));
        }

        self.apply_order_fills(&mut df, Some(processing_steps))?;
        Ok(df)
    }

    /// Apply the fitted fills to new data.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = drop_columns(df.clone(), &self.dropped);

        for stat in &self.statistics {
            if has_column(&df, &stat.column) {
                apply_fill(&mut df, &stat.column, &stat.value)?;
            }
        }

        if let Some((columns, imputer)) = &self.knn {
            require_all(&df, columns)?;
            let filled = imputer.transform(&read_rows(&df, columns)?);
            write_rows(&mut df, columns, &filled)?;
        }
        if let Some((columns, imputer)) = &self.iterative {
            require_all(&df, columns)?;
            let filled = imputer.transform(&read_rows(&df, columns)?);
            write_rows(&mut df, columns, &filled)?;
        }

        self.apply_order_fills(&mut df, None)?;
        Ok(df)
    }

    /// Forward fill, backward fill and interpolation.
    fn apply_order_fills(
        &self,
        df: &mut DataFrame,
        mut steps: Option<&mut Vec<String>>,
    ) -> Result<()> {
        for column in self.listed(df, &self.config.forward_fill) {
            fill_nulls(df, &column, FillNullStrategy::Forward(None), FillNullStrategy::Backward(None))?;
            if let Some(steps) = steps.as_deref_mut() {
                steps.push(format!("Forward-filled '{}'", column));
            }
        }
        for column in self.listed(df, &self.config.backward_fill) {
            fill_nulls(df, &column, FillNullStrategy::Backward(None), FillNullStrategy::Forward(None))?;
            if let Some(steps) = steps.as_deref_mut() {
                steps.push(format!("Backward-filled '{}'", column));
            }
        }
        if let Some(interp) = &self.config.interpolate {
            for column in self.listed(df, &interp.columns) {
                let values = column_f64(df, &column)?;
                set_f64_column(df, &column, interpolate(&values, interp.method))?;
                if let Some(steps) = steps.as_deref_mut() {
                    steps.push(format!(
                        "Interpolated '{}' ({})",
                        column,
                        method_name(interp.method)
                    ));
                }
            }
        }
        Ok(())
    }

    /// Listed columns still in the frame; absent ones are skipped.
    fn listed(&self, df: &DataFrame, names: &[String]) -> Vec<String> {
        let mut present = Vec::with_capacity(names.len());
        for name in names {
            if has_column(df, name) {
                present.push(name.clone());
            } else if self.dropped.contains(name) {
                debug!("Skipping '{}': dropped for missing values", name);
            } else {
                warn!("Skipping imputation for '{}': column not found", name);
            }
        }
        present
    }

    fn learn(
        &mut self,
        df: &DataFrame,
        column: &str,
        strategy: ImputationStrategy,
        value: Option<FillValue>,
    ) {
        match value {
            Some(value) => {
                debug!("'{}' {} fill value: {}", column, strategy.as_str(), value);
                self.statistics.push(ColumnStatistic {
                    column: column.to_string(),
                    strategy,
                    value,
                });
            }
            None => {
                let nulls = df.column(column).map(|c| c.null_count()).unwrap_or(0);
                warn!(
                    "Skipping {} imputation for '{}': no observed values ({} nulls)",
                    strategy.as_str(),
                    column,
                    nulls
                );
            }
        }
    }
}

/// Fitted multi-column imputers need every column they were fitted on.
fn require_all(df: &DataFrame, columns: &[String]) -> Result<()> {
    columns.iter().try_for_each(|c| require_column(df, c))
}

/// Whether any entry is neither null nor NaN.
fn has_observed(df: &DataFrame, column: &str) -> Result<bool> {
    if numeric_like(df, column) {
        Ok(column_f64(df, column)?.iter().any(|v| !is_missing(*v)))
    } else {
        let column = df
            .column(column)
            .map_err(|_| PreprocessingError::ColumnNotFound(column.to_string()))?;
        Ok(column.null_count() < column.len())
    }
}

fn numeric_like(df: &DataFrame, column: &str) -> bool {
    df.column(column)
        .map(|c| is_numeric_dtype(c.dtype()) || matches!(c.dtype(), DataType::Boolean))
        .unwrap_or(false)
}

/// Numbers fill numeric columns; anything else turns the column into text.
fn apply_fill(df: &mut DataFrame, column: &str, value: &FillValue) -> Result<()> {
    match value {
        FillValue::Number(n) if numeric_like(df, column) => {
            let values = column_f64(df, column)?;
            set_f64_column(df, column, StatisticalImputer::fill(&values, *n))
        }
        other => {
            let values = column_strings(df, column)?;
            set_string_column(df, column, StatisticalImputer::fill_text(&values, &other.to_string()))
        }
    }
}

fn fill_nulls(
    df: &mut DataFrame,
    column: &str,
    first: FillNullStrategy,
    then: FillNullStrategy,
) -> Result<()> {
    let series = df
        .column(column)
        .map_err(|_| PreprocessingError::ColumnNotFound(column.to_string()))?
        .as_materialized_series()
        .clone();
    let filled = series.fill_null(first)?.fill_null(then)?;
    df.replace(column, filled)?;
    Ok(())
}

fn method_name(method: InterpolationMethod) -> &'static str {
    match method {
        InterpolationMethod::Linear => "linear",
        InterpolationMethod::Nearest => "nearest",
        InterpolationMethod::Zero => "zero",
    }
}

/// Row-major numeric view of `columns`.
fn read_rows(df: &DataFrame, columns: &[String]) -> Result<Vec<Vec<Option<f64>>>> {
    let data = columns
        .iter()
        .map(|c| column_f64(df, c))
        .collect::<Result<Vec<_>>>()?;
    Ok((0..df.height())
        .map(|r| data.iter().map(|col| col[r]).collect())
        .collect())
}

fn write_rows(df: &mut DataFrame, columns: &[String], rows: &[Vec<Option<f64>>]) -> Result<()> {
    for (c, name) in columns.iter().enumerate() {
        let values: Vec<Option<f64>> = rows.iter().map(|r| r[c]).collect();
        set_f64_column(df, name, values)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DropHighMissing, InterpolateConfig};
    use crate::utils::column_names;
    use pretty_assertions::assert_eq;

    fn nulls(df: &DataFrame, name: &str) -> usize {
        df.column(name).unwrap().null_count()
    }

    #[test]
    fn test_drop_high_missing() {
        let df = df![
            "a" => [Some(1.0), None, Some(3.0), None],
            "b" => [Some(1.0), Some(2.0), Some(3.0), None],
        ]
        .unwrap();
        let mut handler = MissingValueHandler::new(ImputationConfig {
            drop_high_missing: Some(DropHighMissing { threshold: 0.4 }),
            ..Default::default()
        });
        let mut steps = Vec::new();
        let out = handler.fit_transform(df, &mut steps).unwrap();

        assert!(!has_column(&out, "a"));
        assert!(has_column(&out, "b"));
        assert_eq!(steps, vec!["Dropped 1 column(s) with > 40% missing values: [a]".to_string()]);
    }

    #[test]
    fn test_statistical_fills() {
        let df = df![
            "mean_col" => [Some(1.0), None, Some(3.0)],
            "median_col" => [Some(1.0), Some(10.0), None],
            "mode_col" => [Some("x"), None, Some("x")],
            "const_col" => [None, Some(2i64), Some(3)],
        ]
        .unwrap();
        let mut handler = MissingValueHandler::new(ImputationConfig {
            mean: vec!["mean_col".into()],
            median: vec!["median_col".into()],
            mode: vec!["mode_col".into()],
            constant: vec!["const_col".into()],
            fill_value: FillValue::Number(-1.0),
            ..Default::default()
        });
        let out = handler.fit_transform(df, &mut Vec::new()).unwrap();

        for name in ["mean_col", "median_col", "mode_col", "const_col"] {
            assert_eq!(nulls(&out, name), 0, "{name} still has nulls");
        }
        assert_eq!(column_f64(&out, "mean_col").unwrap()[1], Some(2.0));
        assert_eq!(column_f64(&out, "median_col").unwrap()[2], Some(5.5));
        assert_eq!(column_f64(&out, "const_col").unwrap()[0], Some(-1.0));
        assert_eq!(column_strings(&out, "mode_col").unwrap()[1].as_deref(), Some("x"));

        let strategies: Vec<ImputationStrategy> =
            handler.statistics().iter().map(|s| s.strategy).collect();
        assert_eq!(
            strategies,
            vec![
                ImputationStrategy::Constant,
                ImputationStrategy::Mean,
                ImputationStrategy::Median,
                ImputationStrategy::Mode,
            ]
        );
    }

    #[test]
    fn test_all_null_columns_are_dropped() {
        let df = df![
            "m" => [None::<f64>; 3],
            "k" => [Some(1.0), None, Some(3.0)],
            "t" => [None::<&str>; 3],
        ]
        .unwrap();
        let mut handler = MissingValueHandler::new(ImputationConfig {
            mean: vec!["m".into()],
            median: vec!["k".into()],
            mode: vec!["t".into()],
            ..Default::default()
        });
        let mut steps = Vec::new();
        let out = handler.fit_transform(df.clone(), &mut steps).unwrap();

        assert_eq!(column_names(&out), vec!["k"]);
        assert_eq!(nulls(&out, "k"), 0);
        assert_eq!(handler.dropped_columns(), ["m".to_string(), "t".to_string()]);
        assert_eq!(steps[0], "Dropped 2 column(s) with no observed values: [m, t]");

        let again = handler.transform(&df).unwrap();
        assert_eq!(column_names(&again), vec!["k"]);
        assert_eq!(nulls(&again, "k"), 0);
    }

    #[test]
    fn test_text_constant_makes_string_column() {
        let df = df!["n" => [Some(1.0), None]].unwrap();
        let mut handler = MissingValueHandler::new(ImputationConfig {
            constant: vec!["n".into()],
            fill_value: FillValue::Text("missing".into()),
            ..Default::default()
        });
        let out = handler.fit_transform(df, &mut Vec::new()).unwrap();
        assert_eq!(out.column("n").unwrap().dtype(), &DataType::String);
        assert_eq!(column_strings(&out, "n").unwrap()[1].as_deref(), Some("missing"));
    }

    #[test]
    fn test_mean_on_text_is_error() {
        let df = df!["s" => [Some("a"), None]].unwrap();
        let mut handler = MissingValueHandler::new(ImputationConfig {
            mean: vec!["s".into()],
            ..Default::default()
        });
        let err = handler.fit_transform(df, &mut Vec::new()).unwrap_err();
        assert_eq!(err.error_code(), "TYPE_CONVERSION_FAILED");
    }

    #[test]
    fn test_unknown_column_is_skipped() {
        let df = df!["a" => [Some(1.0), None]].unwrap();
        let mut handler = MissingValueHandler::new(ImputationConfig {
            median: vec!["nope".into()],
            ..Default::default()
        });
        let out = handler.fit_transform(df, &mut Vec::new()).unwrap();
        assert_eq!(nulls(&out, "a"), 1);
        assert!(handler.statistics().is_empty());
    }

    #[test]
    fn test_knn_iterative_and_order_fills_leave_no_nulls() {
        let df = df![
            "x" => [Some(1.0), Some(2.0), None, Some(4.0), Some(5.0), Some(6.0)],
            "y" => [Some(2.0), None, Some(6.0), Some(8.0), Some(10.0), Some(12.0)],
            "z" => [None, Some(1.0), None, Some(3.0), None, Some(5.0)],
            "w" => [None, Some("a"), None, Some("b"), None, None],
            "v" => [None, Some(1.0), None, None, Some(4.0), None],
        ]
        .unwrap();
        let mut handler = MissingValueHandler::new(ImputationConfig {
            knn: vec!["x".into()],
            n_neighbors: 2,
            iterative: vec!["y".into(), "z".into()],
            forward_fill: vec!["w".into()],
            interpolate: Some(InterpolateConfig {
                columns: vec!["v".into()],
                method: InterpolationMethod::Linear,
            }),
            ..Default::default()
        });
        let out = handler.fit_transform(df.clone(), &mut Vec::new()).unwrap();
        for name in ["x", "y", "z", "w", "v"] {
            assert_eq!(nulls(&out, name), 0, "{name} still has nulls");
        }
        assert_eq!(
            column_f64(&out, "v").unwrap(),
            vec![Some(1.0), Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(4.0)]
        );

        let again = handler.transform(&df).unwrap();
        for name in ["x", "y", "z", "w", "v"] {
            assert_eq!(nulls(&again, name), 0, "{name} still has nulls after transform");
        }
    }
}

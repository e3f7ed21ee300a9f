//! Outlier handling stage.
//!
//! Detection runs per column on the stage input. The action then either
//! drops every flagged row (union over the processed columns), clips the
//! column to its configured percentiles, or applies `ln(1 + x)`.

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::detectors::{IsolationForest, LocalOutlierFactor};
use crate::config::{OutlierAction, OutlierConfig, OutlierMethod};
use crate::error::Result;
use crate::utils::{
    column_f64, filter_rows, has_column, mean, median, numeric_columns, percentile,
    set_f64_column, std_dev, valid_values,
};

const MODIFIED_Z_SCALE: f64 = 0.6745;
const IQR_WHISKER: f64 = 1.5;

/// Clip bounds learned for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierCaps {
    pub column: String,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone)]
pub struct OutlierHandler {
    config: OutlierConfig,
    caps: Vec<OutlierCaps>,
}

impl OutlierHandler {
    pub fn new(config: OutlierConfig) -> Self {
        Self {
            config,
            caps: Vec::new(),
        }
    }

    /// Bounds stored by the cap action, in processing order.
    pub fn caps(&self) -> &[OutlierCaps] {
        &self.caps
    }

    pub fn fit_transform(
        &mut self,
        df: DataFrame,
        processing_steps: &mut Vec<String>,
    ) -> Result<DataFrame> {
        info!("Handling outliers with {:?} / {:?}", self.config.method, self.config.action);
        self.caps.clear();

        let columns = self.target_columns(&df);
        let mut df = df;
        let mut drop_mask = vec![false; df.height()];

        for column in &columns {
            let values = column_f64(&df, column)?;
            let flags = self.detect(&values);
            let flagged = flags.iter().filter(|f| **f).count();
            debug!("'{}': {} outlier(s) detected", column, flagged);

            match self.config.action {
                OutlierAction::Remove => {
                    for (dropped, flag) in drop_mask.iter_mut().zip(&flags) {
                        *dropped |= *flag;
                    }
                }
                OutlierAction::Cap => {
                    let present = valid_values(&values);
                    let (Some(lower), Some(upper)) = (
                        percentile(&present, self.config.percentile_low),
                        percentile(&present, self.config.percentile_high),
                    ) else {
                        warn!("Skipping cap for '{}': no valid values", column);
                        continue;
                    };
                    let capped = values
                        .iter()
                        .map(|v| v.map(|x| if x.is_nan() { x } else { x.clamp(lower, upper) }))
                        .collect();
                    set_f64_column(&mut df, column, capped)?;
                    processing_steps.push(format!(
                        "Capped '{}' to [{:.4}, {:.4}] ({} outlier(s) detected)",
                        column, lower, upper, flagged
                    ));
                    self.caps.push(OutlierCaps {
                        column: column.clone(),
                        lower,
                        upper,
                    });
                }
                OutlierAction::TransformLog => {
                    let logged = values.iter().map(|v| v.map(f64::ln_1p)).collect();
                    set_f64_column(&mut df, column, logged)?;
                    processing_steps.push(format!(
                        "Applied log1p to '{}' ({} outlier(s) detected)",
                        column, flagged
                    ));
                }
            }
        }

        if self.config.action == OutlierAction::Remove {
            let removed = drop_mask.iter().filter(|d| **d).count();
            let keep: Vec<bool> = drop_mask.iter().map(|d| !d).collect();
            df = filter_rows(&df, &keep)?;
            processing_steps.push(format!(
                "Removed {} row(s) flagged as outliers by {} across {} column(s)",
                removed,
                method_name(self.config.method),
                columns.len()
            ));
        }

        Ok(df)
    }

    /// Clip new data with the stored bounds. Remove and log actions are
    /// stateless and are not replayed on new data.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = df.clone();
        for caps in &self.caps {
            if !has_column(&df, &caps.column) {
                continue;
            }
            let capped = column_f64(&df, &caps.column)?
                .into_iter()
                .map(|v| v.map(|x| if x.is_nan() { x } else { x.clamp(caps.lower, caps.upper) }))
                .collect();
            set_f64_column(&mut df, &caps.column, capped)?;
        }
        Ok(df)
    }

    fn target_columns(&self, df: &DataFrame) -> Vec<String> {
        match &self.config.columns {
            None => numeric_columns(df),
            Some(listed) => listed
                .iter()
                .filter(|c| {
                    let present = has_column(df, c);
                    if !present {
                        warn!("Skipping outlier handling for '{}': column not found", c);
                    }
                    present
                })
                .cloned()
                .collect(),
        }
    }

    /// One flag per row; null rows are never flagged.
    fn detect(&self, values: &[Option<f64>]) -> Vec<bool> {
        let present: Vec<(usize, f64)> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.filter(|x| !x.is_nan()).map(|x| (i, x)))
            .collect();
        let xs: Vec<f64> = present.iter().map(|p| p.1).collect();
        let threshold = self.config.threshold;

        let local: Vec<bool> = match self.config.method {
            OutlierMethod::Zscore => match (mean(&xs), std_dev(&xs, 0)) {
                (Some(m), Some(s)) if s > 0.0 => {
                    xs.iter().map(|x| ((x - m) / s).abs() > threshold).collect()
                }
                _ => vec![false; xs.len()],
            },
            OutlierMethod::ModifiedZscore => {
                let med = median(&xs).unwrap_or(0.0);
                let deviations: Vec<f64> = xs.iter().map(|x| (x - med).abs()).collect();
                match median(&deviations) {
                    Some(mad) if mad > 0.0 => deviations
                        .iter()
                        .map(|d| MODIFIED_Z_SCALE * d / mad > threshold)
                        .collect(),
                    _ => vec![false; xs.len()],
                }
            }
            OutlierMethod::Iqr => {
                match (percentile(&xs, 0.25), percentile(&xs, 0.75)) {
                    (Some(q1), Some(q3)) => {
                        let iqr = q3 - q1;
                        let (lo, hi) = (q1 - IQR_WHISKER * iqr, q3 + IQR_WHISKER * iqr);
                        xs.iter().map(|&x| x < lo || x > hi).collect()
                    }
                    _ => Vec::new(),
                }
            }
            OutlierMethod::IsolationForest => IsolationForest::default().detect(&xs),
            OutlierMethod::Lof => LocalOutlierFactor::default().detect(&xs),
        };

        let mut flags = vec![false; values.len()];
        for ((row, _), flag) in present.iter().zip(local) {
            flags[*row] = flag;
        }
        flags
    }
}

fn method_name(method: OutlierMethod) -> &'static str {
    match method {
        OutlierMethod::Zscore => "z-score",
        OutlierMethod::ModifiedZscore => "modified z-score",
        OutlierMethod::Iqr => "IQR",
        OutlierMethod::IsolationForest => "isolation forest",
        OutlierMethod::Lof => "LOF",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(method: OutlierMethod, action: OutlierAction) -> OutlierConfig {
        OutlierConfig {
            method,
            action,
            ..Default::default()
        }
    }

    #[test]
    fn test_cap_uses_input_percentiles() {
        let df = df!["x" => [1.0, 2.0, 3.0, 4.0, 1000.0]].unwrap();
        let mut handler = OutlierHandler::new(config(OutlierMethod::Zscore, OutlierAction::Cap));
        let out = handler.fit_transform(df, &mut Vec::new()).unwrap();

        let values = column_f64(&out, "x").unwrap();
        let caps = &handler.caps()[0];
        assert!((caps.upper - 800.8).abs() < 1e-9);
        assert!((caps.lower - 1.2).abs() < 1e-9);
        assert!((values[4].unwrap() - 800.8).abs() < 1e-9);
        for v in values.iter().flatten() {
            assert!(*v >= caps.lower && *v <= caps.upper);
        }
    }

    #[test]
    fn test_remove_takes_union_of_flags() {
        let df = df![
            "a" => [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 50.0],
            "b" => [2.0, 2.0, 2.0, 2.0, 2.0, 2.0, -40.0, 2.0],
        ]
        .unwrap();
        let mut cfg = config(OutlierMethod::Iqr, OutlierAction::Remove);
        cfg.columns = Some(vec!["a".into(), "b".into()]);
        let mut handler = OutlierHandler::new(cfg);
        let mut steps = Vec::new();
        let out = handler.fit_transform(df, &mut steps).unwrap();

        assert_eq!(out.height(), 6);
        assert_eq!(
            steps,
            vec!["Removed 2 row(s) flagged as outliers by IQR across 2 column(s)".to_string()]
        );
    }

    #[test]
    fn test_modified_zscore_flags() {
        let handler = OutlierHandler::new(config(OutlierMethod::ModifiedZscore, OutlierAction::Cap));
        let flags = handler.detect(&[Some(1.0), Some(2.0), Some(3.0), None, Some(100.0)]);
        assert_eq!(flags, vec![false, false, false, false, true]);
    }

    #[test]
    fn test_constant_column_flags_nothing() {
        let handler = OutlierHandler::new(config(OutlierMethod::Zscore, OutlierAction::Remove));
        assert_eq!(handler.detect(&[Some(5.0); 4]), vec![false; 4]);
    }

    #[test]
    fn test_transform_log() {
        let df = df!["x" => [0.0, 1.0]].unwrap();
        let mut handler = OutlierHandler::new(config(OutlierMethod::Zscore, OutlierAction::TransformLog));
        let out = handler.fit_transform(df, &mut Vec::new()).unwrap();
        let values = column_f64(&out, "x").unwrap();
        assert_eq!(values[0], Some(0.0));
        assert!((values[1].unwrap() - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_transform_replays_caps() {
        let df = df!["x" => [1.0, 2.0, 3.0, 4.0, 1000.0]].unwrap();
        let mut handler = OutlierHandler::new(config(OutlierMethod::Zscore, OutlierAction::Cap));
        handler.fit_transform(df, &mut Vec::new()).unwrap();

        let new = df!["x" => [-50.0, 5000.0]].unwrap();
        let out = handler.transform(&new).unwrap();
        let values = column_f64(&out, "x").unwrap();
        assert!((values[0].unwrap() - 1.2).abs() < 1e-9);
        assert!((values[1].unwrap() - 800.8).abs() < 1e-9);
    }
}

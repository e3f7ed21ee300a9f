//! Skew correction stage.
//!
//! A column is transformed when the absolute skewness of its non-null values
//! exceeds the threshold. Methods with a domain restriction skip columns that
//! violate it: Box-Cox and plain log need every value positive, sqrt needs
//! every value non-negative. Nulls count as a violation. Yeo-Johnson skips
//! columns with nulls because its lambda is fitted on the full column.

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{SkewMethod, SkewnessConfig};
use crate::error::Result;
use crate::utils::{
    column_f64, has_column, numeric_columns, set_f64_column, skewness, valid_values,
};

/// Search interval and tolerance for the lambda maximum-likelihood fit.
const LAMBDA_BOUNDS: (f64, f64) = (-5.0, 5.0);
const LAMBDA_TOLERANCE: f64 = 1e-8;

/// A fitted transform, replayable on new data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkewTransform {
    Log,
    /// `ln(1 + x - min + 1)`, used when some value is not positive.
    ShiftedLog { min: f64 },
    BoxCox { lambda: f64 },
    YeoJohnson { lambda: f64 },
    Sqrt,
    Reciprocal,
}

impl SkewTransform {
    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            SkewTransform::Log => x.ln(),
            SkewTransform::ShiftedLog { min } => (x - min + 1.0).ln_1p(),
            SkewTransform::BoxCox { lambda } => box_cox(x, lambda),
            SkewTransform::YeoJohnson { lambda } => yeo_johnson(x, lambda),
            SkewTransform::Sqrt => x.sqrt(),
            SkewTransform::Reciprocal => 1.0 / (x + 1.0),
        }
    }

    fn lambda(&self) -> Option<f64> {
        match *self {
            SkewTransform::BoxCox { lambda } | SkewTransform::YeoJohnson { lambda } => Some(lambda),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedSkew {
    pub column: String,
    pub skewness: f64,
    pub transform: SkewTransform,
}

#[derive(Debug, Clone)]
pub struct SkewnessHandler {
    config: SkewnessConfig,
    fitted: Vec<FittedSkew>,
}

impl SkewnessHandler {
    pub fn new(config: SkewnessConfig) -> Self {
        Self {
            config,
            fitted: Vec::new(),
        }
    }

    pub fn fitted(&self) -> &[FittedSkew] {
        &self.fitted
    }

    /// Learned Box-Cox / Yeo-Johnson lambdas by column.
    pub fn lambdas(&self) -> Vec<(&str, f64)> {
        self.fitted
            .iter()
            .filter_map(|f| f.transform.lambda().map(|l| (f.column.as_str(), l)))
            .collect()
    }

    pub fn fit_transform(
        &mut self,
        df: DataFrame,
        processing_steps: &mut Vec<String>,
    ) -> Result<DataFrame> {
        info!("Correcting skewness with {:?}", self.config.method);
        self.fitted.clear();
        let mut df = df;

        let columns = match &self.config.columns {
            None => numeric_columns(&df),
            Some(listed) => listed
                .iter()
                .filter(|c| {
                    let found = has_column(&df, c);
                    if !found {
                        warn!("Skipping skew correction for '{}': column not found", c);
                    }
                    found
                })
                .cloned()
                .collect(),
        };

        for column in columns {
            let values = column_f64(&df, &column)?;
            let present = valid_values(&values);
            let skew = skewness(&present);
            if skew.is_nan() || skew.abs() <= self.config.threshold {
                debug!("'{}': skew {:.3} within threshold", column, skew);
                continue;
            }

            let Some(transform) = fit_transform_for(self.config.method, &values, &present) else {
                debug!(
                    "Skipping {:?} for '{}': values outside the transform's domain",
                    self.config.method, column
                );
                continue;
            };

            apply(&mut df, &column, &values, transform)?;
            processing_steps.push(format!(
                "Applied {} transform to '{}' (skew {:.3})",
                method_name(self.config.method),
                column,
                skew
            ));
            self.fitted.push(FittedSkew {
                column,
                skewness: skew,
                transform,
            });
        }

        Ok(df)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = df.clone();
        for fitted in &self.fitted {
            if has_column(&df, &fitted.column) {
                let values = column_f64(&df, &fitted.column)?;
                apply(&mut df, &fitted.column, &values, fitted.transform)?;
            }
        }
        Ok(df)
    }
}

/// Pick the transform for `method`, or `None` when the column is out of its domain.
fn fit_transform_for(
    method: SkewMethod,
    values: &[Option<f64>],
    present: &[f64],
) -> Option<SkewTransform> {
    let complete = present.len() == values.len();
    let all_positive = complete && present.iter().all(|&x| x > 0.0);

    match method {
        SkewMethod::Log if all_positive => Some(SkewTransform::Log),
        SkewMethod::Log => {
            let min = present.iter().copied().fold(f64::INFINITY, f64::min);
            Some(SkewTransform::ShiftedLog { min })
        }
        SkewMethod::Boxcox if all_positive => Some(SkewTransform::BoxCox {
            lambda: fit_lambda(present, box_cox_llf),
        }),
        SkewMethod::Boxcox => None,
        SkewMethod::YeoJohnson if complete => Some(SkewTransform::YeoJohnson {
            lambda: fit_lambda(present, yeo_johnson_llf),
        }),
        SkewMethod::YeoJohnson => None,
        SkewMethod::Sqrt if complete && present.iter().all(|&x| x >= 0.0) => {
            Some(SkewTransform::Sqrt)
        }
        SkewMethod::Sqrt => None,
        SkewMethod::Reciprocal => Some(SkewTransform::Reciprocal),
    }
}

fn apply(
    df: &mut DataFrame,
    column: &str,
    values: &[Option<f64>],
    transform: SkewTransform,
) -> Result<()> {
    let transformed = values
        .iter()
        .map(|v| v.map(|x| if x.is_nan() { x } else { transform.apply(x) }))
        .collect();
    set_f64_column(df, column, transformed)
}

fn method_name(method: SkewMethod) -> &'static str {
    match method {
        SkewMethod::Log => "log",
        SkewMethod::Boxcox => "Box-Cox",
        SkewMethod::YeoJohnson => "Yeo-Johnson",
        SkewMethod::Sqrt => "sqrt",
        SkewMethod::Reciprocal => "reciprocal",
    }
}

fn box_cox(x: f64, lambda: f64) -> f64 {
    if lambda.abs() < 1e-12 {
        x.ln()
    } else {
        (x.powf(lambda) - 1.0) / lambda
    }
}

fn yeo_johnson(x: f64, lambda: f64) -> f64 {
    if x >= 0.0 {
        if lambda.abs() < 1e-12 {
            x.ln_1p()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() < 1e-12 {
        -(-x).ln_1p()
    } else {
        -((1.0 - x).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
    }
}

/// Biased variance of the transformed sample.
fn transformed_variance(values: &[f64], f: impl Fn(f64) -> f64) -> f64 {
    let y: Vec<f64> = values.iter().map(|&x| f(x)).collect();
    let n = y.len() as f64;
    let mean = y.iter().sum::<f64>() / n;
    y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

fn box_cox_llf(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let log_sum: f64 = values.iter().map(|x| x.ln()).sum();
    let var = transformed_variance(values, |x| box_cox(x, lambda));
    (lambda - 1.0) * log_sum - n / 2.0 * var.ln()
}

fn yeo_johnson_llf(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let log_sum: f64 = values.iter().map(|x| x.signum() * x.abs().ln_1p()).sum();
    let var = transformed_variance(values, |x| yeo_johnson(x, lambda));
    (lambda - 1.0) * log_sum - n / 2.0 * var.ln()
}

/// Maximise `llf` over lambda by golden-section search.
fn fit_lambda(values: &[f64], llf: fn(&[f64], f64) -> f64) -> f64 {
    let ratio = (5f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = LAMBDA_BOUNDS;
    let score = |l: f64| {
        let v = llf(values, l);
        if v.is_nan() { f64::NEG_INFINITY } else { v }
    };
    let mut c = b - ratio * (b - a);
    let mut d = a + ratio * (b - a);
    let (mut fc, mut fd) = (score(c), score(d));
    while (b - a).abs() > LAMBDA_TOLERANCE {
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - ratio * (b - a);
            fc = score(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + ratio * (b - a);
            fd = score(d);
        }
    }
    (a + b) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn right_skewed() -> Vec<f64> {
        vec![1.0, 1.0, 1.5, 2.0, 2.0, 2.5, 3.0, 4.0, 8.0, 20.0, 50.0]
    }

    fn run(method: SkewMethod, df: DataFrame) -> (DataFrame, SkewnessHandler) {
        let mut handler = SkewnessHandler::new(SkewnessConfig {
            method,
            ..Default::default()
        });
        let out = handler.fit_transform(df, &mut Vec::new()).unwrap();
        (out, handler)
    }

    #[test]
    fn test_log_reduces_skew() {
        let values = right_skewed();
        let before = skewness(&values);
        let (out, handler) = run(SkewMethod::Log, df!["x" => values].unwrap());
        let after = skewness(&valid_values(&column_f64(&out, "x").unwrap()));
        assert!(after.abs() < before.abs());
        assert_eq!(handler.fitted()[0].transform, SkewTransform::Log);
    }

    #[test]
    fn test_log_shifts_non_positive() {
        let mut values = right_skewed();
        values[0] = -3.0;
        let (out, handler) = run(SkewMethod::Log, df!["x" => values].unwrap());
        assert_eq!(handler.fitted()[0].transform, SkewTransform::ShiftedLog { min: -3.0 });
        assert!((column_f64(&out, "x").unwrap()[0].unwrap() - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_boxcox_learns_lambda_and_skips_non_positive() {
        let (_, handler) = run(SkewMethod::Boxcox, df!["x" => right_skewed()].unwrap());
        let lambdas = handler.lambdas();
        assert_eq!(lambdas.len(), 1);
        assert!(lambdas[0].1 < 0.5);

        let mut values = right_skewed();
        values[0] = 0.0;
        let (out, handler) = run(SkewMethod::Boxcox, df!["x" => values.clone()].unwrap());
        assert!(handler.fitted().is_empty());
        assert_eq!(valid_values(&column_f64(&out, "x").unwrap()), values);
    }

    #[test]
    fn test_yeo_johnson_handles_negatives() {
        let mut values = right_skewed();
        values[0] = -2.0;
        let (out, handler) = run(SkewMethod::YeoJohnson, df!["x" => values.clone()].unwrap());
        assert_eq!(handler.lambdas().len(), 1);
        let after = skewness(&valid_values(&column_f64(&out, "x").unwrap()));
        assert!(after.abs() < skewness(&values).abs());
    }

    #[test]
    fn test_sqrt_and_reciprocal() {
        let (out, _) = run(SkewMethod::Sqrt, df!["x" => right_skewed()].unwrap());
        assert_eq!(column_f64(&out, "x").unwrap()[0], Some(1.0));

        let (out, _) = run(SkewMethod::Reciprocal, df!["x" => right_skewed()].unwrap());
        assert_eq!(column_f64(&out, "x").unwrap()[0], Some(0.5));
    }

    #[test]
    fn test_symmetric_column_untouched() {
        let (out, handler) = run(SkewMethod::Log, df!["x" => [1.0, 2.0, 3.0, 4.0, 5.0]].unwrap());
        assert!(handler.fitted().is_empty());
        assert_eq!(column_f64(&out, "x").unwrap()[4], Some(5.0));
    }

    #[test]
    fn test_yeo_johnson_inverse_branches() {
        assert!((yeo_johnson(3.0, 0.0) - 4f64.ln()).abs() < 1e-12);
        assert!((yeo_johnson(-3.0, 2.0) + 4f64.ln()).abs() < 1e-12);
        assert!((yeo_johnson(3.0, 1.0) - 3.0).abs() < 1e-12);
        assert!((yeo_johnson(-3.0, 1.0) + 3.0).abs() < 1e-12);
    }
}

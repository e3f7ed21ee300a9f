//! Feature scaling stage.
//!
//! Each listed column is replaced in place by its scaled values and the
//! fitted parameters are kept for [`FeatureScaler::transform`]. Nulls are
//! ignored when fitting and stay null. A zero scale (constant column) is
//! treated as 1 so the column is only shifted.

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ScalingConfig;
use crate::error::Result;
use crate::utils::{
    column_f64, has_column, mean, min_max, percentiles, set_f64_column, std_dev, valid_values,
};

const MAX_QUANTILES: usize = 1000;
/// Probabilities are clipped to `[EPS, 1 - EPS]` before the normal inverse.
const QUANTILE_CLIP: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerParams {
    Standard { mean: f64, scale: f64 },
    Minmax { min: f64, scale: f64 },
    Robust { center: f64, scale: f64 },
    Maxabs { scale: f64 },
    /// Column quantiles at evenly spaced probabilities in [0, 1].
    Quantile { quantiles: Vec<f64> },
}

impl ScalerParams {
    fn fit_standard(values: &[f64]) -> Option<Self> {
        Some(ScalerParams::Standard {
            mean: mean(values)?,
            scale: non_zero(std_dev(values, 0)?),
        })
    }

    fn fit_minmax(values: &[f64]) -> Option<Self> {
        let (min, max) = min_max(values)?;
        Some(ScalerParams::Minmax {
            min,
            scale: non_zero(max - min),
        })
    }

    fn fit_robust(values: &[f64]) -> Option<Self> {
        let quartiles = percentiles(values, &[0.25, 0.5, 0.75])?;
        let (q1, q3) = (quartiles[0], quartiles[2]);
        Some(ScalerParams::Robust {
            center: quartiles[1],
            scale: non_zero(q3 - q1),
        })
    }

    fn fit_maxabs(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let max_abs = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        Some(ScalerParams::Maxabs {
            scale: non_zero(max_abs),
        })
    }

    fn fit_quantile(values: &[f64]) -> Option<Self> {
        let n_quantiles = MAX_QUANTILES.min(values.len());
        if n_quantiles == 0 {
            return None;
        }
        let references: Vec<f64> = (0..n_quantiles).map(|i| reference(i, n_quantiles)).collect();
        let quantiles = percentiles(values, &references)?;
        Some(ScalerParams::Quantile { quantiles })
    }

    pub fn apply(&self, x: f64) -> f64 {
        match self {
            ScalerParams::Standard { mean, scale } => (x - mean) / scale,
            ScalerParams::Minmax { min, scale } => (x - min) / scale,
            ScalerParams::Robust { center, scale } => (x - center) / scale,
            ScalerParams::Maxabs { scale } => x / scale,
            ScalerParams::Quantile { quantiles } => {
                let references: Vec<f64> = (0..quantiles.len())
                    .map(|i| reference(i, quantiles.len()))
                    .collect();
                let p = quantile_probability(x, quantiles, &references)
                    .clamp(QUANTILE_CLIP, 1.0 - QUANTILE_CLIP);
                inverse_normal_cdf(p)
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ScalerParams::Standard { .. } => "standard",
            ScalerParams::Minmax { .. } => "minmax",
            ScalerParams::Robust { .. } => "robust",
            ScalerParams::Maxabs { .. } => "maxabs",
            ScalerParams::Quantile { .. } => "quantile",
        }
    }
}

/// Fitted scaler for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedScaler {
    pub column: String,
    pub params: ScalerParams,
}

#[derive(Debug, Clone)]
pub struct FeatureScaler {
    config: ScalingConfig,
    fitted: Vec<FittedScaler>,
}

impl FeatureScaler {
    pub fn new(config: ScalingConfig) -> Self {
        Self {
            config,
            fitted: Vec::new(),
        }
    }

    /// Fitted scalers in application order.
    pub fn fitted(&self) -> &[FittedScaler] {
        &self.fitted
    }

    pub fn fit_transform(
        &mut self,
        df: DataFrame,
        processing_steps: &mut Vec<String>,
    ) -> Result<DataFrame> {
        info!("Scaling features...");
        self.fitted.clear();
        let mut df = df;

        let plan: [(&[String], fn(&[f64]) -> Option<ScalerParams>); 5] = [
            (&self.config.standard, ScalerParams::fit_standard),
            (&self.config.minmax, ScalerParams::fit_minmax),
            (&self.config.robust, ScalerParams::fit_robust),
            (&self.config.maxabs, ScalerParams::fit_maxabs),
            (&self.config.quantile, ScalerParams::fit_quantile),
        ];

        let mut fitted = Vec::new();
        for (columns, fit) in plan {
            for column in columns {
                if !has_column(&df, column) {
                    warn!("Skipping scaling for '{}': column not found", column);
                    continue;
                }
                let values = column_f64(&df, column)?;
                let Some(params) = fit(&valid_values(&values)) else {
                    warn!("Skipping scaling for '{}': no valid values", column);
                    continue;
                };
                debug!("'{}': {:?}", column, params);
                apply_scaler(&mut df, column, &values, &params)?;
                processing_steps.push(format!("Applied {} scaling to '{}'", params.name(), column));
                fitted.push(FittedScaler {
                    column: column.clone(),
                    params,
                });
            }
        }
        self.fitted = fitted;

        Ok(df)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = df.clone();
        for scaler in &self.fitted {
            if has_column(&df, &scaler.column) {
                let values = column_f64(&df, &scaler.column)?;
                apply_scaler(&mut df, &scaler.column, &values, &scaler.params)?;
            }
        }
        Ok(df)
    }
}

fn apply_scaler(
    df: &mut DataFrame,
    column: &str,
    values: &[Option<f64>],
    params: &ScalerParams,
) -> Result<()> {
    let scaled = values
        .iter()
        .map(|v| v.map(|x| if x.is_nan() { x } else { params.apply(x) }))
        .collect();
    set_f64_column(df, column, scaled)
}

fn non_zero(scale: f64) -> f64 {
    if scale == 0.0 || !scale.is_finite() { 1.0 } else { scale }
}

fn reference(i: usize, n: usize) -> f64 {
    if n <= 1 { 0.0 } else { i as f64 / (n - 1) as f64 }
}

/// Averages the left- and right-most interpolation so runs of equal
/// quantiles map to the middle of their probability range.
fn quantile_probability(x: f64, quantiles: &[f64], references: &[f64]) -> f64 {
    let up = interp(x, quantiles, references);
    let neg_q: Vec<f64> = quantiles.iter().rev().map(|q| -q).collect();
    let neg_r: Vec<f64> = references.iter().rev().map(|r| -r).collect();
    let down = -interp(-x, &neg_q, &neg_r);
    0.5 * (up + down)
}

/// Piecewise-linear interpolation with constant extension past both ends.
fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let last = xp.len() - 1;
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }
    let j = xp.partition_point(|v| *v <= x) - 1;
    let t = (x - xp[j]) / (xp[j + 1] - xp[j]);
    fp[j] + t * (fp[j + 1] - fp[j])
}

/// Inverse of the standard normal CDF (Acklam's rational approximation).
fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p > 1.0 - P_LOW {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    } else {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scaled(config: ScalingConfig, df: DataFrame, column: &str) -> (Vec<Option<f64>>, FeatureScaler) {
        let mut scaler = FeatureScaler::new(config);
        let out = scaler.fit_transform(df, &mut Vec::new()).unwrap();
        (column_f64(&out, column).unwrap(), scaler)
    }

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-6)
    }

    #[test]
    fn test_standard_and_minmax() {
        let df = df!["a" => [1.0, 2.0, 3.0], "b" => [10.0, 20.0, 30.0]].unwrap();
        let config = ScalingConfig {
            standard: vec!["a".into()],
            minmax: vec!["b".into()],
            ..Default::default()
        };
        let mut scaler = FeatureScaler::new(config);
        let out = scaler.fit_transform(df, &mut Vec::new()).unwrap();

        let a = column_f64(&out, "a").unwrap();
        let std = (2.0f64 / 3.0).sqrt();
        assert!(close(a[0], -1.0 / std) && close(a[1], 0.0) && close(a[2], 1.0 / std));
        assert_eq!(
            column_f64(&out, "b").unwrap(),
            vec![Some(0.0), Some(0.5), Some(1.0)]
        );
        assert_eq!(scaler.fitted().len(), 2);
    }

    #[test]
    fn test_robust_and_maxabs() {
        let df = df!["r" => [Some(1.0), Some(2.0), None, Some(3.0), Some(4.0), Some(100.0)]].unwrap();
        let (values, scaler) = scaled(
            ScalingConfig {
                robust: vec!["r".into()],
                ..Default::default()
            },
            df,
            "r",
        );
        assert_eq!(values[2], None);
        assert!(close(values[3], 0.0));
        assert_eq!(
            scaler.fitted()[0].params,
            ScalerParams::Robust { center: 3.0, scale: 2.0 }
        );

        let (values, _) = scaled(
            ScalingConfig {
                maxabs: vec!["m".into()],
                ..Default::default()
            },
            df!["m" => [-4.0, 2.0]].unwrap(),
            "m",
        );
        assert_eq!(values, vec![Some(-1.0), Some(0.5)]);
    }

    #[test]
    fn test_constant_column_is_only_shifted() {
        let (values, _) = scaled(
            ScalingConfig {
                standard: vec!["c".into()],
                ..Default::default()
            },
            df!["c" => [5.0, 5.0]].unwrap(),
            "c",
        );
        assert_eq!(values, vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn test_quantile_normal_output() {
        let values: Vec<f64> = (1..=101).map(|i| (i * i) as f64).collect();
        let (out, _) = scaled(
            ScalingConfig {
                quantile: vec!["q".into()],
                ..Default::default()
            },
            df!["q" => values].unwrap(),
            "q",
        );
        assert!(close(out[50], 0.0));
        assert!(out.windows(2).all(|w| w[0] < w[1]));
        assert!(close(out[0], inverse_normal_cdf(QUANTILE_CLIP)));
        assert!((out[100].unwrap() - 5.199).abs() < 1e-2);
    }

    #[test]
    fn test_inverse_normal_cdf() {
        assert!(inverse_normal_cdf(0.5).abs() < 1e-9);
        assert!((inverse_normal_cdf(0.975) - 1.959_964).abs() < 1e-6);
        assert!((inverse_normal_cdf(0.01) + 2.326_348).abs() < 1e-6);
    }

    #[test]
    fn test_transform_reuses_fitted_params() {
        let df = df!["a" => [0.0, 10.0]].unwrap();
        let mut scaler = FeatureScaler::new(ScalingConfig {
            minmax: vec!["a".into()],
            ..Default::default()
        });
        scaler.fit_transform(df, &mut Vec::new()).unwrap();
        let out = scaler.transform(&df!["a" => [5.0, 20.0]].unwrap()).unwrap();
        assert_eq!(column_f64(&out, "a").unwrap(), vec![Some(0.5), Some(2.0)]);
    }

    #[test]
    fn test_text_column_is_error() {
        let mut scaler = FeatureScaler::new(ScalingConfig {
            standard: vec!["s".into()],
            ..Default::default()
        });
        let err = scaler
            .fit_transform(df!["s" => ["x"]].unwrap(), &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.error_code(), "TYPE_CONVERSION_FAILED");
    }
}

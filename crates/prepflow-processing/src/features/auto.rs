//! Automatic feature generation.
//!
//! Produces, in order: polynomial terms, pairwise interactions, row-wise
//! statistics, then log/sqrt features. Only numeric columns feed the
//! generators and the target column is never used.

use polars::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::utils::{column_f64, numeric_columns};

/// Generated columns, in generation order.
pub type GeneratedColumns = Vec<(String, Vec<Option<f64>>)>;

#[derive(Debug, Clone)]
pub struct AutoFeatureGenerator {
    degree: usize,
    /// Leading numeric columns used for polynomial and interaction terms.
    max_columns: usize,
    max_interactions: usize,
}

impl AutoFeatureGenerator {
    pub fn new(degree: usize, max_columns: usize, max_interactions: usize) -> Self {
        Self {
            degree,
            max_columns,
            max_interactions,
        }
    }

    pub fn generate(&self, df: &DataFrame, target: Option<&str>) -> Result<GeneratedColumns> {
        let names: Vec<String> = numeric_columns(df)
            .into_iter()
            .filter(|c| Some(c.as_str()) != target)
            .collect();
        let columns: Vec<Vec<Option<f64>>> = names
            .iter()
            .map(|c| column_f64(df, c))
            .collect::<Result<_>>()?;

        let leading = names.len().min(self.max_columns);
        let mut out = self.polynomial(&names[..leading], &columns[..leading]);
        out.extend(self.interactions(&names[..leading], &columns[..leading]));
        out.extend(row_statistics(&columns, df.height()));
        out.extend(log_features(&names, &columns));
        debug!("Generated {} automatic feature(s)", out.len());
        Ok(out)
    }

    /// Terms of total degree 2..=degree, named like `a^2` and `a b`.
    fn polynomial(&self, names: &[String], columns: &[Vec<Option<f64>>]) -> GeneratedColumns {
        let mut out = Vec::new();
        for degree in 2..=self.degree {
            for combo in combinations_with_replacement(names.len(), degree) {
                let mut powers = vec![0usize; names.len()];
                for &i in &combo {
                    powers[i] += 1;
                }
                let name = powers
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| **p > 0)
                    .map(|(i, p)| match p {
                        1 => names[i].clone(),
                        p => format!("{}^{}", names[i], p),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                let values = (0..columns.first().map_or(0, Vec::len))
                    .map(|row| combo.iter().try_fold(1.0, |acc, &i| Some(acc * columns[i][row]?)))
                    .collect();
                out.push((name, values));
            }
        }
        out
    }

    /// Product, zero-guarded ratio, sum and difference per column pair,
    /// in pair order until the cap is reached.
    fn interactions(&self, names: &[String], columns: &[Vec<Option<f64>>]) -> GeneratedColumns {
        let mut out = Vec::new();
        'pairs: for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                if out.len() >= self.max_interactions {
                    break 'pairs;
                }
                let (a, b) = (&columns[i], &columns[j]);
                let zip = |f: fn(f64, f64) -> f64| -> Vec<Option<f64>> {
                    a.iter()
                        .zip(b)
                        .map(|(x, y)| Some(f((*x)?, (*y)?)))
                        .collect()
                };
                let (p, q) = (&names[i], &names[j]);
                out.push((format!("{p}_x_{q}"), zip(|x, y| x * y)));
                out.push((
                    format!("{p}_div_{q}"),
                    zip(|x, y| if y != 0.0 { x / y } else { 0.0 }),
                ));
                out.push((format!("{p}_add_{q}"), zip(|x, y| x + y)));
                out.push((format!("{p}_sub_{q}"), zip(|x, y| x - y)));
            }
        }
        out
    }
}

/// Ascending index tuples of length `k` drawn from `0..n` with repetition.
fn combinations_with_replacement(n: usize, k: usize) -> Vec<Vec<usize>> {
    if n == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut combo = vec![0usize; k];
    loop {
        out.push(combo.clone());
        let Some(pos) = (0..k).rev().find(|&p| combo[p] < n - 1) else {
            return out;
        };
        let next = combo[pos] + 1;
        for slot in &mut combo[pos..] {
            *slot = next;
        }
    }
}

/// `mean_all`, `std_all`, `max_all`, `min_all`, `range_all`; needs two numeric columns.
fn row_statistics(columns: &[Vec<Option<f64>>], height: usize) -> GeneratedColumns {
    if columns.len() < 2 {
        return Vec::new();
    }
    let mut mean = Vec::with_capacity(height);
    let mut std = Vec::with_capacity(height);
    let mut max = Vec::with_capacity(height);
    let mut min = Vec::with_capacity(height);
    let mut range = Vec::with_capacity(height);
    for row in 0..height {
        let values: Vec<f64> = columns
            .iter()
            .filter_map(|c| c[row])
            .filter(|v| !v.is_nan())
            .collect();
        let row_mean = crate::utils::mean(&values);
        let row_max = values.iter().copied().reduce(f64::max);
        let row_min = values.iter().copied().reduce(f64::min);
        mean.push(row_mean);
        std.push(crate::utils::std_dev(&values, 1));
        max.push(row_max);
        min.push(row_min);
        range.push(row_max.zip(row_min).map(|(hi, lo)| hi - lo));
    }
    vec![
        ("mean_all".to_string(), mean),
        ("std_all".to_string(), std),
        ("max_all".to_string(), max),
        ("min_all".to_string(), min),
        ("range_all".to_string(), range),
    ]
}

/// `log_{c}` and `sqrt_{c}` for columns whose observed minimum is positive.
fn log_features(names: &[String], columns: &[Vec<Option<f64>>]) -> GeneratedColumns {
    let mut out = Vec::new();
    for (name, values) in names.iter().zip(columns) {
        let min = values
            .iter()
            .flatten()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::min);
        if min.is_some_and(|m| m > 0.0) {
            out.push((format!("log_{name}"), values.iter().map(|v| v.map(f64::ln)).collect()));
            out.push((format!("sqrt_{name}"), values.iter().map(|v| v.map(f64::sqrt)).collect()));
        }
    }
    out
}

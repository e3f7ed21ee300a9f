//! Round-robin regression imputation.
//!
//! Every column starts mean-filled. Each round then regresses every column
//! with missing values on all the others (ridge least squares), visiting
//! columns from fewest to most missing values, and overwrites the missing
//! cells with the predictions. Rounds stop after `max_iter` or once the
//! largest change falls below `1e-3` times the largest observed magnitude.

use ndarray::{Array1, Array2};
use prepflow_learning::linalg::least_squares;
use tracing::debug;

use super::is_missing;
use crate::utils::mean;

const RIDGE_ALPHA: f64 = 1e-6;
const TOLERANCE: f64 = 1e-3;

/// Linear model for one column, fitted in the last round.
#[derive(Debug, Clone, PartialEq)]
struct ColumnModel {
    column: usize,
    coefficients: Vec<f64>,
    intercept: f64,
}

#[derive(Debug, Clone)]
pub struct IterativeImputer {
    max_iter: usize,
    initial: Vec<f64>,
    models: Vec<ColumnModel>,
    n_iter: usize,
}

impl IterativeImputer {
    pub fn new(max_iter: usize) -> Self {
        Self {
            max_iter: max_iter.max(1),
            initial: Vec::new(),
            models: Vec::new(),
            n_iter: 0,
        }
    }

    /// Rounds run by the last `fit_transform`.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Impute `rows` (row-major) and keep the final-round models.
    ///
    /// Columns with no observed value are left as they are.
    pub fn fit_transform(&mut self, rows: &[Vec<Option<f64>>]) -> Vec<Vec<Option<f64>>> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        if n_rows == 0 || n_cols == 0 {
            return rows.to_vec();
        }

        let missing: Vec<Vec<bool>> = rows
            .iter()
            .map(|r| r.iter().map(|v| is_missing(*v)).collect())
            .collect();
        self.initial = (0..n_cols)
            .map(|c| {
                let observed: Vec<f64> = (0..n_rows)
                    .filter(|&r| !missing[r][c])
                    .filter_map(|r| rows[r][c])
                    .collect();
                mean(&observed).unwrap_or(f64::NAN)
            })
            .collect();

        // Columns never observed are excluded from the regressions.
        let usable: Vec<usize> = (0..n_cols).filter(|&c| !self.initial[c].is_nan()).collect();
        let mut order: Vec<(usize, usize)> = usable
            .iter()
            .map(|&c| (c, (0..n_rows).filter(|&r| missing[r][c]).count()))
            .filter(|(_, n)| *n > 0)
            .collect();
        order.sort_by_key(|(_, n)| *n);

        let mut x = Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
            if missing[r][c] {
                self.initial[c]
            } else {
                rows[r][c].unwrap_or(f64::NAN)
            }
        });

        let mut scale = 0.0_f64;
        for &c in &usable {
            for r in (0..n_rows).filter(|&r| !missing[r][c]) {
                scale = scale.max(x[[r, c]].abs());
            }
        }

        self.models.clear();
        self.n_iter = 0;
        for round in 0..self.max_iter {
            let previous = x.clone();
            let mut models = Vec::with_capacity(order.len());

            for &(col, _) in &order {
                let predictors: Vec<usize> = usable.iter().copied().filter(|&c| c != col).collect();
                let train: Vec<usize> = (0..n_rows).filter(|&r| !missing[r][col]).collect();
                let Some(model) = fit_column(&x, col, &predictors, &train) else {
                    continue;
                };
                for r in (0..n_rows).filter(|&r| missing[r][col]) {
                    x[[r, col]] = model.predict_row(&x, &predictors, r);
                }
                models.push(model);
            }

            self.models = models;
            self.n_iter = round + 1;

            let change = (&x - &previous)
                .iter()
                .filter(|v| !v.is_nan())
                .fold(0.0_f64, |acc, v| acc.max(v.abs()));
            debug!("Iterative imputation round {}: max change {:.6}", round + 1, change);
            if change < TOLERANCE * scale {
                break;
            }
        }

        restore(rows, &x, &missing, &usable)
    }

    /// Mean-fill `rows` with the fitted means, then replay the last round.
    pub fn transform(&self, rows: &[Vec<Option<f64>>]) -> Vec<Vec<Option<f64>>> {
        let n_rows = rows.len();
        let n_cols = self.initial.len();
        if n_rows == 0 || rows[0].len() != n_cols {
            return rows.to_vec();
        }

        let missing: Vec<Vec<bool>> = rows
            .iter()
            .map(|r| r.iter().map(|v| is_missing(*v)).collect())
            .collect();
        let usable: Vec<usize> = (0..n_cols).filter(|&c| !self.initial[c].is_nan()).collect();
        let mut x = Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
            if missing[r][c] {
                self.initial[c]
            } else {
                rows[r][c].unwrap_or(f64::NAN)
            }
        });

        for model in &self.models {
            let predictors: Vec<usize> = usable
                .iter()
                .copied()
                .filter(|&c| c != model.column)
                .collect();
            for r in (0..n_rows).filter(|&r| missing[r][model.column]) {
                x[[r, model.column]] = model.predict_row(&x, &predictors, r);
            }
        }

        restore(rows, &x, &missing, &usable)
    }
}

impl ColumnModel {
    fn predict_row(&self, x: &Array2<f64>, predictors: &[usize], row: usize) -> f64 {
        self.intercept
            + predictors
                .iter()
                .zip(&self.coefficients)
                .map(|(&c, w)| x[[row, c]] * w)
                .sum::<f64>()
    }
}

/// Ridge fit of `col` on `predictors` over the `train` rows, with intercept.
fn fit_column(x: &Array2<f64>, col: usize, predictors: &[usize], train: &[usize]) -> Option<ColumnModel> {
    if train.is_empty() {
        return None;
    }
    let n = train.len() as f64;
    let y_mean = train.iter().map(|&r| x[[r, col]]).sum::<f64>() / n;

    if predictors.is_empty() {
        return Some(ColumnModel {
            column: col,
            coefficients: Vec::new(),
            intercept: y_mean,
        });
    }

    let x_means: Vec<f64> = predictors
        .iter()
        .map(|&c| train.iter().map(|&r| x[[r, c]]).sum::<f64>() / n)
        .collect();
    let design = Array2::from_shape_fn((train.len(), predictors.len()), |(i, j)| {
        x[[train[i], predictors[j]]] - x_means[j]
    });
    let target = Array1::from_iter(train.iter().map(|&r| x[[r, col]] - y_mean));

    let coefficients = least_squares(&design, &target, RIDGE_ALPHA)?.to_vec();
    let intercept = y_mean
        - coefficients
            .iter()
            .zip(&x_means)
            .map(|(w, m)| w * m)
            .sum::<f64>();

    Some(ColumnModel {
        column: col,
        coefficients,
        intercept,
    })
}

/// Copy imputed cells of usable columns back into the row-major buffer.
fn restore(
    rows: &[Vec<Option<f64>>],
    x: &Array2<f64>,
    missing: &[Vec<bool>],
    usable: &[usize],
) -> Vec<Vec<Option<f64>>> {
    let mut output = rows.to_vec();
    for (r, row) in output.iter_mut().enumerate() {
        for &c in usable {
            if missing[r][c] {
                row[c] = Some(x[[r, c]]);
            }
        }
    }
    output
}

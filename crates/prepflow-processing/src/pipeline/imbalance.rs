//! Class-balance resampling.
//!
//! Every method targets the "auto" balance: over-samplers grow each class
//! to the majority count, the under-sampler shrinks each class to the
//! minority count. Resampled output keeps the original rows first (in
//! input order) followed by the generated rows.
//!
//! Features must be numeric and null-free. Synthetic rows are interpolated
//! in Euclidean space, so feature columns come back as `Float64` whenever
//! a synthetic row is added.

use std::collections::BTreeMap;

use ndarray::Array2;
use polars::prelude::*;
use prepflow_learning::data::columns_to_array2;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::{ClassImbalanceConfig, ImbalanceMethod};
use crate::error::{PreprocessingError, Result};

/// Neighbourhood used to classify Borderline-SMOTE seeds as "in danger".
const DANGER_NEIGHBORS: usize = 10;
/// Neighbourhood used by the edited-nearest-neighbours cleaning step.
const ENN_NEIGHBORS: usize = 3;

#[derive(Debug, Clone)]
enum Row {
    Original(usize),
    /// Generated row; `seed` is the original row whose label it carries.
    Synthetic { seed: usize, values: Vec<f64> },
}

impl Row {
    fn source(&self) -> usize {
        match self {
            Row::Original(i) => *i,
            Row::Synthetic { seed, .. } => *seed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassImbalanceHandler {
    config: ClassImbalanceConfig,
}

impl ClassImbalanceHandler {
    pub fn new(config: ClassImbalanceConfig) -> Self {
        Self { config }
    }

    /// Resample features `x` and labels `y`. The caller re-attaches `y`.
    pub fn fit_resample(&self, x: &DataFrame, y: &Series) -> Result<(DataFrame, Series)> {
        info!("Resampling classes with {:?}", self.config.method);
        if x.height() != y.len() {
            return Err(PreprocessingError::ResamplingFailed(format!(
                "features have {} rows but target has {}",
                x.height(),
                y.len()
            )));
        }
        if y.null_count() > 0 {
            return Err(PreprocessingError::ResamplingFailed(format!(
                "target '{}' contains {} null value(s)",
                y.name(),
                y.null_count()
            )));
        }

        let names: Vec<String> = x.get_column_names().iter().map(|s| s.to_string()).collect();
        let matrix = columns_to_array2(x, &names)
            .map_err(|e| PreprocessingError::ResamplingFailed(e.to_string()))?;
        let labels = class_labels(y)?;
        let classes = group_by_class(&labels);
        if classes.len() < 2 {
            warn!("Skipping resampling: target has {} class(es)", classes.len());
            return Ok((x.clone(), y.clone()));
        }

        let mut rng = StdRng::seed_from_u64(self.config.random_state);
        let k = self.config.k_neighbors;
        let rows = match self.config.method {
            ImbalanceMethod::Smote => smote(&matrix, &classes, k, &mut rng)?,
            ImbalanceMethod::BorderlineSmote => {
                borderline_smote(&matrix, &labels, &classes, k, &mut rng)?
            }
            ImbalanceMethod::Adasyn => adasyn(&matrix, &labels, &classes, k, &mut rng)?,
            ImbalanceMethod::RandomOversample => random_oversample(&classes, matrix.nrows(), &mut rng),
            ImbalanceMethod::RandomUndersample => random_undersample(&classes, &mut rng),
            ImbalanceMethod::SmoteTomek => {
                let rows = smote(&matrix, &classes, k, &mut rng)?;
                remove_tomek_links(&matrix, &labels, rows)
            }
            ImbalanceMethod::SmoteEnn => {
                let rows = smote(&matrix, &classes, k, &mut rng)?;
                edited_nearest_neighbours(&matrix, &labels, rows)
            }
        };
        debug!("Resampled {} rows into {}", matrix.nrows(), rows.len());

        build_output(x, y, &names, &matrix, &rows)
    }
}

fn class_labels(y: &Series) -> Result<Vec<String>> {
    let as_str = y.cast(&DataType::String)?;
    Ok(as_str
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

/// Row indices per class, classes in sorted label order.
fn group_by_class(labels: &[String]) -> BTreeMap<String, Vec<usize>> {
    let mut classes: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        classes.entry(label.clone()).or_default().push(i);
    }
    classes
}

fn majority_count(classes: &BTreeMap<String, Vec<usize>>) -> usize {
    classes.values().map(Vec::len).max().unwrap_or(0)
}

fn distance(x: &Array2<f64>, a: usize, b: usize) -> f64 {
    x.row(a)
        .iter()
        .zip(x.row(b).iter())
        .map(|(p, q)| (p - q).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// The `k` candidates closest to row `i` (excluding `i`), ties by index.
fn nearest(x: &Array2<f64>, i: usize, candidates: &[usize], k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f64)> = candidates
        .iter()
        .filter(|&&j| j != i)
        .map(|&j| (j, distance(x, i, j)))
        .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    scored.truncate(k);
    scored.into_iter().map(|(j, _)| j).collect()
}

fn originals(n: usize) -> Vec<Row> {
    (0..n).map(Row::Original).collect()
}

/// Interpolate between `seed` and one of its in-class neighbours.
fn synthesize(x: &Array2<f64>, seed: usize, neighbour: usize, rng: &mut StdRng) -> Row {
    let gap: f64 = rng.r#gen();
    let values = x
        .row(seed)
        .iter()
        .zip(x.row(neighbour).iter())
        .map(|(a, b)| a + gap * (b - a))
        .collect();
    Row::Synthetic { seed, values }
}

fn in_class_neighbours(
    x: &Array2<f64>,
    label: &str,
    members: &[usize],
    k: usize,
) -> Result<(usize, Vec<Vec<usize>>)> {
    if members.len() < 2 {
        return Err(PreprocessingError::ResamplingFailed(format!(
            "class '{}' has {} sample(s); at least 2 are needed to interpolate",
            label,
            members.len()
        )));
    }
    let k = k.min(members.len() - 1);
    let neighbours = members.iter().map(|&i| nearest(x, i, members, k)).collect();
    Ok((k, neighbours))
}

fn smote(
    x: &Array2<f64>,
    classes: &BTreeMap<String, Vec<usize>>,
    k: usize,
    rng: &mut StdRng,
) -> Result<Vec<Row>> {
    let majority = majority_count(classes);
    let mut rows = originals(x.nrows());
    for (label, members) in classes {
        let need = majority - members.len();
        if need == 0 {
            continue;
        }
        let (k, neighbours) = in_class_neighbours(x, label, members, k)?;
        for _ in 0..need {
            let s = rng.gen_range(0..members.len());
            let nb = neighbours[s][rng.gen_range(0..k)];
            rows.push(synthesize(x, members[s], nb, rng));
        }
    }
    Ok(rows)
}

/// Borderline-SMOTE (variant 1): only seeds whose neighbourhood is mostly,
/// but not entirely, other classes generate samples.
fn borderline_smote(
    x: &Array2<f64>,
    labels: &[String],
    classes: &BTreeMap<String, Vec<usize>>,
    k: usize,
    rng: &mut StdRng,
) -> Result<Vec<Row>> {
    let majority = majority_count(classes);
    let everyone: Vec<usize> = (0..x.nrows()).collect();
    let m = DANGER_NEIGHBORS.min(x.nrows() - 1);
    let mut rows = originals(x.nrows());

    for (label, members) in classes {
        let need = majority - members.len();
        if need == 0 {
            continue;
        }
        let (k, neighbours) = in_class_neighbours(x, label, members, k)?;
        let danger: Vec<usize> = (0..members.len())
            .filter(|&s| {
                let others = nearest(x, members[s], &everyone, m)
                    .iter()
                    .filter(|&&j| labels[j] != *label)
                    .count();
                2 * others >= m && others < m
            })
            .collect();
        if danger.is_empty() {
            warn!("Borderline-SMOTE: no borderline samples in class '{}'", label);
            continue;
        }
        for _ in 0..need {
            let s = danger[rng.gen_range(0..danger.len())];
            let nb = neighbours[s][rng.gen_range(0..k)];
            rows.push(synthesize(x, members[s], nb, rng));
        }
    }
    Ok(rows)
}

/// ADASYN: each seed generates in proportion to the share of other classes
/// among its `k` nearest neighbours.
fn adasyn(
    x: &Array2<f64>,
    labels: &[String],
    classes: &BTreeMap<String, Vec<usize>>,
    k: usize,
    rng: &mut StdRng,
) -> Result<Vec<Row>> {
    let majority = majority_count(classes);
    let everyone: Vec<usize> = (0..x.nrows()).collect();
    let k_all = k.min(x.nrows() - 1);
    let mut rows = originals(x.nrows());

    for (label, members) in classes {
        let need = majority - members.len();
        if need == 0 {
            continue;
        }
        let ratios: Vec<f64> = members
            .iter()
            .map(|&i| {
                let others = nearest(x, i, &everyone, k_all)
                    .iter()
                    .filter(|&&j| labels[j] != *label)
                    .count();
                others as f64 / k_all as f64
            })
            .collect();
        let total: f64 = ratios.iter().sum();
        if total == 0.0 {
            warn!("ADASYN: no neighbours from other classes around class '{}'", label);
            continue;
        }
        let (k, neighbours) = in_class_neighbours(x, label, members, k)?;
        for (s, ratio) in ratios.iter().enumerate() {
            let count = (ratio / total * need as f64).round() as usize;
            for _ in 0..count {
                let nb = neighbours[s][rng.gen_range(0..k)];
                rows.push(synthesize(x, members[s], nb, rng));
            }
        }
    }
    Ok(rows)
}

fn random_oversample(
    classes: &BTreeMap<String, Vec<usize>>,
    n: usize,
    rng: &mut StdRng,
) -> Vec<Row> {
    let majority = majority_count(classes);
    let mut rows = originals(n);
    for members in classes.values() {
        for _ in members.len()..majority {
            rows.push(Row::Original(members[rng.gen_range(0..members.len())]));
        }
    }
    rows
}

fn random_undersample(classes: &BTreeMap<String, Vec<usize>>, rng: &mut StdRng) -> Vec<Row> {
    let minority = classes.values().map(Vec::len).min().unwrap_or(0);
    let mut kept: Vec<usize> = classes
        .values()
        .flat_map(|members| {
            index::sample(rng, members.len(), minority)
                .into_iter()
                .map(|i| members[i])
                .collect::<Vec<_>>()
        })
        .collect();
    kept.sort_unstable();
    kept.into_iter().map(Row::Original).collect()
}

/// Feature vector of a resampled row.
fn row_values(x: &Array2<f64>, row: &Row) -> Vec<f64> {
    match row {
        Row::Original(i) => x.row(*i).to_vec(),
        Row::Synthetic { values, .. } => values.clone(),
    }
}

fn resampled_matrix(x: &Array2<f64>, rows: &[Row]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), x.ncols()), |(r, c)| match &rows[r] {
        Row::Original(i) => x[[*i, c]],
        Row::Synthetic { values, .. } => values[c],
    })
}

/// Drop both ends of every Tomek link (mutual nearest neighbours with different labels).
fn remove_tomek_links(x: &Array2<f64>, labels: &[String], rows: Vec<Row>) -> Vec<Row> {
    let matrix = resampled_matrix(x, &rows);
    let everyone: Vec<usize> = (0..rows.len()).collect();
    let nn: Vec<Option<usize>> = (0..rows.len())
        .map(|i| nearest(&matrix, i, &everyone, 1).first().copied())
        .collect();
    let linked: Vec<bool> = (0..rows.len())
        .map(|a| match nn[a] {
            Some(b) => nn[b] == Some(a) && labels[rows[a].source()] != labels[rows[b].source()],
            None => false,
        })
        .collect();
    debug!("Tomek links removed {} row(s)", linked.iter().filter(|l| **l).count());
    rows.into_iter()
        .zip(linked)
        .filter_map(|(row, l)| (!l).then_some(row))
        .collect()
}

/// Keep rows whose nearest neighbours all share their label.
fn edited_nearest_neighbours(x: &Array2<f64>, labels: &[String], rows: Vec<Row>) -> Vec<Row> {
    let matrix = resampled_matrix(x, &rows);
    let everyone: Vec<usize> = (0..rows.len()).collect();
    let k = ENN_NEIGHBORS.min(rows.len().saturating_sub(1));
    let keep: Vec<bool> = (0..rows.len())
        .map(|i| {
            let own = &labels[rows[i].source()];
            nearest(&matrix, i, &everyone, k)
                .iter()
                .all(|&j| labels[rows[j].source()] == *own)
        })
        .collect();
    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, k)| k.then_some(row))
        .collect()
}

fn build_output(
    x: &DataFrame,
    y: &Series,
    names: &[String],
    matrix: &Array2<f64>,
    rows: &[Row],
) -> Result<(DataFrame, Series)> {
    let sources: Vec<IdxSize> = rows.iter().map(|r| r.source() as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), sources);
    let y_out = y.take(&idx)?;

    if rows.iter().all(|r| matches!(r, Row::Original(_))) {
        return Ok((x.take(&idx)?, y_out));
    }

    let values: Vec<Vec<f64>> = rows.iter().map(|r| row_values(matrix, r)).collect();
    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(c, name)| {
            let column: Vec<f64> = values.iter().map(|row| row[c]).collect();
            Series::new(name.as_str().into(), column).into()
        })
        .collect();
    Ok((DataFrame::new(columns)?, y_out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// 12 majority rows around (0, 0) and 4 minority rows around (5, 5).
    fn imbalanced() -> (DataFrame, Series) {
        let mut a = Vec::new();
        let mut b = Vec::new();
        let mut y = Vec::new();
        for i in 0..12 {
            a.push((i % 4) as f64 * 0.3);
            b.push((i / 4) as f64 * 0.3);
            y.push(0i64);
        }
        for i in 0..4 {
            a.push(5.0 + i as f64 * 0.2);
            b.push(5.0 - i as f64 * 0.1);
            y.push(1i64);
        }
        (
            df!["a" => a, "b" => b].unwrap(),
            Series::new("target".into(), y),
        )
    }

    fn counts(y: &Series) -> BTreeMap<String, usize> {
        class_labels(y)
            .unwrap()
            .into_iter()
            .fold(BTreeMap::new(), |mut m, l| {
                *m.entry(l).or_insert(0) += 1;
                m
            })
    }

    fn handler(method: ImbalanceMethod) -> ClassImbalanceHandler {
        ClassImbalanceHandler::new(ClassImbalanceConfig {
            method,
            k_neighbors: 3,
            random_state: 42,
        })
    }

    #[test]
    fn test_smote_balances_and_keeps_originals_first() {
        let (x, y) = imbalanced();
        let (xr, yr) = handler(ImbalanceMethod::Smote).fit_resample(&x, &y).unwrap();

        assert_eq!(xr.height(), 24);
        assert_eq!(counts(&yr).values().copied().collect::<Vec<_>>(), vec![12, 12]);
        let a_in = x.column("a").unwrap().as_materialized_series().f64().unwrap().get(0);
        let a_out = xr.column("a").unwrap().as_materialized_series().f64().unwrap().get(0);
        assert_eq!(a_in, a_out);

        // Synthetic minority rows lie between minority points.
        let a_col: Vec<f64> = xr
            .column("a")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(a_col[16..].iter().all(|&v| (5.0..=5.6).contains(&v)));
    }

    #[test]
    fn test_smote_is_deterministic() {
        let (x, y) = imbalanced();
        let first = handler(ImbalanceMethod::Smote).fit_resample(&x, &y).unwrap();
        let second = handler(ImbalanceMethod::Smote).fit_resample(&x, &y).unwrap();
        assert!(first.0.equals(&second.0));
    }

    #[test]
    fn test_random_samplers() {
        let (x, y) = imbalanced();
        let (xo, yo) = handler(ImbalanceMethod::RandomOversample).fit_resample(&x, &y).unwrap();
        assert_eq!(xo.height(), 24);
        assert_eq!(xo.column("a").unwrap().dtype(), &DataType::Float64);
        assert_eq!(counts(&yo).values().copied().collect::<Vec<_>>(), vec![12, 12]);

        let (xu, yu) = handler(ImbalanceMethod::RandomUndersample).fit_resample(&x, &y).unwrap();
        assert_eq!(xu.height(), 8);
        assert_eq!(counts(&yu).values().copied().collect::<Vec<_>>(), vec![4, 4]);
    }

    #[test]
    fn test_combined_methods_do_not_grow_past_smote() {
        let (x, y) = imbalanced();
        for method in [ImbalanceMethod::SmoteTomek, ImbalanceMethod::SmoteEnn] {
            let (xr, yr) = handler(method).fit_resample(&x, &y).unwrap();
            assert!(xr.height() <= 24);
            assert_eq!(xr.height(), yr.len());
        }
    }

    #[test]
    fn test_adasyn_and_borderline_keep_originals() {
        let (x, y) = imbalanced();
        for method in [ImbalanceMethod::Adasyn, ImbalanceMethod::BorderlineSmote] {
            let (xr, yr) = handler(method).fit_resample(&x, &y).unwrap();
            assert!(xr.height() >= 16);
            assert_eq!(xr.height(), yr.len());
        }
    }

    #[test]
    fn test_text_features_fail() {
        let x = df!["s" => ["a", "b", "c"]].unwrap();
        let y = Series::new("t".into(), [0i64, 0, 1]);
        let err = handler(ImbalanceMethod::Smote).fit_resample(&x, &y).unwrap_err();
        assert_eq!(err.error_code(), "RESAMPLING_FAILED");
    }

    #[test]
    fn test_single_minority_sample_fails_smote() {
        let x = df!["a" => [0.0, 0.1, 0.2, 9.0]].unwrap();
        let y = Series::new("t".into(), ["n", "n", "n", "y"]);
        let err = handler(ImbalanceMethod::Smote).fit_resample(&x, &y).unwrap_err();
        assert!(matches!(err, PreprocessingError::ResamplingFailed(_)));
    }
}

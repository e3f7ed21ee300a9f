use tracing::debug;

use super::is_missing;
use crate::utils::mean;

/// k-nearest-neighbour imputation with NaN-aware euclidean distance.
///
/// Donor rows are kept from `fit`, so `transform` fills new rows from the
/// fitted data.
#[derive(Debug, Clone)]
pub struct KNNImputer {
    n_neighbors: usize,
    donors: Vec<Vec<Option<f64>>>,
    column_means: Vec<Option<f64>>,
}

impl KNNImputer {
    /// Create a new KNN imputer with specified number of neighbors
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            donors: Vec::new(),
            column_means: Vec::new(),
        }
    }

    /// Remember `rows` (row-major, one entry per column) as donors.
    pub fn fit(&mut self, rows: &[Vec<Option<f64>>]) {
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        self.column_means = (0..n_cols)
            .map(|c| {
                let observed: Vec<f64> = rows
                    .iter()
                    .filter_map(|r| r[c])
                    .filter(|v| !v.is_nan())
                    .collect();
                mean(&observed)
            })
            .collect();
        self.donors = rows.to_vec();
    }

    /// Fill every missing cell of `rows` from the fitted donors.
    pub fn transform(&self, rows: &[Vec<Option<f64>>]) -> Vec<Vec<Option<f64>>> {
        let mut output = rows.to_vec();

        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !is_missing(*value) {
                    continue;
                }
                let Some(fallback) = self.column_means.get(c).copied().flatten() else {
                    // Column never observed at fit time.
                    continue;
                };
                output[r][c] = Some(self.impute_cell(row, c).unwrap_or(fallback));
            }
        }
        output
    }

    pub fn fit_transform(&mut self, rows: &[Vec<Option<f64>>]) -> Vec<Vec<Option<f64>>> {
        self.fit(rows);
        self.transform(rows)
    }

    /// Uniform mean over the k nearest donors that observe column `col`.
    fn impute_cell(&self, receiver: &[Option<f64>], col: usize) -> Option<f64> {
        let mut distances: Vec<(f64, f64)> = self
            .donors
            .iter()
            .filter_map(|donor| {
                let value = donor[col].filter(|v| !v.is_nan())?;
                let distance = nan_euclidean(receiver, donor)?;
                Some((distance, value))
            })
            .collect();

        if distances.is_empty() {
            debug!("No donor with a finite distance for column {}, using mean", col);
            return None;
        }
        distances.sort_by(|a, b| a.0.total_cmp(&b.0));

        let k = self.n_neighbors.min(distances.len());
        Some(distances[..k].iter().map(|(_, v)| v).sum::<f64>() / k as f64)
    }
}

/// Euclidean distance over coordinates present in both rows, scaled up by
/// `total / present`. `None` when no coordinate is shared.
pub fn nan_euclidean(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    let mut present = 0usize;
    for (x, y) in a.iter().zip(b) {
        if let (Some(x), Some(y)) = (x, y)
            && !x.is_nan()
            && !y.is_nan()
        {
            sum += (x - y).powi(2);
            present += 1;
        }
    }
    if present == 0 {
        return None;
    }
    let weight = a.len() as f64 / present as f64;
    Some((weight * sum).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nan_euclidean_weighting() {
        let a = vec![Some(1.0), None, Some(3.0)];
        let b = vec![Some(2.0), Some(5.0), Some(5.0)];
        // (1 + 4) * 3/2
        assert!((nan_euclidean(&a, &b).unwrap() - 7.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(nan_euclidean(&[None], &[Some(1.0)]), None);
    }

    #[test]
    fn test_imputes_from_nearest_donors() {
        let rows = vec![
            vec![Some(1.0), Some(10.0)],
            vec![Some(2.0), Some(20.0)],
            vec![Some(100.0), Some(1000.0)],
            vec![Some(1.5), None],
        ];
        let mut imputer = KNNImputer::new(2);
        let out = imputer.fit_transform(&rows);
        assert_eq!(out[3][1], Some(15.0));
        assert_eq!(out[0], rows[0]);
    }

    #[test]
    fn test_falls_back_to_mean_without_shared_coordinates() {
        let rows = vec![
            vec![None, Some(2.0)],
            vec![Some(1.0), None],
            vec![Some(3.0), None],
        ];
        let mut imputer = KNNImputer::new(5);
        let out = imputer.fit_transform(&rows);
        // Row 0 shares no observed coordinate with the donors of column 0.
        assert_eq!(out[0][0], Some(2.0));
    }
}

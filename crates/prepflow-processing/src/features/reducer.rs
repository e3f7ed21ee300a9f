//! PCA dimensionality reduction.

use ndarray::{Array2, Axis};
use polars::prelude::*;
use prepflow_learning::data::columns_to_array2;
use prepflow_learning::linalg::symmetric_eigen;
use tracing::{debug, info};

use crate::error::Result;
use crate::utils::column_names;

#[derive(Debug, Clone)]
pub struct DimensionalityReducer {
    n_components: usize,
    explained_variance: Vec<f64>,
}

impl DimensionalityReducer {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            explained_variance: Vec::new(),
        }
    }

    /// Variance captured by each component of the last reduction.
    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    /// Project the non-target columns onto `PC1..PCn`, then re-attach the
    /// target unchanged. Frames with no more than `n` features are returned as-is.
    pub fn reduce(&mut self, df: DataFrame, target: Option<&str>) -> Result<DataFrame> {
        let features: Vec<String> = column_names(&df)
            .into_iter()
            .filter(|c| Some(c.as_str()) != target)
            .collect();
        if features.len() <= self.n_components {
            debug!(
                "Skipping PCA: {} feature(s) <= {} components",
                features.len(),
                self.n_components
            );
            return Ok(df);
        }
        info!("Reducing {} features to {} components...", features.len(), self.n_components);

        let x = columns_to_array2(&df, &features)?;
        let n = x.nrows();
        let centered = match x.mean_axis(Axis(0)) {
            Some(means) => &x - &means,
            None => x.clone(),
        };
        let dof = n.saturating_sub(1).max(1) as f64;
        let covariance: Array2<f64> = centered.t().dot(&centered) / dof;
        let (values, mut vectors) = symmetric_eigen(&covariance);

        // Fix each component's sign so its largest loading is positive.
        for mut component in vectors.columns_mut() {
            let pivot = component
                .iter()
                .copied()
                .reduce(|a, b| if b.abs() > a.abs() { b } else { a })
                .unwrap_or(0.0);
            if pivot < 0.0 {
                component.mapv_inplace(|v| -v);
            }
        }

        let k = self.n_components;
        let basis = vectors.slice(ndarray::s![.., ..k]);
        let projected = centered.dot(&basis);
        self.explained_variance = values.iter().take(k).copied().collect();

        let mut columns: Vec<Column> = (0..k)
            .map(|i| {
                Series::new(format!("PC{}", i + 1).into(), projected.column(i).to_vec()).into()
            })
            .collect();
        if let Some(target) = target {
            columns.push(df.column(target)?.clone());
        }
        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_projects_and_keeps_target() {
        let df = df![
            "a" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "b" => [2.0, 4.1, 5.9, 8.0, 10.1],
            "c" => [0.5, 0.4, 0.6, 0.5, 0.4],
            "target" => ["x", "y", "x", "y", "x"],
        ]
        .unwrap();
        let mut reducer = DimensionalityReducer::new(2);
        let out = reducer.reduce(df, Some("target")).unwrap();

        assert_eq!(column_names(&out), vec!["PC1", "PC2", "target"]);
        let ev = reducer.explained_variance();
        assert!(ev[0] > ev[1]);
        // First component follows the a/b trend.
        let pc1 = crate::utils::column_f64(&out, "PC1").unwrap();
        assert!(pc1[0].unwrap() < pc1[4].unwrap());
    }

    #[test]
    fn test_few_features_untouched() {
        let df = df!["a" => [1.0, 2.0], "t" => [0i64, 1]].unwrap();
        let out = DimensionalityReducer::new(10).reduce(df.clone(), Some("t")).unwrap();
        assert!(out.equals(&df));
    }
}

//! User-defined features from arithmetic expressions.

use polars::prelude::*;
use tracing::{debug, warn};

use crate::config::ManualFeature;
use crate::error::Result;
use crate::features::expr::Expr;
use crate::utils::set_f64_column;

#[derive(Debug, Clone)]
pub struct ManualFeatureGenerator {
    features: Vec<ManualFeature>,
}

impl ManualFeatureGenerator {
    pub fn new(features: Vec<ManualFeature>) -> Self {
        Self { features }
    }

    /// Evaluate each expression in order and add it as a column.
    ///
    /// Later expressions may use earlier results. An expression that fails
    /// to parse or evaluate is logged and skipped; its name is reported in
    /// the returned failures instead of the created list.
    pub fn create_features(
        &self,
        df: DataFrame,
    ) -> Result<(DataFrame, Vec<String>, Vec<(String, String)>)> {
        let mut df = df;
        let mut created = Vec::new();
        let mut failed = Vec::new();

        for feature in &self.features {
            match Expr::parse(&feature.expression).and_then(|e| e.evaluate(&df)) {
                Ok(values) => {
                    set_f64_column(&mut df, &feature.name, values)?;
                    debug!("Created '{}' = {}", feature.name, feature.expression);
                    created.push(feature.name.clone());
                }
                Err(e) => {
                    warn!("Error creating feature {}: {}", feature.name, e);
                    failed.push((feature.name.clone(), e.to_string()));
                }
            }
        }

        Ok((df, created, failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_creates_in_order_and_skips_failures() {
        let df = df!["age" => [40.0, 60.0], "chol" => [200.0, 240.0]].unwrap();
        let generator = ManualFeatureGenerator::new(vec![
            ManualFeature::new("age_chol_sum", "age + chol"),
            ManualFeature::new("bad", "age + missing"),
            ManualFeature::new("half_sum", "age_chol_sum / 2"),
        ]);

        let (out, created, failed) = generator.create_features(df).unwrap();
        assert_eq!(created, vec!["age_chol_sum", "half_sum"]);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "bad");
        assert_eq!(out.width(), 4);
        let half: Vec<Option<f64>> = out
            .column("half_sum")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(half, vec![Some(120.0), Some(150.0)]);
    }
}

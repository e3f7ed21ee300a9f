//! Rare category collapsing.

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RareCategoryConfig;
use crate::error::Result;
use crate::utils::{
    bracket_list, categorical_columns, column_strings, has_column, set_string_column, value_counts,
};

/// Categories collapsed for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RareCategories {
    pub column: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RareCategoryHandler {
    config: RareCategoryConfig,
    rare: Vec<RareCategories>,
}

impl RareCategoryHandler {
    pub fn new(config: RareCategoryConfig) -> Self {
        Self {
            config,
            rare: Vec::new(),
        }
    }

    pub fn rare_categories(&self) -> &[RareCategories] {
        &self.rare
    }

    /// Replace categories whose share of non-null values is below the
    /// threshold. A column with rare categories comes back as text.
    pub fn fit_transform(
        &mut self,
        df: DataFrame,
        processing_steps: &mut Vec<String>,
    ) -> Result<DataFrame> {
        info!("Collapsing rare categories below {}", self.config.threshold);
        self.rare.clear();
        let mut df = df;

        let columns = match &self.config.columns {
            None => categorical_columns(&df),
            Some(listed) => listed
                .iter()
                .filter(|c| {
                    let found = has_column(&df, c);
                    if !found {
                        warn!("Skipping rare categories for '{}': column not found", c);
                    }
                    found
                })
                .cloned()
                .collect(),
        };

        for column in columns {
            let values = column_strings(&df, &column)?;
            let counts = value_counts(&values)?;
            let total: usize = counts.iter().map(|(_, n)| n).sum();
            let mut categories: Vec<String> = counts
                .into_iter()
                .filter(|(_, n)| (*n as f64 / total as f64) < self.config.threshold)
                .map(|(category, _)| category)
                .collect();
            categories.sort();
            debug!("'{}': {} rare categories", column, categories.len());

            if !categories.is_empty() {
                set_string_column(&mut df, &column, self.replace(&values, &categories))?;
                processing_steps.push(format!(
                    "Replaced {} rare categories in '{}' with '{}': {}",
                    categories.len(),
                    column,
                    self.config.replacement,
                    bracket_list(&categories)
                ));
            }
            self.rare.push(RareCategories { column, categories });
        }

        Ok(df)
    }

    /// Collapse the fitted rare categories in new data.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = df.clone();
        for rare in self.rare.iter().filter(|r| !r.categories.is_empty()) {
            if has_column(&df, &rare.column) {
                let values = column_strings(&df, &rare.column)?;
                set_string_column(&mut df, &rare.column, self.replace(&values, &rare.categories))?;
            }
        }
        Ok(df)
    }

    fn replace(&self, values: &[Option<String>], rare: &[String]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| match v {
                Some(s) if rare.binary_search(s).is_ok() => Some(self.config.replacement.clone()),
                other => other.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn grades() -> DataFrame {
        let mut values = vec!["A"; 90];
        values.extend(vec!["B"; 8]);
        values.extend(vec!["C"; 2]);
        df!["grade" => values].unwrap()
    }

    #[test]
    fn test_collapses_below_threshold() {
        let mut handler = RareCategoryHandler::new(RareCategoryConfig {
            threshold: 0.05,
            ..Default::default()
        });
        let mut steps = Vec::new();
        let out = handler.fit_transform(grades(), &mut steps).unwrap();

        let seen: BTreeSet<String> =
            column_strings(&out, "grade").unwrap().into_iter().flatten().collect();
        let expected: BTreeSet<String> =
            ["A", "B", "Other"].iter().map(|s| s.to_string()).collect();
        assert_eq!(seen, expected);
        assert_eq!(handler.rare_categories()[0].categories, vec!["C"]);
        assert_eq!(steps, vec!["Replaced 1 rare categories in 'grade' with 'Other': [C]".to_string()]);
    }

    #[test]
    fn test_numeric_column_untouched_without_rare_values() {
        let df = df!["code" => [1i64, 1, 2, 2]].unwrap();
        let mut handler = RareCategoryHandler::new(RareCategoryConfig {
            columns: Some(vec!["code".into(), "missing".into()]),
            threshold: 0.1,
            ..Default::default()
        });
        let out = handler.fit_transform(df, &mut Vec::new()).unwrap();
        assert_eq!(out.column("code").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_transform_new_data() {
        let mut handler = RareCategoryHandler::new(RareCategoryConfig {
            threshold: 0.05,
            replacement: "rare".into(),
            ..Default::default()
        });
        handler.fit_transform(grades(), &mut Vec::new()).unwrap();
        let out = handler.transform(&df!["grade" => ["C", "A", "D"]].unwrap()).unwrap();
        assert_eq!(
            column_strings(&out, "grade").unwrap(),
            vec![Some("rare".to_string()), Some("A".to_string()), Some("D".to_string())]
        );
    }
}

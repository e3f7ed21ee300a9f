//! Configuration for the feature engineering orchestrator.

use std::collections::HashSet;

use prepflow_learning::TaskType;
use serde::{Deserialize, Serialize};

use super::{ConfigValidationError, check_positive};

/// Which generators run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMode {
    Auto,
    Manual,
    #[default]
    Both,
}

impl FeatureMode {
    pub fn runs_auto(self) -> bool {
        matches!(self, FeatureMode::Auto | FeatureMode::Both)
    }

    pub fn runs_manual(self) -> bool {
        matches!(self, FeatureMode::Manual | FeatureMode::Both)
    }
}

/// Feature selection strategy, used only when a target is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// ANOVA F-test (classification) or F-regression (regression), top-k.
    #[default]
    Univariate,
    /// Recursive feature elimination with a random forest.
    Rfe,
    /// Top-k by sample variance.
    Variance,
}

/// A named arithmetic expression over column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManualFeature {
    pub name: String,
    pub expression: String,
}

impl ManualFeature {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureEngineeringConfig {
    pub mode: FeatureMode,
    /// Expressions evaluated in order; later ones may reference earlier ones.
    pub manual_features: Vec<ManualFeature>,
    pub task: TaskType,
    pub target: Option<String>,
    pub selection_method: SelectionMethod,
    pub k_features: usize,
    pub apply_dimensionality_reduction: bool,
    pub n_components: usize,
    pub polynomial_degree: usize,
    pub max_polynomial_columns: usize,
    pub max_interaction_features: usize,
}

impl Default for FeatureEngineeringConfig {
    fn default() -> Self {
        Self {
            mode: FeatureMode::default(),
            manual_features: Vec::new(),
            task: TaskType::default(),
            target: None,
            selection_method: SelectionMethod::default(),
            k_features: 20,
            apply_dimensionality_reduction: false,
            n_components: 10,
            polynomial_degree: 2,
            max_polynomial_columns: 10,
            max_interaction_features: 20,
        }
    }
}

impl FeatureEngineeringConfig {
    pub fn builder() -> FeatureEngineeringConfigBuilder {
        FeatureEngineeringConfigBuilder::default()
    }

    /// Parse and validate a JSON mapping.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        check_positive("k_features", self.k_features)?;
        check_positive("n_components", self.n_components)?;
        check_positive("polynomial_degree", self.polynomial_degree)?;

        let mut seen = HashSet::new();
        for feature in &self.manual_features {
            if !seen.insert(feature.name.as_str()) {
                return Err(ConfigValidationError::DuplicateFeatureName(
                    feature.name.clone(),
                ));
            }
        }
        Ok(())
    }
}

/// Builder for [`FeatureEngineeringConfig`].
#[derive(Debug, Default)]
pub struct FeatureEngineeringConfigBuilder {
    config: FeatureEngineeringConfig,
}

impl FeatureEngineeringConfigBuilder {
    pub fn mode(mut self, mode: FeatureMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn manual_feature(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.config
            .manual_features
            .push(ManualFeature::new(name, expression));
        self
    }

    pub fn task(mut self, task: TaskType) -> Self {
        self.config.task = task;
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.config.target = Some(target.into());
        self
    }

    pub fn selection_method(mut self, method: SelectionMethod) -> Self {
        self.config.selection_method = method;
        self
    }

    pub fn k_features(mut self, k: usize) -> Self {
        self.config.k_features = k;
        self
    }

    /// Enable PCA down to `n_components`.
    pub fn reduce_dimensions(mut self, n_components: usize) -> Self {
        self.config.apply_dimensionality_reduction = true;
        self.config.n_components = n_components;
        self
    }

    pub fn polynomial_degree(mut self, degree: usize) -> Self {
        self.config.polynomial_degree = degree;
        self
    }

    pub fn max_interaction_features(mut self, max: usize) -> Self {
        self.config.max_interaction_features = max;
        self
    }

    pub fn build(self) -> Result<FeatureEngineeringConfig, ConfigValidationError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = FeatureEngineeringConfig::default();
        assert_eq!(config.mode, FeatureMode::Both);
        assert_eq!(config.k_features, 20);
        assert_eq!(config.n_components, 10);
        assert_eq!(config.max_interaction_features, 20);
        assert_eq!(config.max_polynomial_columns, 10);
        assert!(!config.apply_dimensionality_reduction);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "mode": "manual",
            "manual_features": [
                {"name": "age_chol_sum", "expression": "age + chol"}
            ],
            "task": "regression",
            "target": "price",
            "selection_method": "rfe",
            "k_features": 5
        }"#;
        let config = FeatureEngineeringConfig::from_json(json).unwrap();
        assert_eq!(config.mode, FeatureMode::Manual);
        assert_eq!(config.task, TaskType::Regression);
        assert_eq!(config.selection_method, SelectionMethod::Rfe);
        assert_eq!(config.manual_features[0].expression, "age + chol");
        assert!(!config.mode.runs_auto());
    }

    #[test]
    fn test_duplicate_feature_names_rejected() {
        let result = FeatureEngineeringConfig::builder()
            .manual_feature("x", "a + b")
            .manual_feature("x", "a - b")
            .build();
        assert_eq!(
            result.unwrap_err(),
            ConfigValidationError::DuplicateFeatureName("x".to_string())
        );
    }

    #[test]
    fn test_zero_k_rejected() {
        let result = FeatureEngineeringConfig::builder().k_features(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::MustBePositive { .. }
        ));
    }
}

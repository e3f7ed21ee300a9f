//! Stage configurations for the preprocessing orchestrator.

use serde::{Deserialize, Serialize};

use super::{
    ConfigValidationError, check_non_negative, check_positive, check_unit_threshold,
};

/// Drop columns whose null ratio exceeds `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DropHighMissing {
    pub threshold: f64,
}

impl Default for DropHighMissing {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

/// Constant used by the `constant` imputation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

impl Default for FillValue {
    fn default() -> Self {
        FillValue::Number(0.0)
    }
}

impl std::fmt::Display for FillValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillValue::Number(n) => write!(f, "{}", n),
            FillValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Interpolation method for the `interpolate` imputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    /// Straight line between the surrounding valid values.
    #[default]
    Linear,
    /// Value of the closer valid neighbour (ties take the earlier one).
    Nearest,
    /// Step function: repeat the previous valid value.
    Zero,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct InterpolateConfig {
    pub columns: Vec<String>,
    pub method: InterpolationMethod,
}

/// Missing-value handling. Each strategy owns its own column list; columns
/// absent from every list are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImputationConfig {
    pub drop_high_missing: Option<DropHighMissing>,
    pub constant: Vec<String>,
    pub fill_value: FillValue,
    pub mean: Vec<String>,
    pub median: Vec<String>,
    pub mode: Vec<String>,
    pub knn: Vec<String>,
    pub n_neighbors: usize,
    pub iterative: Vec<String>,
    pub max_iter: usize,
    pub forward_fill: Vec<String>,
    pub backward_fill: Vec<String>,
    pub interpolate: Option<InterpolateConfig>,
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            drop_high_missing: None,
            constant: Vec::new(),
            fill_value: FillValue::default(),
            mean: Vec::new(),
            median: Vec::new(),
            mode: Vec::new(),
            knn: Vec::new(),
            n_neighbors: 5,
            iterative: Vec::new(),
            max_iter: 10,
            forward_fill: Vec::new(),
            backward_fill: Vec::new(),
            interpolate: None,
        }
    }
}

impl ImputationConfig {
    /// Columns whose fill is learned from their own observed values.
    pub fn learned_columns(&self) -> impl Iterator<Item = &String> {
        self.mean
            .iter()
            .chain(&self.median)
            .chain(&self.mode)
            .chain(&self.knn)
            .chain(&self.iterative)
            .chain(&self.forward_fill)
            .chain(&self.backward_fill)
            .chain(self.interpolate.iter().flat_map(|i| &i.columns))
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let Some(drop) = &self.drop_high_missing {
            check_unit_threshold("imputation.drop_high_missing.threshold", drop.threshold)?;
        }
        check_positive("imputation.n_neighbors", self.n_neighbors)?;
        check_positive("imputation.max_iter", self.max_iter)?;
        Ok(())
    }
}

/// Outlier detection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// |x - mean| / std above the threshold.
    #[default]
    Zscore,
    /// 0.6745 · |x - median| / MAD above the threshold.
    ModifiedZscore,
    /// Outside Q1 - 1.5·IQR .. Q3 + 1.5·IQR.
    Iqr,
    /// Isolation forest, contamination 0.1.
    IsolationForest,
    /// Local outlier factor, 20 neighbours, contamination 0.1.
    Lof,
}

/// What to do with a processed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierAction {
    /// Drop every row flagged in any processed column.
    Remove,
    /// Clip the column to its low/high percentiles.
    #[default]
    Cap,
    /// Replace the column with `ln(1 + x)`.
    TransformLog,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutlierConfig {
    pub method: OutlierMethod,
    pub threshold: f64,
    pub action: OutlierAction,
    /// Explicit columns; `None` means every numeric column.
    pub columns: Option<Vec<String>>,
    pub percentile_low: f64,
    pub percentile_high: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            method: OutlierMethod::default(),
            threshold: 3.0,
            action: OutlierAction::default(),
            columns: None,
            percentile_low: 0.05,
            percentile_high: 0.95,
        }
    }
}

impl OutlierConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        check_non_negative("outlier.threshold", self.threshold)?;
        let (low, high) = (self.percentile_low, self.percentile_high);
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low >= high {
            return Err(ConfigValidationError::InvalidPercentiles { low, high });
        }
        Ok(())
    }
}

/// Rare-category collapsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RareCategoryConfig {
    /// Explicit columns; `None` means every string/categorical column.
    pub columns: Option<Vec<String>>,
    pub threshold: f64,
    pub replacement: String,
}

impl Default for RareCategoryConfig {
    fn default() -> Self {
        Self {
            columns: None,
            threshold: 0.01,
            replacement: "Other".to_string(),
        }
    }
}

/// Skew-correcting transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkewMethod {
    #[default]
    Log,
    Boxcox,
    YeoJohnson,
    Sqrt,
    Reciprocal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkewnessConfig {
    pub method: SkewMethod,
    /// Explicit columns; `None` means every numeric column.
    pub columns: Option<Vec<String>>,
    pub threshold: f64,
}

impl Default for SkewnessConfig {
    fn default() -> Self {
        Self {
            method: SkewMethod::default(),
            columns: None,
            threshold: 0.5,
        }
    }
}

/// Column lists per encoding. Applied in field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    pub onehot: Vec<String>,
    pub ordinal: Vec<String>,
    pub frequency: Vec<String>,
    pub target: Vec<String>,
    pub binary: Vec<String>,
}

/// Column lists per scaler. Applied in field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ScalingConfig {
    pub standard: Vec<String>,
    pub minmax: Vec<String>,
    pub robust: Vec<String>,
    pub maxabs: Vec<String>,
    pub quantile: Vec<String>,
}

/// Resampling method for class balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImbalanceMethod {
    #[default]
    Smote,
    Adasyn,
    BorderlineSmote,
    RandomOversample,
    RandomUndersample,
    SmoteTomek,
    SmoteEnn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassImbalanceConfig {
    pub method: ImbalanceMethod,
    pub k_neighbors: usize,
    pub random_state: u64,
}

impl Default for ClassImbalanceConfig {
    fn default() -> Self {
        Self {
            method: ImbalanceMethod::default(),
            k_neighbors: 5,
            random_state: 42,
        }
    }
}

/// Configuration for the manual preprocessing mode.
///
/// Stages run in a fixed order regardless of field order: imputation,
/// outlier, rare_category, skewness, encoding, scaling, class_imbalance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessingConfig {
    pub imputation: Option<ImputationConfig>,
    pub outlier: Option<OutlierConfig>,
    pub rare_category: Option<RareCategoryConfig>,
    pub skewness: Option<SkewnessConfig>,
    pub encoding: Option<EncodingConfig>,
    pub scaling: Option<ScalingConfig>,
    pub class_imbalance: Option<ClassImbalanceConfig>,
}

impl PreprocessingConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PreprocessingConfigBuilder {
        PreprocessingConfigBuilder::default()
    }

    /// Parse and validate a JSON stage mapping.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let Some(imputation) = &self.imputation {
            imputation.validate()?;
        }
        if let Some(outlier) = &self.outlier {
            outlier.validate()?;
        }
        if let Some(rare) = &self.rare_category {
            check_unit_threshold("rare_category.threshold", rare.threshold)?;
        }
        if let Some(skew) = &self.skewness {
            check_non_negative("skewness.threshold", skew.threshold)?;
        }
        if let Some(imbalance) = &self.class_imbalance {
            check_positive("class_imbalance.k_neighbors", imbalance.k_neighbors)?;
        }
        Ok(())
    }

    /// Whether no stage is configured.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Builder for [`PreprocessingConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PreprocessingConfigBuilder {
    config: PreprocessingConfig,
}

impl PreprocessingConfigBuilder {
    pub fn imputation(mut self, config: ImputationConfig) -> Self {
        self.config.imputation = Some(config);
        self
    }

    pub fn outlier(mut self, config: OutlierConfig) -> Self {
        self.config.outlier = Some(config);
        self
    }

    pub fn rare_category(mut self, config: RareCategoryConfig) -> Self {
        self.config.rare_category = Some(config);
        self
    }

    pub fn skewness(mut self, config: SkewnessConfig) -> Self {
        self.config.skewness = Some(config);
        self
    }

    pub fn encoding(mut self, config: EncodingConfig) -> Self {
        self.config.encoding = Some(config);
        self
    }

    pub fn scaling(mut self, config: ScalingConfig) -> Self {
        self.config.scaling = Some(config);
        self
    }

    pub fn class_imbalance(mut self, config: ClassImbalanceConfig) -> Self {
        self.config.class_imbalance = Some(config);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PreprocessingConfig` or an error if validation fails.
    pub fn build(self) -> Result<PreprocessingConfig, ConfigValidationError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stage_defaults() {
        assert_eq!(DropHighMissing::default().threshold, 0.5);
        assert_eq!(ImputationConfig::default().n_neighbors, 5);
        assert_eq!(ImputationConfig::default().fill_value, FillValue::Number(0.0));

        let outlier = OutlierConfig::default();
        assert_eq!(outlier.method, OutlierMethod::Zscore);
        assert_eq!(outlier.action, OutlierAction::Cap);
        assert_eq!((outlier.percentile_low, outlier.percentile_high), (0.05, 0.95));

        assert_eq!(RareCategoryConfig::default().replacement, "Other");
        assert_eq!(SkewnessConfig::default().threshold, 0.5);
        assert_eq!(ClassImbalanceConfig::default().k_neighbors, 5);
    }

    #[test]
    fn test_empty_builder_has_no_stages() {
        let config = PreprocessingConfig::builder().build().unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_from_json_partial_stages() {
        let json = r#"{
            "imputation": {
                "mean": ["age", "chol"],
                "mode": ["sex"],
                "n_neighbors": 3,
                "fill_value": 0
            },
            "outlier": {"method": "modified_zscore", "action": "remove", "columns": ["age"]},
            "rare_category": {"columns": ["ca"], "threshold": 0.1},
            "skewness": {"method": "yeo_johnson"},
            "class_imbalance": {"method": "smote_tomek", "k_neighbors": 3}
        }"#;

        let config = PreprocessingConfig::from_json(json).unwrap();
        let imputation = config.imputation.unwrap();
        assert_eq!(imputation.mean, vec!["age", "chol"]);
        assert_eq!(imputation.n_neighbors, 3);
        assert!(imputation.knn.is_empty());

        let outlier = config.outlier.unwrap();
        assert_eq!(outlier.method, OutlierMethod::ModifiedZscore);
        assert_eq!(outlier.action, OutlierAction::Remove);
        assert_eq!(outlier.threshold, 3.0);

        assert_eq!(config.rare_category.unwrap().replacement, "Other");
        assert_eq!(config.skewness.unwrap().method, SkewMethod::YeoJohnson);
        assert_eq!(config.class_imbalance.unwrap().method, ImbalanceMethod::SmoteTomek);
        assert!(config.encoding.is_none());
        assert!(config.scaling.is_none());
    }

    #[test]
    fn test_fill_value_text() {
        let config: ImputationConfig =
            serde_json::from_str(r#"{"constant": ["city"], "fill_value": "missing"}"#).unwrap();
        assert_eq!(config.fill_value, FillValue::Text("missing".to_string()));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = PreprocessingConfig::from_json(r#"{"scaling": {"zscore": ["a"]}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_invalid_percentiles() {
        let result = PreprocessingConfig::builder()
            .outlier(OutlierConfig {
                percentile_low: 0.9,
                percentile_high: 0.1,
                ..Default::default()
            })
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidPercentiles { .. }
        ));
    }

    #[test]
    fn test_validation_invalid_threshold() {
        let result = PreprocessingConfig::builder()
            .rare_category(RareCategoryConfig {
                threshold: 1.5,
                ..Default::default()
            })
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_zero_neighbors() {
        let result = PreprocessingConfig::builder()
            .imputation(ImputationConfig {
                n_neighbors: 0,
                ..Default::default()
            })
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::MustBePositive { value: 0, .. }
        ));
    }
}

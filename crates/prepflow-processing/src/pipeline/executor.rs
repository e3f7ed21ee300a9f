//! Preprocessing orchestrator.
//!
//! Runs the configured stages in a fixed order over one table:
//! imputation, outlier handling, rare-category collapsing, skew correction,
//! categorical encoding, feature scaling, then class-balance resampling.
//! Resampling only runs for classification with a target column.

use std::collections::BTreeMap;
use std::time::Instant;

use polars::prelude::*;
use prepflow_learning::TaskType;
use tracing::{debug, info, warn};

use crate::cleaner::{AUTO_CLEAN_NOTE, AutoCleaner};
use crate::config::PreprocessingConfig;
use crate::error::{PreprocessingError, Result};
use crate::pipeline::{
    CategoricalEncoder, ClassImbalanceHandler, FeatureScaler, MissingValueHandler,
    OutlierHandler, RareCategoryHandler, SkewnessHandler,
};
use crate::types::{DatasetDiagnostics, PreprocessingOutcome};
use crate::utils::{column_strings, require_column, value_counts};

/// Sequences the preprocessing stages and keeps each fitted stage.
///
/// Use [`DataPreprocessor::builder()`] to pick the mode.
///
/// # Example
///
/// ```rust,ignore
/// use prepflow_processing::{DataPreprocessor, PreprocessingConfig, TaskType};
///
/// let mut preprocessor = DataPreprocessor::builder()
///     .config(PreprocessingConfig::from_json(json)?)
///     .task(TaskType::Classification)
///     .build()?;
///
/// let outcome = preprocessor.preprocess(df, Some("target"))?;
/// println!("{:?} -> {:?}", outcome.before.shape, outcome.after.shape);
///
/// // Replay the fitted stages on held-out data
/// let scaled = preprocessor.scaler().map(|s| s.transform(&test_df)).transpose()?;
/// ```
#[derive(Debug)]
pub struct DataPreprocessor {
    config: Option<PreprocessingConfig>,
    task: TaskType,
    auto_clean: bool,
    missing: Option<MissingValueHandler>,
    outlier: Option<OutlierHandler>,
    rare: Option<RareCategoryHandler>,
    skewness: Option<SkewnessHandler>,
    encoder: Option<CategoricalEncoder>,
    scaler: Option<FeatureScaler>,
}

static_assertions::assert_impl_all!(DataPreprocessor: Send);

impl DataPreprocessor {
    pub fn builder() -> DataPreprocessorBuilder {
        DataPreprocessorBuilder::default()
    }

    pub fn task(&self) -> TaskType {
        self.task
    }

    pub fn missing_handler(&self) -> Option<&MissingValueHandler> {
        self.missing.as_ref()
    }

    pub fn outlier_handler(&self) -> Option<&OutlierHandler> {
        self.outlier.as_ref()
    }

    pub fn rare_handler(&self) -> Option<&RareCategoryHandler> {
        self.rare.as_ref()
    }

    pub fn skewness_handler(&self) -> Option<&SkewnessHandler> {
        self.skewness.as_ref()
    }

    pub fn encoder(&self) -> Option<&CategoricalEncoder> {
        self.encoder.as_ref()
    }

    pub fn scaler(&self) -> Option<&FeatureScaler> {
        self.scaler.as_ref()
    }

    /// Run the pipeline.
    ///
    /// `target` must name a column when given. It is used for target
    /// encoding and class-balance resampling, and it stays in the output.
    pub fn preprocess(
        &mut self,
        df: DataFrame,
        target: Option<&str>,
    ) -> Result<PreprocessingOutcome> {
        let start = Instant::now();
        info!("Starting preprocessing ({} rows, {} columns)...", df.height(), df.width());

        if let Some(target) = target {
            require_column(&df, target)?;
        }
        let before = DatasetDiagnostics::compute(&df)?;
        let mut processing_steps = Vec::new();

        let data = if self.auto_clean {
            let cleaned = AutoCleaner.clean(df)?;
            processing_steps.push(AUTO_CLEAN_NOTE.to_string());
            cleaned
        } else {
            let config = self.config.clone().ok_or_else(|| {
                PreprocessingError::InvalidConfig(
                    "config must be provided for manual preprocessing".to_string(),
                )
            })?;
            self.run_stages(df, &config, target, &mut processing_steps)?
        };

        let after = DatasetDiagnostics::compute(&data)?;
        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            "Preprocessing completed in {:.3}s ({} rows, {} columns)",
            elapsed_secs,
            data.height(),
            data.width()
        );

        Ok(PreprocessingOutcome {
            data,
            before,
            after,
            processing_steps,
            elapsed_secs,
            target: target.map(str::to_string),
        })
    }

    fn run_stages(
        &mut self,
        df: DataFrame,
        config: &PreprocessingConfig,
        target: Option<&str>,
        steps: &mut Vec<String>,
    ) -> Result<DataFrame> {
        let mut df = df;

        if let Some(stage) = &config.imputation {
            info!("Step 1: Imputing missing values...");
            let mut handler = MissingValueHandler::new(stage.clone());
            df = handler.fit_transform(df, steps)?;
            self.missing = Some(handler);
        }

        if let Some(stage) = &config.outlier {
            info!("Step 2: Handling outliers...");
            let mut handler = OutlierHandler::new(stage.clone());
            df = handler.fit_transform(df, steps)?;
            self.outlier = Some(handler);
        }

        if let Some(stage) = &config.rare_category {
            info!("Step 3: Collapsing rare categories...");
            let mut handler = RareCategoryHandler::new(stage.clone());
            df = handler.fit_transform(df, steps)?;
            self.rare = Some(handler);
        }

        if let Some(stage) = &config.skewness {
            info!("Step 4: Correcting skewness...");
            let mut handler = SkewnessHandler::new(stage.clone());
            df = handler.fit_transform(df, steps)?;
            self.skewness = Some(handler);
        }

        if let Some(stage) = &config.encoding {
            info!("Step 5: Encoding categorical columns...");
            let mut handler = CategoricalEncoder::new(stage.clone());
            df = handler.fit_transform(df, target, steps)?;
            self.encoder = Some(handler);
        }

        if let Some(stage) = &config.scaling {
            info!("Step 6: Scaling features...");
            let mut handler = FeatureScaler::new(stage.clone());
            df = handler.fit_transform(df, steps)?;
            self.scaler = Some(handler);
        }

        if let Some(stage) = &config.class_imbalance {
            match target {
                Some(target) if self.task == TaskType::Classification => {
                    info!("Step 7: Resampling classes...");
                    df = resample(df, target, ClassImbalanceHandler::new(stage.clone()), steps)?;
                }
                Some(_) => debug!("Skipping resampling for {:?} task", self.task),
                None => warn!("Skipping resampling: no target column"),
            }
        }

        Ok(df)
    }
}

fn resample(
    df: DataFrame,
    target: &str,
    handler: ClassImbalanceHandler,
    steps: &mut Vec<String>,
) -> Result<DataFrame> {
    // Stages may have dropped or renamed the target.
    require_column(&df, target)?;
    let y = df.column(target)?.as_materialized_series().clone();
    let before = class_counts(&df, target)?;
    let features = df.drop(target)?;

    let (features, y) = handler.fit_resample(&features, &y)?;
    let mut df = features;
    df.with_column(y)?;

    steps.push(format!(
        "Resampled '{}' classes {} -> {}",
        target,
        before,
        class_counts(&df, target)?
    ));
    Ok(df)
}

/// `{a: 3, b: 1}` in label order.
fn class_counts(df: &DataFrame, target: &str) -> Result<String> {
    let counts: BTreeMap<String, usize> =
        value_counts(&column_strings(df, target)?)?.into_iter().collect();
    let parts: Vec<String> = counts.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
    Ok(format!("{{{}}}", parts.join(", ")))
}

/// Builder for [`DataPreprocessor`].
#[derive(Debug, Default)]
pub struct DataPreprocessorBuilder {
    config: Option<PreprocessingConfig>,
    task: Option<TaskType>,
    auto_clean: bool,
}

impl DataPreprocessorBuilder {
    /// Stage configuration for manual mode.
    pub fn config(mut self, config: PreprocessingConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Task type; resampling only runs for classification. Defaults to regression.
    pub fn task(mut self, task: TaskType) -> Self {
        self.task = Some(task);
        self
    }

    /// Use the generic cleaner instead of the configured stages.
    pub fn auto_clean(mut self, enabled: bool) -> Self {
        self.auto_clean = enabled;
        self
    }

    /// Build the preprocessor.
    ///
    /// Manual mode without a configuration is an error.
    pub fn build(self) -> Result<DataPreprocessor> {
        if !self.auto_clean {
            match &self.config {
                None => {
                    return Err(PreprocessingError::InvalidConfig(
                        "config must be provided for manual preprocessing".to_string(),
                    ));
                }
                Some(config) => config.validate()?,
            }
        }

        Ok(DataPreprocessor {
            config: self.config,
            task: self.task.unwrap_or(TaskType::Regression),
            auto_clean: self.auto_clean,
            missing: None,
            outlier: None,
            rare: None,
            skewness: None,
            encoder: None,
            scaler: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_names;
    use crate::config::{
        ClassImbalanceConfig, DropHighMissing, ImbalanceMethod, ImputationConfig, ScalingConfig,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_manual_mode_requires_config() {
        let err = DataPreprocessor::builder().build().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(DataPreprocessor::builder().auto_clean(true).build().is_ok());
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let mut preprocessor = DataPreprocessor::builder()
            .config(PreprocessingConfig::default())
            .build()
            .unwrap();
        let df = df!["a" => [1.0, 2.0]].unwrap();
        let err = preprocessor.preprocess(df, Some("label")).unwrap_err();
        assert!(matches!(err, PreprocessingError::ColumnNotFound(c) if c == "label"));
    }

    #[test]
    fn test_stages_run_and_keep_fitted_state() {
        let config = PreprocessingConfig::builder()
            .imputation(ImputationConfig {
                drop_high_missing: Some(DropHighMissing { threshold: 0.4 }),
                mean: vec!["b".into()],
                ..Default::default()
            })
            .scaling(ScalingConfig {
                standard: vec!["b".into()],
                ..Default::default()
            })
            .build()
            .unwrap();
        let df = df![
            "a" => [None, Some(1.0), None, Some(2.0)],
            "b" => [Some(1.0), None, Some(3.0), Some(5.0)],
        ]
        .unwrap();

        let mut preprocessor = DataPreprocessor::builder().config(config).build().unwrap();
        let outcome = preprocessor.preprocess(df, None).unwrap();

        assert_eq!(outcome.before.shape, (4, 2));
        assert_eq!(outcome.after.shape, (4, 1));
        assert_eq!(outcome.after.missing_values, 0);
        assert!(preprocessor.missing_handler().is_some());
        assert_eq!(preprocessor.scaler().unwrap().fitted().len(), 1);
        assert!(preprocessor.encoder().is_none());
        assert_eq!(
            outcome.processing_steps[0],
            "Dropped 1 column(s) with > 40% missing values: [a]"
        );
    }

    #[test]
    fn test_resampling_only_for_classification() {
        let df = df![
            "x" => [0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 5.0, 5.1],
            "label" => ["n", "n", "n", "n", "n", "n", "y", "y"],
        ]
        .unwrap();
        let config = PreprocessingConfig::builder()
            .class_imbalance(ClassImbalanceConfig {
                method: ImbalanceMethod::RandomOversample,
                ..Default::default()
            })
            .build()
            .unwrap();

        let mut regression = DataPreprocessor::builder().config(config.clone()).build().unwrap();
        let outcome = regression.preprocess(df.clone(), Some("label")).unwrap();
        assert_eq!(outcome.data.height(), 8);

        let mut classification = DataPreprocessor::builder()
            .config(config)
            .task(TaskType::Classification)
            .build()
            .unwrap();
        let outcome = classification.preprocess(df, Some("label")).unwrap();
        assert_eq!(outcome.data.height(), 12);
        assert_eq!(column_names(&outcome.data), vec!["x", "label"]);
        assert_eq!(
            outcome.processing_steps,
            vec!["Resampled 'label' classes {n: 6, y: 2} -> {n: 6, y: 6}".to_string()]
        );
    }

    #[test]
    fn test_auto_clean_single_note() {
        let df = df!["a" => [1i64, 1, 2], "b" => ["x", "x", "y"]].unwrap();
        let mut preprocessor = DataPreprocessor::builder().auto_clean(true).build().unwrap();
        let outcome = preprocessor.preprocess(df, None).unwrap();
        assert_eq!(outcome.processing_steps, vec![AUTO_CLEAN_NOTE.to_string()]);
        assert_eq!(outcome.before.duplicate_rows, 1);
        assert_eq!(outcome.after.duplicate_rows, 0);
    }
}

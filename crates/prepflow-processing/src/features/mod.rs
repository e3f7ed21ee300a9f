//! Feature engineering orchestrator.
//!
//! Expands the feature space (automatic and manual generators), applies
//! automatic transforms, zeroes out missing and non-finite values, then
//! contracts it again (selection, optional PCA) when a target is declared.
//! The provenance of every column is recorded along the way, and the output
//! frame gets a diagnostics pass (ranges, target correlations, outliers).

mod auto;
mod diagnostics;
pub mod expr;
mod manual;
mod reducer;
mod selector;
mod transformer;

pub use auto::{AutoFeatureGenerator, GeneratedColumns};
pub use diagnostics::diagnose;
pub use expr::Expr;
pub use manual::ManualFeatureGenerator;
pub use reducer::DimensionalityReducer;
pub use selector::FeatureSelector;
pub use transformer::{FeatureTransform, FeatureTransformer, replace_non_finite};

use polars::prelude::*;
use tracing::{info, warn};

use crate::config::FeatureEngineeringConfig;
use crate::error::Result;
use crate::types::{FeatureEngineeringOutcome, FeatureProvenance};
use crate::utils::{bracket_list, column_names, has_column, require_column};

/// Runs the feature pipeline under one configuration.
///
/// # Example
///
/// ```rust,ignore
/// use prepflow_processing::{FeatureEngineer, FeatureEngineeringConfig, TaskType};
///
/// let config = FeatureEngineeringConfig::builder()
///     .manual_feature("age_chol_sum", "age + chol")
///     .task(TaskType::Classification)
///     .target("target")
///     .k_features(15)
///     .build()?;
///
/// let outcome = FeatureEngineer::new(config).run(df)?;
/// println!("selected: {:?}", outcome.provenance.final_selected);
/// ```
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    config: FeatureEngineeringConfig,
}

static_assertions::assert_impl_all!(FeatureEngineer: Send, Sync);

impl FeatureEngineer {
    pub fn new(config: FeatureEngineeringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureEngineeringConfig {
        &self.config
    }

    pub fn run(&self, df: DataFrame) -> Result<FeatureEngineeringOutcome> {
        let config = &self.config;
        let target = config.target.as_deref();
        if let Some(target) = target {
            require_column(&df, target)?;
        }
        info!("Starting feature engineering ({} columns)...", df.width());
        let input_shape = df.shape();

        let mut provenance = FeatureProvenance {
            original: column_names(&df),
            ..Default::default()
        };
        let mut steps = Vec::new();
        let mut df = df;

        // 1. Automatic generators
        if config.mode.runs_auto() {
            let generator = AutoFeatureGenerator::new(
                config.polynomial_degree,
                config.max_polynomial_columns,
                config.max_interaction_features,
            );
            let mut added = Vec::new();
            for (name, values) in generator.generate(&df, target)? {
                if has_column(&df, &name) {
                    warn!("Skipping generated feature '{}': column already exists", name);
                    continue;
                }
                df.with_column(Series::new(name.as_str().into(), values))?;
                added.push(name);
            }
            steps.push(format!("Generated {} automatic feature(s)", added.len()));
            provenance.auto = added;
        }

        // 2. Manual expressions
        if config.mode.runs_manual() && !config.manual_features.is_empty() {
            let generator = ManualFeatureGenerator::new(config.manual_features.clone());
            let (out, created, failed) = generator.create_features(df)?;
            df = out;
            for (name, reason) in &failed {
                steps.push(format!("Skipped manual feature '{}': {}", name, reason));
            }
            steps.push(format!(
                "Created {} manual feature(s): {}",
                created.len(),
                bracket_list(&created)
            ));
            provenance.manual = created;
        }

        // 3. Skew/variance transforms
        let mut transformer = FeatureTransformer::new();
        df = transformer.apply(df, target)?;
        if !transformer.applied().is_empty() {
            let names: Vec<String> =
                transformer.applied().iter().map(|(n, _)| n.clone()).collect();
            steps.push(format!("Added transformed feature(s): {}", bracket_list(&names)));
        }

        // 4. Missing and non-finite values
        let (cleaned, replaced) = replace_non_finite(df)?;
        df = cleaned;
        if replaced > 0 {
            steps.push(format!("Replaced {} missing or non-finite value(s) with 0", replaced));
        }

        // 5-6. Selection and reduction need a target
        if let Some(target) = target {
            let selector =
                FeatureSelector::new(config.selection_method, config.k_features, config.task);
            let (selected_df, selected) = selector.select(&df, target)?;
            steps.push(format!(
                "Selected {} feature(s) by {:?}: {}",
                selected.len(),
                config.selection_method,
                bracket_list(&selected)
            ));
            provenance.final_selected = selected;
            df = selected_df;

            if config.apply_dimensionality_reduction {
                let before = df.width() - 1;
                let mut reducer = DimensionalityReducer::new(config.n_components);
                df = reducer.reduce(df, Some(target))?;
                if df.width() - 1 != before {
                    steps.push(format!(
                        "Reduced {} feature(s) to {} principal component(s)",
                        before,
                        df.width() - 1
                    ));
                }
            }
        }

        let diagnostics = diagnose(&df, input_shape, target)?;
        info!("Feature engineering completed ({} columns)", df.width());
        Ok(FeatureEngineeringOutcome {
            data: df,
            provenance,
            diagnostics,
            processing_steps: steps,
        })
    }
}

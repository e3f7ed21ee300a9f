//! Ingestion: load or merge raw files, then audit them.
//!
//! ```rust,ignore
//! use prepflow_processing::ingestion::{DataIngestion, IngestionSource};
//!
//! let outcome = DataIngestion::process(
//!     &IngestionSource::file("data/heart.csv"),
//!     Some(&schema),
//!     "Heart Disease Dataset",
//! )?;
//! println!("{} issues", outcome.report.issues.len());
//! ```

mod loader;

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use loader::{DataLoader, FileType, JoinHow, LoadOptions, MergeSpec, NamedDataset};

use crate::error::{Result, ResultExt};
use crate::quality::{DataQualityChecker, SchemaValidator};
use crate::schema::DataSchema;
use crate::types::IngestionOutcome;

/// Where the input table comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionSource {
    File {
        path: PathBuf,
        #[serde(default)]
        options: LoadOptions,
    },
    Merge {
        spec: MergeSpec,
        #[serde(default)]
        options: LoadOptions,
    },
}

impl IngestionSource {
    /// A single file read with default options.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        IngestionSource::File {
            path: path.into(),
            options: LoadOptions::default(),
        }
    }
}

pub struct DataIngestion;

impl DataIngestion {
    /// Load the source, validate it against `schema` and run the quality checks.
    ///
    /// Schema column mismatches come first in the report's issue list.
    pub fn process(
        source: &IngestionSource,
        schema: Option<&DataSchema>,
        name: &str,
    ) -> Result<IngestionOutcome> {
        let start = Instant::now();
        info!("Ingesting dataset '{}'", name);

        let df = match source {
            IngestionSource::File { path, options } => DataLoader::load(path, options)?,
            IngestionSource::Merge { spec, options } => DataLoader::merge(spec, options)?,
        };
        info!(
            "Loaded {} rows and {} columns",
            df.height(),
            df.width()
        );

        let mut issues = match schema {
            Some(schema) => {
                schema.validate()?;
                let issues = SchemaValidator::validate(&df, schema);
                if !issues.is_empty() {
                    warn!("Found {} schema validation issue(s)", issues.len());
                }
                issues
            }
            None => Vec::new(),
        };

        let mut report = DataQualityChecker::new(&df, schema)
            .check()
            .context(format!("Quality check failed for '{}'", name))?;
        issues.append(&mut report.issues);
        report.issues = issues;
        report.runtime_secs = Some(start.elapsed().as_secs_f64());

        info!(
            "Ingestion of '{}' completed in {:.2}s",
            name,
            start.elapsed().as_secs_f64()
        );
        Ok(IngestionOutcome { data: df, report })
    }
}

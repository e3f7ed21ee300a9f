use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

// ============================================================================
// Quality Report Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

/// One structured finding from the audit pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub category: String,
    pub column: Option<String>,
    pub message: String,
    pub count: Option<usize>,
    pub percentage: Option<f64>,
}

impl QualityIssue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        column: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            column: column.map(str::to_string),
            message: message.into(),
            count: None,
            percentage: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_percentage(mut self, percentage: f64) -> Self {
        self.percentage = Some(percentage);
        self
    }
}

/// `describe()`-style statistics for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub column: String,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    pub column: String,
    pub unique_count: usize,
    pub most_common: Option<String>,
}

/// Summary statistics bundle attached to a quality report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SummaryStats {
    pub shape: (usize, usize),
    pub columns: Vec<String>,
    pub dtypes: Vec<(String, String)>,
    pub describe: Vec<ColumnDescription>,
    pub nunique: Vec<(String, usize)>,
    pub memory_usage_bytes: usize,
    pub numeric_summary: Vec<NumericSummary>,
    /// Text columns plus numeric columns with fewer than 20 distinct values.
    pub categorical_summary: Vec<CategoricalSummary>,
}

/// Output of the quality checker. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_rows: usize,
    pub total_columns: usize,
    pub issues: Vec<QualityIssue>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub summary_stats: SummaryStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_secs: Option<f64>,
}

impl QualityReport {
    pub fn issues_with(&self, severity: Severity) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    pub fn has_errors(&self) -> bool {
        self.issues_with(Severity::Error).next().is_some()
    }
}

/// Loaded table plus its audit.
#[derive(Debug, Clone)]
pub struct IngestionOutcome {
    pub data: DataFrame,
    pub report: QualityReport,
}

// ============================================================================
// Preprocessing Types
// ============================================================================

/// Diagnostic snapshot taken before and after preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDiagnostics {
    pub shape: (usize, usize),
    pub missing_values: usize,
    pub duplicate_rows: usize,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    /// Columns with at most one distinct non-null value.
    pub constant_columns: Vec<String>,
    /// Numeric columns with a value beyond mean ± 3·std.
    pub outlier_columns: Vec<String>,
    /// Numeric column pairs with |correlation| > 0.9, first column earlier in frame order.
    pub correlated_pairs: Vec<(String, String)>,
}

/// Result of one preprocessing run.
#[derive(Debug, Clone)]
pub struct PreprocessingOutcome {
    pub data: DataFrame,
    pub before: DatasetDiagnostics,
    pub after: DatasetDiagnostics,
    pub processing_steps: Vec<String>,
    pub elapsed_secs: f64,
    pub target: Option<String>,
}

// ============================================================================
// Feature Engineering Types
// ============================================================================

/// Which pipeline phase each column came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FeatureProvenance {
    pub original: Vec<String>,
    pub auto: Vec<String>,
    pub manual: Vec<String>,
    /// Columns kept by feature selection; empty when no target was declared.
    pub final_selected: Vec<String>,
}

/// Range statistics of one numeric output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub column: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

/// Checks run over the engineered frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeatureDiagnostics {
    /// `(rows, columns)` of the frame handed to the pipeline.
    pub input_shape: (usize, usize),
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub ranges: Vec<FeatureRange>,
    /// Absolute Pearson correlation with the target, strongest first.
    pub target_correlations: Vec<(String, f64)>,
    /// Values more than three standard deviations from their column mean.
    pub outliers: Vec<(String, usize)>,
}

#[derive(Debug, Clone)]
pub struct FeatureEngineeringOutcome {
    pub data: DataFrame,
    pub provenance: FeatureProvenance,
    pub diagnostics: FeatureDiagnostics,
    pub processing_steps: Vec<String>,
}

use polars::prelude::DataFrame;

use crate::schema::DataSchema;
use crate::types::{QualityIssue, Severity};
use crate::utils::{column_names, has_column};

/// Compares the declared column set with the loaded one.
pub struct SchemaValidator;

impl SchemaValidator {
    /// Missing declared columns are errors, undeclared columns are warnings.
    ///
    /// Missing columns are listed in schema order, unexpected ones in frame order.
    pub fn validate(df: &DataFrame, schema: &DataSchema) -> Vec<QualityIssue> {
        let mut issues = Vec::new();

        for column in &schema.columns {
            if !has_column(df, &column.name) {
                issues.push(QualityIssue::new(
                    Severity::Error,
                    "Schema",
                    Some(&column.name),
                    format!("Required column '{}' is missing from dataset", column.name),
                ));
            }
        }

        for name in column_names(df) {
            if schema.column(&name).is_none() {
                issues.push(QualityIssue::new(
                    Severity::Warning,
                    "Schema",
                    Some(&name),
                    format!("Unexpected column '{}' found in dataset", name),
                ));
            }
        }

        issues
    }
}

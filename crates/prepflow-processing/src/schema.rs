//! Declarative column contracts used by ingestion and the quality checker.
//!
//! A schema never mutates data. It only drives validation: dtype family,
//! nullability, uniqueness, numeric bounds, allowed values and regex.

use polars::prelude::DataType;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PreprocessingError, Result};

/// Contract for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSchema {
    pub name: String,
    /// Type family (`int`, `float`, `string`, `datetime`, `bool`) or a raw
    /// dtype name compared against the column's dtype display string.
    pub dtype: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub allowed_values: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub regex_pattern: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, dtype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: dtype.into(),
            nullable: true,
            unique: false,
            min_value: None,
            max_value: None,
            allowed_values: None,
            regex_pattern: None,
            description: None,
        }
    }

    pub fn non_nullable(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn min(mut self, value: f64) -> Self {
        self.min_value = Some(value);
        self
    }

    pub fn max(mut self, value: f64) -> Self {
        self.max_value = Some(value);
        self
    }

    pub fn allowed<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn pattern(mut self, regex: impl Into<String>) -> Self {
        self.regex_pattern = Some(regex.into());
        self
    }

    /// Whether `actual` belongs to the declared type family.
    pub fn matches_dtype(&self, actual: &DataType) -> bool {
        match self.dtype.as_str() {
            "int" => matches!(
                actual,
                DataType::Int8
                    | DataType::Int16
                    | DataType::Int32
                    | DataType::Int64
                    | DataType::UInt8
                    | DataType::UInt16
                    | DataType::UInt32
                    | DataType::UInt64
            ),
            "float" => matches!(actual, DataType::Float32 | DataType::Float64),
            "string" => matches!(actual, DataType::String | DataType::Categorical(_, _)),
            "datetime" => matches!(actual, DataType::Datetime(_, _) | DataType::Date),
            "bool" => matches!(actual, DataType::Boolean),
            other => actual.to_string() == other,
        }
    }

    /// Compile the regex constraint, anchored at the start of the value.
    pub fn compiled_pattern(&self) -> Result<Option<Regex>> {
        self.regex_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
                    PreprocessingError::InvalidSchema(format!(
                        "column '{}': invalid regex '{}': {}",
                        self.name, pattern, e
                    ))
                })
            })
            .transpose()
    }

    /// Allowed values normalized to the string keys used for comparison.
    pub fn allowed_keys(&self) -> Option<Vec<String>> {
        self.allowed_values
            .as_ref()
            .map(|values| values.iter().map(value_key).collect())
    }
}

/// Normalize a JSON value so that `1`, `1.0` and a column value of 1 compare equal.
pub(crate) fn value_key(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(|f| f.to_string())
            .unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

/// Schema for a whole dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DataSchema {
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub target_column: Option<String>,
}

impl DataSchema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Self {
            columns,
            target_column: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = Some(target.into());
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Fail fast on constraints that cannot be evaluated.
    pub fn validate(&self) -> Result<()> {
        for column in &self.columns {
            column.compiled_pattern()?;
            if let (Some(min), Some(max)) = (column.min_value, column.max_value)
                && min > max
            {
                return Err(PreprocessingError::InvalidSchema(format!(
                    "column '{}': min_value {} exceeds max_value {}",
                    column.name, min, max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_families() {
        let col = ColumnSchema::new("age", "int");
        assert!(col.matches_dtype(&DataType::Int64));
        assert!(col.matches_dtype(&DataType::Int32));
        assert!(!col.matches_dtype(&DataType::Float64));

        let col = ColumnSchema::new("price", "float");
        assert!(col.matches_dtype(&DataType::Float32));
        assert!(!col.matches_dtype(&DataType::String));

        assert!(ColumnSchema::new("s", "string").matches_dtype(&DataType::String));
        assert!(ColumnSchema::new("b", "bool").matches_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_pattern_is_anchored_at_start() {
        let col = ColumnSchema::new("code", "string").pattern(r"[A-Z]{2}\d+");
        let regex = col.compiled_pattern().unwrap().unwrap();
        assert!(regex.is_match("AB12"));
        assert!(regex.is_match("AB12-extra"));
        assert!(!regex.is_match("xAB12"));
    }

    #[test]
    fn test_invalid_regex_is_schema_error() {
        let schema = DataSchema::new(vec![ColumnSchema::new("code", "string").pattern("([a-z")]);
        let err = schema.validate().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SCHEMA");
    }

    #[test]
    fn test_allowed_keys_normalize_numbers() {
        let col = ColumnSchema::new("flag", "int").allowed([0, 1]);
        assert_eq!(col.allowed_keys(), Some(vec!["0".to_string(), "1".to_string()]));
    }

    #[test]
    fn test_schema_from_json() {
        let json = r#"{
            "columns": [
                {"name": "age", "dtype": "int", "min_value": 0},
                {"name": "target", "dtype": "int", "nullable": false, "allowed_values": [0, 1]}
            ],
            "target_column": "target"
        }"#;
        let schema: DataSchema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.target_column.as_deref(), Some("target"));
        assert!(schema.column("age").unwrap().nullable);
        assert!(!schema.column("target").unwrap().nullable);
    }
}

//! File-type dispatch and dataset merging.

use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PreprocessingError, Result};
use crate::utils::has_column;

/// Input format, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Csv,
    Tsv,
    Json,
    Excel,
    Parquet,
    Sql,
}

impl FileType {
    /// Detect by extension (case-insensitive). Unknown extensions are CSV.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("tsv") => FileType::Tsv,
            Some("json") => FileType::Json,
            Some("xlsx") | Some("xls") => FileType::Excel,
            Some("parquet") => FileType::Parquet,
            Some("db") | Some("sqlite") => FileType::Sql,
            _ => FileType::Csv,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Tsv => "tsv",
            FileType::Json => "json",
            FileType::Excel => "excel",
            FileType::Parquet => "parquet",
            FileType::Sql => "sql",
        }
    }
}

/// Reader settings for delimited files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadOptions {
    /// Field separator; TSV files always use a tab.
    pub separator: char,
    pub has_header: bool,
    pub infer_schema_length: usize,
    /// Strings read as null in every column.
    pub null_values: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            separator: ',',
            has_header: true,
            infer_schema_length: 100,
            null_values: Vec::new(),
        }
    }
}

/// Join type for merging datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JoinHow {
    #[default]
    Left,
    Inner,
    Right,
    Outer,
}

impl From<JoinHow> for JoinType {
    fn from(how: JoinHow) -> Self {
        match how {
            JoinHow::Left => JoinType::Left,
            JoinHow::Inner => JoinType::Inner,
            JoinHow::Right => JoinType::Right,
            JoinHow::Outer => JoinType::Full,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedDataset {
    pub name: String,
    pub path: PathBuf,
}

/// Several files joined into one table, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeSpec {
    pub datasets: Vec<NamedDataset>,
    pub on: Vec<String>,
    #[serde(default)]
    pub how: JoinHow,
}

/// Loads tables from disk.
pub struct DataLoader;

impl DataLoader {
    /// Load one file, dispatching on its extension.
    pub fn load(path: impl AsRef<Path>, options: &LoadOptions) -> Result<DataFrame> {
        let path = path.as_ref();
        let file_type = FileType::from_path(path);
        debug!("Loading {} as {}", path.display(), file_type.as_str());

        match file_type {
            FileType::Csv => Self::load_delimited(path, options, options.separator),
            FileType::Tsv => Self::load_delimited(path, options, '\t'),
            FileType::Json => {
                let file = File::open(path).map_err(|e| PreprocessingError::load_failed(path, e))?;
                JsonReader::new(file)
                    .finish()
                    .map_err(|e| PreprocessingError::load_failed(path, e))
            }
            FileType::Parquet => {
                let file = File::open(path).map_err(|e| PreprocessingError::load_failed(path, e))?;
                ParquetReader::new(file)
                    .finish()
                    .map_err(|e| PreprocessingError::load_failed(path, e))
            }
            FileType::Excel | FileType::Sql => Err(PreprocessingError::UnsupportedFileType(
                file_type.as_str().to_string(),
            )),
        }
    }

    fn load_delimited(path: &Path, options: &LoadOptions, separator: char) -> Result<DataFrame> {
        if !path.exists() {
            return Err(PreprocessingError::load_failed(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }
        let separator = u8::try_from(separator).map_err(|_| {
            PreprocessingError::InvalidConfig(format!(
                "separator '{}' is not a single-byte character",
                separator
            ))
        })?;

        let null_values = (!options.null_values.is_empty()).then(|| {
            NullValues::AllColumns(
                options
                    .null_values
                    .iter()
                    .map(|s| PlSmallStr::from(s.as_str()))
                    .collect(),
            )
        });

        CsvReadOptions::default()
            .with_has_header(options.has_header)
            .with_infer_schema_length(Some(options.infer_schema_length))
            .map_parse_options(|parse| {
                parse
                    .with_separator(separator)
                    .with_null_values(null_values.clone())
            })
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| PreprocessingError::load_failed(path, e))
    }

    /// Load every dataset and left-fold the joins on the key columns.
    pub fn merge(spec: &MergeSpec, options: &LoadOptions) -> Result<DataFrame> {
        if spec.datasets.is_empty() {
            return Err(PreprocessingError::InvalidConfig(
                "merge requires at least one dataset".to_string(),
            ));
        }
        if spec.datasets.len() > 1 && spec.on.is_empty() {
            return Err(PreprocessingError::InvalidConfig(
                "merge requires at least one join key".to_string(),
            ));
        }

        let keys: Vec<Expr> = spec.on.iter().map(|c| col(c.as_str())).collect();
        let mut merged: Option<DataFrame> = None;

        for dataset in &spec.datasets {
            let df = Self::load(&dataset.path, options)?;
            info!(
                "Loaded dataset '{}': {} rows, {} columns",
                dataset.name,
                df.height(),
                df.width()
            );

            merged = Some(match merged {
                None => df,
                Some(left) => {
                    for key in &spec.on {
                        if !has_column(&left, key) || !has_column(&df, key) {
                            return Err(PreprocessingError::ColumnNotFound(key.clone()));
                        }
                    }
                    let args = JoinArgs::new(spec.how.into())
                        .with_coalesce(JoinCoalesce::CoalesceColumns);
                    let joined = left
                        .lazy()
                        .join(df.lazy(), keys.clone(), keys.clone(), args)
                        .collect()?;
                    info!(
                        "Merged dataset '{}': shape ({}, {})",
                        dataset.name,
                        joined.height(),
                        joined.width()
                    );
                    joined
                }
            });
        }

        merged.ok_or_else(|| PreprocessingError::InvalidConfig("nothing to merge".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_path("a/b.CSV"), FileType::Csv);
        assert_eq!(FileType::from_path("x.tsv"), FileType::Tsv);
        assert_eq!(FileType::from_path("x.json"), FileType::Json);
        assert_eq!(FileType::from_path("x.xlsx"), FileType::Excel);
        assert_eq!(FileType::from_path("x.xls"), FileType::Excel);
        assert_eq!(FileType::from_path("x.parquet"), FileType::Parquet);
        assert_eq!(FileType::from_path("x.sqlite"), FileType::Sql);
        assert_eq!(FileType::from_path("x.txt"), FileType::Csv);
        assert_eq!(FileType::from_path("no_extension"), FileType::Csv);
    }

    #[test]
    fn test_load_csv_and_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_file(dir.path(), "a.csv", "x,y\n1,a\n2,b\n");
        let tsv = write_file(dir.path(), "a.tsv", "x\ty\n1\ta\n2\tb\n");

        let options = LoadOptions::default();
        let from_csv = DataLoader::load(&csv, &options).unwrap();
        let from_tsv = DataLoader::load(&tsv, &options).unwrap();
        assert_eq!(from_csv.shape(), (2, 2));
        assert_eq!(from_tsv.shape(), (2, 2));
    }

    #[test]
    fn test_null_values_option() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_file(dir.path(), "n.csv", "x,y\n1,NA\n2,b\n");
        let options = LoadOptions {
            null_values: vec!["NA".to_string()],
            ..Default::default()
        };
        let df = DataLoader::load(&csv, &options).unwrap();
        assert_eq!(df.column("y").unwrap().null_count(), 1);
    }

    #[test]
    fn test_missing_file_is_load_failure() {
        let err = DataLoader::load("/definitely/not/here.csv", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, PreprocessingError::LoadFailed { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_excel_unsupported() {
        let err = DataLoader::load("book.xlsx", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, PreprocessingError::UnsupportedFileType(_)));
    }

    #[test]
    fn test_merge_left_join() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.csv", "id,x\n1,10\n2,20\n3,30\n");
        let b = write_file(dir.path(), "b.csv", "id,y\n1,a\n3,c\n");

        let spec = MergeSpec {
            datasets: vec![
                NamedDataset { name: "a".into(), path: a },
                NamedDataset { name: "b".into(), path: b },
            ],
            on: vec!["id".to_string()],
            how: JoinHow::Left,
        };
        let merged = DataLoader::merge(&spec, &LoadOptions::default()).unwrap();
        assert_eq!(merged.shape(), (3, 3));
        assert_eq!(merged.column("y").unwrap().null_count(), 1);
    }

    #[test]
    fn test_merge_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.csv", "id,x\n1,10\n");
        let b = write_file(dir.path(), "b.csv", "key,y\n1,a\n");

        let spec = MergeSpec {
            datasets: vec![
                NamedDataset { name: "a".into(), path: a },
                NamedDataset { name: "b".into(), path: b },
            ],
            on: vec!["id".to_string()],
            how: JoinHow::Inner,
        };
        let err = DataLoader::merge(&spec, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, PreprocessingError::ColumnNotFound(_)));
    }
}

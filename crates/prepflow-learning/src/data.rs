//! DataFrame to matrix conversion and the train/test split.

use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::TaskType;
use crate::error::{LearningError, Result};

/// Feature matrix and target vector extracted from a DataFrame.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Row-major feature matrix.
    pub x: Array2<f64>,
    /// Target values. For classification these are class indices.
    pub y: Array1<f64>,
    /// Feature column names, in matrix column order.
    pub feature_names: Vec<String>,
    /// Class labels in index order (classification only).
    pub classes: Option<Vec<String>>,
}

impl Dataset {
    /// Split `df` into features and the `target` column.
    ///
    /// Every non-target column must be numeric (or boolean) and null-free.
    /// Classification targets of any dtype are mapped to class indices by
    /// the sorted string form of each label.
    pub fn from_frame(df: &DataFrame, target: &str, task: TaskType) -> Result<Self> {
        let target_col = df
            .column(target)
            .map_err(|_| LearningError::TargetNotFound(target.to_string()))?;

        if target_col.null_count() > 0 {
            return Err(LearningError::InvalidData(format!(
                "target column '{target}' contains {} null value(s)",
                target_col.null_count()
            )));
        }

        let feature_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != target)
            .map(|name| name.to_string())
            .collect();

        if feature_names.is_empty() {
            return Err(LearningError::InvalidData(
                "no feature columns besides the target".to_string(),
            ));
        }

        let x = columns_to_array2(df, &feature_names)?;

        let (y, classes) = match task {
            TaskType::Classification => {
                let (y, classes) = encode_labels(target_col.as_materialized_series())?;
                (y, Some(classes))
            }
            _ => (column_to_f64(target_col.as_materialized_series())?, None),
        };

        Ok(Self {
            x,
            y,
            feature_names,
            classes,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }
}

/// Held-out split of a [`Dataset`].
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Shuffle rows with a seeded RNG and hold out `ceil(test_size · n)` of them.
pub fn train_test_split(data: &Dataset, test_size: f64, seed: u64) -> Result<TrainTestSplit> {
    let n = data.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(LearningError::InvalidData(format!(
            "cannot split {n} row(s) with test_size={test_size}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut rng);
    let (test_idx, train_idx) = order.split_at(n_test);

    Ok(TrainTestSplit {
        x_train: data.x.select(Axis(0), train_idx),
        x_test: data.x.select(Axis(0), test_idx),
        y_train: data.y.select(Axis(0), train_idx),
        y_test: data.y.select(Axis(0), test_idx),
    })
}

/// Extract named numeric columns into a row-major matrix.
pub fn columns_to_array2(df: &DataFrame, names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let data: Vec<Array1<f64>> = names
        .iter()
        .map(|name| {
            let column = df
                .column(name)
                .map_err(|_| LearningError::InvalidData(format!("column '{name}' not found")))?;
            let series = column.as_materialized_series();
            if !is_numeric_like(series.dtype()) {
                return Err(LearningError::InvalidData(format!(
                    "feature column '{name}' is not numeric ({})",
                    series.dtype()
                )));
            }
            if series.null_count() > 0 {
                return Err(LearningError::InvalidData(format!(
                    "feature column '{name}' contains {} null value(s)",
                    series.null_count()
                )));
            }
            column_to_f64(series)
        })
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, names.len()), |(r, c)| {
        data[c][r]
    }))
}

fn column_to_f64(series: &Series) -> Result<Array1<f64>> {
    let cast = series.cast(&DataType::Float64)?;
    let values = cast.f64()?;
    values
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                LearningError::InvalidData(format!(
                    "column '{}' could not be converted to numbers",
                    series.name()
                ))
            })
        })
        .collect()
}

fn encode_labels(series: &Series) -> Result<(Array1<f64>, Vec<String>)> {
    let as_str = series.cast(&DataType::String)?;
    let labels: Vec<String> = as_str
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect();

    let mut classes = labels.clone();
    classes.sort();
    classes.dedup();

    let y = labels
        .iter()
        .map(|label| classes.binary_search(label).map(|i| i as f64).unwrap_or(0.0))
        .collect();
    Ok((y, classes))
}

fn is_numeric_like(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Boolean
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame() -> DataFrame {
        df![
            "a" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "b" => [10i64, 20, 30, 40, 50],
            "label" => ["yes", "no", "yes", "no", "maybe"],
        ]
        .unwrap()
    }

    #[test]
    fn test_from_frame_classification() {
        let data = Dataset::from_frame(&frame(), "label", TaskType::Classification).unwrap();
        assert_eq!(data.feature_names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            data.classes.unwrap(),
            vec!["maybe".to_string(), "no".to_string(), "yes".to_string()]
        );
        assert_eq!(data.y.to_vec(), vec![2.0, 1.0, 2.0, 1.0, 0.0]);
        assert_eq!(data.x[[1, 1]], 20.0);
    }

    #[test]
    fn test_missing_target() {
        let err = Dataset::from_frame(&frame(), "nope", TaskType::Regression).unwrap_err();
        assert!(matches!(err, LearningError::TargetNotFound(_)));
    }

    #[test]
    fn test_non_numeric_feature_rejected() {
        let df = df!["s" => ["x", "y"], "t" => [1.0, 2.0]].unwrap();
        let err = Dataset::from_frame(&df, "t", TaskType::Regression).unwrap_err();
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn test_null_feature_rejected() {
        let df = df!["f" => [Some(1.0), None], "t" => [1.0, 2.0]].unwrap();
        let err = Dataset::from_frame(&df, "t", TaskType::Regression).unwrap_err();
        assert!(err.to_string().contains("null"));
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let df = df![
            "x" => (0..10).map(f64::from).collect::<Vec<_>>(),
            "y" => (0..10).map(|v| f64::from(v) * 2.0).collect::<Vec<_>>(),
        ]
        .unwrap();
        let data = Dataset::from_frame(&df, "y", TaskType::Regression).unwrap();

        let a = train_test_split(&data, 0.2, 42).unwrap();
        let b = train_test_split(&data, 0.2, 42).unwrap();
        assert_eq!(a.x_test.nrows(), 2);
        assert_eq!(a.x_train.nrows(), 8);
        assert_eq!(a.y_test, b.y_test);

        // Every row lands in exactly one side
        let mut all: Vec<f64> = a.x_train.column(0).iter().chain(a.x_test.column(0)).copied().collect();
        all.sort_by(f64::total_cmp);
        assert_eq!(all, (0..10).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_too_small() {
        let df = df!["x" => [1.0], "y" => [1.0]].unwrap();
        let data = Dataset::from_frame(&df, "y", TaskType::Regression).unwrap();
        assert!(train_test_split(&data, 0.2, 42).is_err());
    }
}

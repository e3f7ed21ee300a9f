use anyhow::Result;
use chrono::Local;
use prepflow_learning::ModelResult;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::{
    DatasetDiagnostics, FeatureEngineeringOutcome, PreprocessingOutcome, QualityReport, Severity,
};
use crate::utils::format_thousands;

/// Width of title and section lines.
const LINE_WIDTH: usize = 80;

pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
        }
    }
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Text rendering of an ingestion quality report.
    pub fn render_quality(&self, report: &QualityReport, dataset_name: &str) -> String {
        let mut output = Vec::new();
        output.push(banner(
            &format!("  Data Ingestion & Quality Report : {} ", dataset_name),
            '=',
        ));
        output.push(format!("\n\nGenerated on: {}", timestamp()));
        output.push(format!("Total Rows: {}", format_thousands(report.total_rows)));
        output.push(format!("Total Columns: {}", report.total_columns));
        if let Some(runtime) = report.runtime_secs {
            output.push(format!("Runtime: {}", format_runtime(runtime)));
        }
        output.push(String::new());

        if !report.issues.is_empty() {
            for severity in [Severity::Error, Severity::Warning, Severity::Info] {
                let mut issues = report.issues_with(severity).peekable();
                if issues.peek().is_none() {
                    continue;
                }
                output.push(format!("\n{}S:", severity.as_str()));
                for issue in issues {
                    let column = issue
                        .column
                        .as_ref()
                        .map(|c| format!(" (Column: {})", c))
                        .unwrap_or_default();
                    let count = issue
                        .count
                        .filter(|n| *n > 0)
                        .map(|n| format!(" - {} occurrences", n))
                        .unwrap_or_default();
                    output.push(format!("  • {}{}{}", issue.message, column, count));
                }
            }
            output.push("\n".to_string());
        }

        output.push(banner("✅ DATA PROS", '-'));
        push_list(&mut output, &report.pros, "No positive aspects identified");
        output.push("\n".to_string());

        output.push(banner("❌ DATA CONS", '-'));
        push_list(&mut output, &report.cons, "No negative aspects identified");
        output.push("\n".to_string());

        let stats = &report.summary_stats;
        output.push(banner("📊 SUMMARY STATISTICS", '-'));
        output.push(format!("\nShape: ({}, {})", stats.shape.0, stats.shape.1));
        output.push(format!(
            "Memory Usage: {:.2} MB",
            stats.memory_usage_bytes as f64 / (1024.0 * 1024.0)
        ));

        let dtypes: Vec<Vec<String>> = stats
            .dtypes
            .iter()
            .map(|(c, d)| vec![c.clone(), d.clone()])
            .collect();
        output.push(format!("\nData Types:\n{}", table(&["", "dtype"], &dtypes)));

        if !stats.describe.is_empty() {
            let rows: Vec<Vec<String>> = stats
                .describe
                .iter()
                .map(|d| {
                    vec![
                        d.column.clone(),
                        d.count.to_string(),
                        fmt_opt(d.mean),
                        fmt_opt(d.std),
                        fmt_opt(d.min),
                        fmt_opt(d.q25),
                        fmt_opt(d.q50),
                        fmt_opt(d.q75),
                        fmt_opt(d.max),
                    ]
                })
                .collect();
            output.push(format!(
                "\nDescriptive Statistics:\n{}",
                table(
                    &["", "count", "mean", "std", "min", "25%", "50%", "75%", "max"],
                    &rows
                )
            ));
        }

        let nunique: Vec<Vec<String>> = stats
            .nunique
            .iter()
            .map(|(c, n)| vec![c.clone(), n.to_string()])
            .collect();
        output.push(format!(
            "\nUnique Values per Column:\n{}",
            table(&["", "Unique Values"], &nunique)
        ));

        if !stats.numeric_summary.is_empty() {
            let rows: Vec<Vec<String>> = stats
                .numeric_summary
                .iter()
                .map(|s| {
                    vec![
                        s.column.clone(),
                        fmt_opt(s.mean),
                        fmt_opt(s.std),
                        fmt_opt(s.min),
                        fmt_opt(s.max),
                    ]
                })
                .collect();
            output.push(format!(
                "\nNumeric Columns Summary:\n{}",
                table(&["", "mean", "std", "min", "max"], &rows)
            ));
        }

        if !stats.categorical_summary.is_empty() {
            let rows: Vec<Vec<String>> = stats
                .categorical_summary
                .iter()
                .map(|s| {
                    vec![
                        s.column.clone(),
                        s.unique_count.to_string(),
                        s.most_common.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            output.push(format!(
                "\nCategorical Columns Summary:\n{}",
                table(&["", "unique_count", "most_common"], &rows)
            ));
        }

        output.push(String::new());
        output.join("\n")
    }

    /// Before/after diagnostics and the narrative of a preprocessing run.
    pub fn render_preprocessing(&self, outcome: &PreprocessingOutcome) -> String {
        let mut output = Vec::new();
        output.push(banner("  Preprocessing Report ", '='));
        output.push(format!("\nGenerated on: {}", timestamp()));
        output.push(format!("Runtime: {}", format_runtime(outcome.elapsed_secs)));
        if let Some(target) = &outcome.target {
            output.push(format!("Target Column: {}", target));
        }
        output.push(String::new());

        output.push(banner("🔍 DIAGNOSTICS", '-'));
        output.push(diagnostics_table(&outcome.before, &outcome.after));
        output.push(String::new());

        output.push(banner("🛠 PROCESSING STEPS", '-'));
        push_numbered(&mut output, &outcome.processing_steps, "No processing steps applied");
        output.push(String::new());
        output.join("\n")
    }

    /// Provenance sets of a feature engineering run.
    pub fn render_features(&self, outcome: &FeatureEngineeringOutcome) -> String {
        let provenance = &outcome.provenance;
        let mut output = Vec::new();
        output.push(banner("  Feature Engineering Report ", '='));
        output.push(format!("\nGenerated on: {}", timestamp()));
        output.push(format!(
            "Output Shape: ({}, {})",
            outcome.data.height(),
            outcome.data.width()
        ));
        output.push(String::new());

        let sets = [
            ("Original", &provenance.original),
            ("Auto-generated", &provenance.auto),
            ("Manual", &provenance.manual),
            ("Selected", &provenance.final_selected),
        ];
        let rows: Vec<Vec<String>> = sets
            .iter()
            .map(|(label, columns)| {
                vec![
                    label.to_string(),
                    columns.len().to_string(),
                    preview(columns, 8),
                ]
            })
            .collect();
        output.push(banner("🧬 FEATURE PROVENANCE", '-'));
        output.push(table(&["Set", "Count", "Columns"], &rows));
        output.push(String::new());

        let diagnostics = &outcome.diagnostics;
        output.push(banner("🔎 FEATURE DIAGNOSTICS", '-'));
        output.push(format!(
            "Input Shape: ({}, {})",
            diagnostics.input_shape.0, diagnostics.input_shape.1
        ));
        output.push(format!(
            "Numeric features ({}): {}",
            diagnostics.numeric.len(),
            preview(&diagnostics.numeric, 8)
        ));
        output.push(format!(
            "Categorical features ({}): {}",
            diagnostics.categorical.len(),
            preview(&diagnostics.categorical, 8)
        ));
        output.push(String::new());

        if !diagnostics.ranges.is_empty() {
            let rows: Vec<Vec<String>> = diagnostics
                .ranges
                .iter()
                .zip(&diagnostics.outliers)
                .map(|(range, (_, outliers))| {
                    vec![
                        range.column.clone(),
                        fmt_opt(range.min),
                        fmt_opt(range.max),
                        fmt_opt(range.mean),
                        fmt_opt(range.std),
                        outliers.to_string(),
                    ]
                })
                .collect();
            output.push(table(
                &["Feature", "Min", "Max", "Mean", "Std", "|z| > 3"],
                &rows,
            ));
            output.push(String::new());
        }

        output.push("Top features correlated with target:".to_string());
        let correlations: Vec<String> = diagnostics
            .target_correlations
            .iter()
            .map(|(name, r)| format!("{}: {:.4}", name, r))
            .collect();
        push_list(&mut output, &correlations, "Target column not available");
        output.push(String::new());

        output.push(banner("🛠 PROCESSING STEPS", '-'));
        push_numbered(&mut output, &outcome.processing_steps, "No processing steps applied");
        output.push(String::new());
        output.join("\n")
    }

    /// Metrics table of a model sweep.
    pub fn render_sweep(&self, results: &[ModelResult], best: Option<&str>) -> String {
        let mut output = Vec::new();
        output.push(banner("  Model Sweep Report ", '='));
        output.push(format!("\nGenerated on: {}", timestamp()));
        output.push(format!("Models Evaluated: {}", results.len()));
        output.push(String::new());

        if let Some(first) = results.first() {
            let metric_names: Vec<&str> = first.metrics.entries().iter().map(|(n, _)| *n).collect();
            let custom_names: Vec<&str> = first
                .custom_metrics
                .iter()
                .map(|(n, _)| n.as_str())
                .collect();

            let mut headers = vec!["Model"];
            headers.extend(&metric_names);
            headers.extend(&custom_names);
            headers.push("Training Time (s)");

            let rows: Vec<Vec<String>> = results
                .iter()
                .map(|result| {
                    let mut row = vec![result.model.clone()];
                    row.extend(result.metrics.entries().iter().map(|(_, v)| format!("{:.4}", v)));
                    row.extend(custom_names.iter().map(|name| {
                        result
                            .custom_metric(name)
                            .map(|v| format!("{:.4}", v))
                            .unwrap_or_else(|| "None".to_string())
                    }));
                    row.push(format!("{:.3}", result.training_time_secs));
                    row
                })
                .collect();
            output.push(table(&headers, &rows));
        } else {
            output.push("  No models completed".to_string());
        }

        output.push(String::new());
        match best {
            Some(name) => output.push(format!("Best Model: {}", name)),
            None => output.push("Best Model: none eligible".to_string()),
        }
        output.push(String::new());
        output.join("\n")
    }

    /// Write a text report, creating the output directory if needed.
    pub fn save_text(&self, content: &str, file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(file_name);
        fs::write(&path, content)?;
        info!("Report saved: {}", path.display());
        Ok(path)
    }

    /// Write any serializable report as pretty JSON.
    pub fn save_json<T: Serialize>(&self, value: &T, file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(file_name);
        fs::write(&path, serde_json::to_string_pretty(value)?)?;
        info!("Report saved: {}", path.display());
        Ok(path)
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `75.5` -> `"1 min 15.50 sec"`.
pub(crate) fn format_runtime(secs: f64) -> String {
    let minutes = (secs / 60.0).floor();
    format!("{} min {:.2} sec", minutes as u64, secs - minutes * 60.0)
}

/// `title` centered in a line of `fill`, or a plain rule when empty.
pub(crate) fn banner(title: &str, fill: char) -> String {
    let len = title.chars().count();
    if len >= LINE_WIDTH {
        return title.to_string();
    }
    let pad = LINE_WIDTH - len;
    let left = pad / 2;
    let right = pad - left;
    format!(
        "{}{}{}",
        fill.to_string().repeat(left),
        title,
        fill.to_string().repeat(right)
    )
}

fn push_list(output: &mut Vec<String>, items: &[String], empty: &str) {
    if items.is_empty() {
        output.push(format!("  {}", empty));
    } else {
        output.extend(items.iter().map(|item| format!("  {}", item)));
    }
}

fn push_numbered(output: &mut Vec<String>, items: &[String], empty: &str) {
    if items.is_empty() {
        output.push(format!("  {}", empty));
    } else {
        output.extend(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| format!("  {}. {}", i + 1, item)),
        );
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_default()
}

fn preview(columns: &[String], limit: usize) -> String {
    if columns.len() <= limit {
        columns.join(", ")
    } else {
        format!(
            "{}, ... (+{} more)",
            columns[..limit].join(", "),
            columns.len() - limit
        )
    }
}

fn diagnostics_table(before: &DatasetDiagnostics, after: &DatasetDiagnostics) -> String {
    let describe = |d: &DatasetDiagnostics| -> Vec<String> {
        vec![
            format!("({}, {})", d.shape.0, d.shape.1),
            d.missing_values.to_string(),
            d.duplicate_rows.to_string(),
            d.numeric_columns.len().to_string(),
            d.categorical_columns.len().to_string(),
            preview(&d.constant_columns, 5),
            preview(&d.outlier_columns, 5),
            d.correlated_pairs.len().to_string(),
        ]
    };
    let labels = [
        "Shape",
        "Missing values",
        "Duplicate rows",
        "Numeric columns",
        "Categorical columns",
        "Constant columns",
        "Outlier columns",
        "Correlated pairs (|r| > 0.9)",
    ];

    let rows: Vec<Vec<String>> = labels
        .iter()
        .zip(describe(before).into_iter().zip(describe(after)))
        .map(|(label, (b, a))| vec![label.to_string(), b, a])
        .collect();
    table(&["Metric", "Before", "After"], &rows)
}

/// Box-drawn grid table.
pub(crate) fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let rule = |left: &str, mid: &str, right: &str, fill: &str| -> String {
        let segments: Vec<String> = widths.iter().map(|w| fill.repeat(w + 2)).collect();
        format!("{}{}{}", left, segments.join(mid), right)
    };
    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cell = cells.get(i).copied().unwrap_or("");
                let pad = w - cell.chars().count();
                format!(" {}{} ", cell, " ".repeat(pad))
            })
            .collect();
        format!("│{}│", padded.join("│"))
    };

    let mut out = vec![
        rule("╒", "╤", "╕", "═"),
        line(headers.to_vec()),
        rule("╞", "╪", "╡", "═"),
    ];
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push(rule("├", "┼", "┤", "─"));
        }
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.push(rule("╘", "╧", "╛", "═"));
    out.join("\n")
}

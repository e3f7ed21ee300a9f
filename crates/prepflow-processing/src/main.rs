//! CLI entry point for the data preparation pipeline.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use polars::prelude::*;
use prepflow_processing::{
    DataIngestion, DataLoader, DataPreprocessor, DataSchema, FeatureEngineer,
    FeatureEngineeringConfig, IngestionSource, ModelSelector, ModelSweep, PreprocessingConfig,
    ReportGenerator, SweepConfig, TaskType,
};
use tracing::{error, info, warn};

/// CLI-compatible task type enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTask {
    /// Discrete class labels
    Classification,
    /// Continuous numeric target
    Regression,
    /// Unsupervised grouping (no sweep registry)
    Clustering,
}

impl From<CliTask> for TaskType {
    fn from(cli: CliTask) -> Self {
        match cli {
            CliTask::Classification => TaskType::Classification,
            CliTask::Regression => TaskType::Regression,
            CliTask::Clustering => TaskType::Clustering,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Tabular data preparation pipeline",
    long_about = "Ingest, audit, preprocess and engineer features for tabular ML datasets, \
                  then sweep candidate models.\n\n\
                  EXAMPLES:\n  \
                  # Quality report for a CSV file\n  \
                  prepflow ingest -i heart.csv\n\n  \
                  # Configured preprocessing with class resampling\n  \
                  prepflow preprocess -i heart.csv -c stages.json --target target --task classification\n\n  \
                  # One-shot cleaning\n  \
                  prepflow preprocess -i heart.csv --auto-clean\n\n  \
                  # Model sweep\n  \
                  prepflow sweep -i processed.csv --target target --task classification"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a dataset and write its quality report
    Ingest(IngestArgs),
    /// Run the preprocessing stages over a dataset
    Preprocess(PreprocessArgs),
    /// Generate, transform and select features
    Features(FeaturesArgs),
    /// Train every registered model and rank them
    Sweep(SweepArgs),
}

#[derive(Args, Debug)]
struct IoArgs {
    /// Path to the input file (csv, tsv, json or parquet)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for results
    #[arg(short, long, default_value = "./outputs")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct IngestArgs {
    #[command(flatten)]
    io: IoArgs,

    /// JSON schema describing the expected columns
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Dataset name used in the report title
    ///
    /// Defaults to the input file stem
    #[arg(long)]
    name: Option<String>,

    /// Print the report as JSON to stdout instead of saving text
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct PreprocessArgs {
    #[command(flatten)]
    io: IoArgs,

    /// JSON stage configuration
    #[arg(short, long, conflicts_with = "auto_clean")]
    config: Option<PathBuf>,

    /// One-shot cleaning instead of configured stages
    #[arg(long)]
    auto_clean: bool,

    /// Target column, kept out of the feature stages
    #[arg(short, long)]
    target: Option<String>,

    /// Task type; resampling only runs for classification
    #[arg(long, value_enum, default_value = "regression")]
    task: CliTask,
}

#[derive(Args, Debug)]
struct FeaturesArgs {
    #[command(flatten)]
    io: IoArgs,

    /// JSON feature engineering configuration
    ///
    /// Defaults to automatic and manual generation with no target
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SweepArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Target column
    #[arg(short, long)]
    target: String,

    #[arg(long, value_enum)]
    task: CliTask,

    /// Fraction of rows held out for scoring
    #[arg(long, default_value = "0.2")]
    test_size: f64,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// Number of models listed as top candidates
    #[arg(long, default_value = "3")]
    top_k: usize,

    /// Stop launching models after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Train models one at a time
    #[arg(long)]
    sequential: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet);

    let result = match cli.command {
        Command::Ingest(args) => run_ingest(args),
        Command::Preprocess(args) => run_preprocess(args),
        Command::Features(args) => run_features(args),
        Command::Sweep(args) => run_sweep(args),
    };
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn run_ingest(args: IngestArgs) -> Result<()> {
    ensure_input(&args.io.input)?;
    let schema = match &args.schema {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read schema {}", path.display()))?;
            Some(serde_json::from_str::<DataSchema>(&raw).context("Invalid schema JSON")?)
        }
        None => None,
    };
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| file_stem(&args.io.input));

    let outcome = DataIngestion::process(
        &IngestionSource::file(&args.io.input),
        schema.as_ref(),
        &name,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
        return Ok(());
    }

    let stem = file_stem(&args.io.input);
    let generator = ReportGenerator::new(&args.io.output);
    let text = generator.render_quality(&outcome.report, &name);
    generator.save_text(&text, &format!("{}_quality_report.txt", stem))?;
    generator.save_json(&outcome.report, &format!("{}_quality_report.json", stem))?;
    println!("{}", text);
    Ok(())
}

fn run_preprocess(args: PreprocessArgs) -> Result<()> {
    let df = load_input(&args.io.input)?;

    let mut builder = DataPreprocessor::builder()
        .task(args.task.into())
        .auto_clean(args.auto_clean);
    if let Some(path) = &args.config {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        builder = builder.config(PreprocessingConfig::from_json(&raw)?);
    }
    let mut preprocessor = builder.build()?;
    let mut outcome = preprocessor.preprocess(df, args.target.as_deref())?;

    let stem = file_stem(&args.io.input);
    write_csv(&mut outcome.data, &args.io.output, &format!("{}_preprocessed.csv", stem))?;

    let generator = ReportGenerator::new(&args.io.output);
    let text = generator.render_preprocessing(&outcome);
    generator.save_text(&text, &format!("{}_preprocessing_report.txt", stem))?;
    println!("{}", text);
    Ok(())
}

fn run_features(args: FeaturesArgs) -> Result<()> {
    let df = load_input(&args.io.input)?;
    let config = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            FeatureEngineeringConfig::from_json(&raw)?
        }
        None => FeatureEngineeringConfig::default(),
    };
    if config.target.is_none() {
        warn!("No target configured; feature selection and PCA are skipped");
    }

    let mut outcome = FeatureEngineer::new(config).run(df)?;

    let stem = file_stem(&args.io.input);
    write_csv(&mut outcome.data, &args.io.output, &format!("{}_features.csv", stem))?;

    let generator = ReportGenerator::new(&args.io.output);
    let text = generator.render_features(&outcome);
    generator.save_text(&text, &format!("{}_features_report.txt", stem))?;
    generator.save_json(&outcome.provenance, &format!("{}_provenance.json", stem))?;
    generator.save_json(
        &outcome.diagnostics,
        &format!("{}_feature_diagnostics.json", stem),
    )?;
    println!("{}", text);
    Ok(())
}

fn run_sweep(args: SweepArgs) -> Result<()> {
    let df = load_input(&args.io.input)?;
    let task: TaskType = args.task.into();

    let mut builder = SweepConfig::builder()
        .test_size(args.test_size)
        .random_seed(args.seed)
        .top_k(args.top_k)
        .parallel(!args.sequential);
    if let Some(secs) = args.timeout_secs {
        builder = builder.deadline(Duration::from_secs(secs));
    }
    let config = builder.build()?;

    let report = ModelSweep::new(task, config)?.run(&df, &args.target)?;
    for (model, reason) in report.failures() {
        warn!("Model '{}' failed: {}", model, reason);
    }

    let results = report.results();
    let selector = ModelSelector::new(task);
    let best = match selector.select_best(&results) {
        Ok(name) => Some(name),
        Err(e) => {
            warn!("No model selected: {}", e);
            None
        }
    };
    if let Ok(top) = selector.top_k(&results, args.top_k) {
        info!("Top {} model(s): {}", top.len(), top.join(", "));
    }

    let stem = file_stem(&args.io.input);
    let generator = ReportGenerator::new(&args.io.output);
    let text = generator.render_sweep(&results, best.as_deref());
    generator.save_text(&text, &format!("{}_sweep_report.txt", stem))?;
    generator.save_json(&results, &format!("{}_sweep_results.json", stem))?;
    println!("{}", text);
    Ok(())
}

fn ensure_input(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(anyhow!("Input file not found: {}", path.display()));
    }
    Ok(())
}

/// Load the input through the ingestion loader, skipping the quality audit.
fn load_input(path: &Path) -> Result<DataFrame> {
    ensure_input(path)?;
    info!("Loading dataset from: {}", path.display());
    let df = DataLoader::load(path, &Default::default())?;
    info!("Dataset loaded successfully: {:?}", df.shape());
    Ok(df)
}

fn write_csv(df: &mut DataFrame, dir: &Path, file_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    let mut file =
        File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    info!("Dataset written to: {}", path.display());
    Ok(path)
}

/// Extract the file stem (name without extension) from a path.
fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

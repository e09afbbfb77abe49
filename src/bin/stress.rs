//! Stress CLI - Command-line interface for Synheart Stress
//!
//! Commands:
//! - train: Fit a model on a physiology export and write model + metrics
//! - predict: Predict, warn, and explain every row of an export
//! - inspect: Show the normalized schema of an export
//! - doctor: Diagnose data, model, and configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use synheart_stress::artifact::{ModelArtifact, MODEL_FILE};
use synheart_stress::pipeline::{inspect, StressProcessor};
use synheart_stress::report::{self, ReportRow};
use synheart_stress::{train, Config, StressError, PRODUCER_NAME, STRESS_VERSION};

/// Stress - Personal-baseline stress detection with early warnings
#[derive(Parser)]
#[command(name = "stress")]
#[command(author = "Synheart AI Inc")]
#[command(version = STRESS_VERSION)]
#[command(about = "Classify stress from physiology exports", long_about = None)]
struct Cli {
    /// Configuration file (JSON); flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model on a physiology feature export
    Train {
        /// Path to the export (defaults to the configured data path)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output folder for models/ and reports/
        #[arg(short, long, default_value = "outputs")]
        out: PathBuf,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Number of trees in the forest
        #[arg(long)]
        estimators: Option<usize>,
    },

    /// Predict stress, early warnings, and reasons per row
    Predict {
        /// Model artifact path
        #[arg(short, long, default_value = "outputs/models/stress_model.json")]
        model: PathBuf,

        /// Path to the export (defaults to the configured data path)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Consecutive stressed rows before warning
        #[arg(long, allow_hyphen_values = true)]
        threshold: Option<i64>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "outputs/reports/predictions.csv")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Show the normalized schema of an export
    Inspect {
        /// Path to the export (defaults to the configured data path)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose data, model, and configuration
    Doctor {
        /// Model artifact to check
        #[arg(short, long, default_value = "outputs/models/stress_model.json")]
        model: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated with header
    Csv,
    /// Newline-delimited JSON (one row per line)
    Ndjson,
    /// Pretty-printed JSON array
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = CliError::from(e);
            eprintln!(
                "{}",
                serde_json::to_string(&error).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), StressCliError> {
    let config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Train {
            data,
            out,
            seed,
            estimators,
        } => cmd_train(config, data, &out, seed, estimators),

        Commands::Predict {
            model,
            data,
            threshold,
            output,
            format,
        } => cmd_predict(config, &model, data, threshold, &output, format),

        Commands::Inspect { data, json } => cmd_inspect(config, data, json),

        Commands::Doctor { model, json } => cmd_doctor(config, cli.config.as_deref(), &model, json),
    }
}

fn cmd_train(
    mut config: Config,
    data: Option<PathBuf>,
    out: &Path,
    seed: Option<u64>,
    estimators: Option<usize>,
) -> Result<(), StressCliError> {
    if let Some(data) = data {
        config.data_path = data;
    }
    if let Some(seed) = seed {
        config.random_state = seed;
    }
    if let Some(estimators) = estimators {
        config.n_estimators = estimators;
    }

    let report = train(&config, out)?;

    println!("Training complete. Accuracy={:.3}", report.metrics.accuracy);
    println!("Saved model: {}", report.model_path.display());
    println!("Saved metrics: {}", report.metrics_path.display());
    Ok(())
}

fn cmd_predict(
    config: Config,
    model: &Path,
    data: Option<PathBuf>,
    threshold: Option<i64>,
    output: &Path,
    format: OutputFormat,
) -> Result<(), StressCliError> {
    let data_path = data.unwrap_or_else(|| config.data_path.clone());
    let processor = StressProcessor::from_path(model, config)?;
    let rows = processor.predict_path(&data_path, threshold)?;

    if rows.is_empty() {
        return Err(StressCliError::NoRows);
    }

    let output_data = format_output(&rows, &format)?;

    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout();
        write!(stdout, "{}", output_data)?;
        stdout.flush()?;
    } else {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(output, output_data)?;
        print_preview(&rows);
        println!("\nSaved: {}", output.display());
    }

    Ok(())
}

fn cmd_inspect(config: Config, data: Option<PathBuf>, json: bool) -> Result<(), StressCliError> {
    let data_path = data.unwrap_or_else(|| config.data_path.clone());
    let summary = inspect(&config, &data_path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Schema: {}", data_path.display());
        println!("==================");
        println!("Rows:          {}", summary.rows);
        println!(
            "Participants:  {} ({} with baseline)",
            summary.participants, summary.participants_with_baseline
        );
        println!("Neutral rows:  {}", summary.neutral_rows);
        println!("Columns:       {}", summary.columns.join(", "));
        println!("Base features: {}", summary.base_features.join(", "));
    }

    Ok(())
}

fn cmd_doctor(
    config: Config,
    config_path: Option<&Path>,
    model: &Path,
    json: bool,
) -> Result<(), StressCliError> {
    let mut checks = Vec::new();

    checks.push(match config.validate() {
        Ok(()) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: match config_path {
                Some(path) => format!("Loaded {}", path.display()),
                None => "Using defaults".to_string(),
            },
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    checks.push(if config.data_path.exists() {
        match inspect(&config, &config.data_path) {
            Ok(summary) => DoctorCheck {
                name: "data".to_string(),
                status: if summary.participants_with_baseline == 0 {
                    CheckStatus::Warning
                } else {
                    CheckStatus::Ok
                },
                message: format!(
                    "{} rows, {} participants, {} with baseline",
                    summary.rows, summary.participants, summary.participants_with_baseline
                ),
            },
            Err(e) => DoctorCheck {
                name: "data".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        }
    } else {
        DoctorCheck {
            name: "data".to_string(),
            status: CheckStatus::Warning,
            message: format!("Data file does not exist: {}", config.data_path.display()),
        }
    });

    checks.push(if model.exists() {
        match ModelArtifact::load(model) {
            Ok(artifact) => DoctorCheck {
                name: "model".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Trained on '{}', {} features, accuracy {:.3}",
                    artifact.metadata.trained_on,
                    artifact.metadata.feature_cols.len(),
                    artifact.metadata.accuracy
                ),
            },
            Err(e) => DoctorCheck {
                name: "model".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read model: {}", e),
            },
        }
    } else {
        DoctorCheck {
            name: "model".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "No model at {} (run 'stress train', default {})",
                model.display(),
                MODEL_FILE
            ),
        }
    });

    let stdout_check = if atty::is(atty::Stream::Stdout) {
        DoctorCheck {
            name: "stdout".to_string(),
            status: CheckStatus::Ok,
            message: "stdout is a TTY (use --output - to pipe reports)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdout".to_string(),
            status: CheckStatus::Ok,
            message: "stdout is a pipe (reports can stream with --output -)".to_string(),
        }
    };
    checks.push(stdout_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: STRESS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Stress Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(StressCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn format_output(rows: &[ReportRow], format: &OutputFormat) -> Result<String, StressCliError> {
    let out = match format {
        OutputFormat::Csv => report::to_csv(rows)?,
        OutputFormat::Ndjson => report::to_ndjson(rows)?,
        OutputFormat::Json => report::to_json(rows)?,
    };
    Ok(out)
}

fn print_preview(rows: &[ReportRow]) {
    println!("{:>5}  {:<10} {:<8} reasons", "index", "prediction", "warning");
    for row in rows.iter().take(10) {
        println!(
            "{:>5}  {:<10} {:<8} {}",
            row.index,
            row.prediction.as_str(),
            row.early_warning,
            row.reasons
        );
    }
}

// Error types

#[derive(Debug)]
enum StressCliError {
    Io(io::Error),
    Stress(StressError),
    Json(serde_json::Error),
    NoRows,
    DoctorFailed,
}

impl From<io::Error> for StressCliError {
    fn from(e: io::Error) -> Self {
        StressCliError::Io(e)
    }
}

impl From<StressError> for StressCliError {
    fn from(e: StressError) -> Self {
        StressCliError::Stress(e)
    }
}

impl From<serde_json::Error> for StressCliError {
    fn from(e: serde_json::Error) -> Self {
        StressCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StressCliError> for CliError {
    fn from(e: StressCliError) -> Self {
        match e {
            StressCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StressCliError::Stress(e) => {
                let (code, hint) = match &e {
                    StressError::Format(_) => (
                        "FORMAT_ERROR",
                        Some("Check the export's delimiter and header row"),
                    ),
                    StressError::MissingColumns { .. } => (
                        "MISSING_COLUMNS",
                        Some("Set participant/condition column names in the config file"),
                    ),
                    StressError::InvalidParameter(_) => ("INVALID_PARAMETER", None),
                    StressError::ArtifactNotFound { .. } => ("NOT_FOUND", None),
                    StressError::Model(_) => (
                        "MODEL_ERROR",
                        Some("Retrain the model on the current schema"),
                    ),
                    StressError::Io(_) => ("IO_ERROR", Some("Check file paths and permissions")),
                    StressError::Csv(_) => (
                        "CSV_ERROR",
                        Some("Check the export's delimiter and quoting"),
                    ),
                    StressError::Json(_) => ("JSON_ERROR", Some("Check JSON syntax")),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            StressCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StressCliError::NoRows => CliError {
                code: "NO_ROWS".to_string(),
                message: "No rows left to predict after normalization".to_string(),
                hint: Some("Ensure the participant column has values".to_string()),
            },
            StressCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

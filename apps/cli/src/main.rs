use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as AnyhowContext, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::Value;
use zunder_intake::config::{Config, LoggingConfig};
use zunder_intake::logging::{init_logging, LoggingGuard};
use zunder_intake::services::ReceiveOutcome;
use zunder_intake::state::AppState;
use zunder_models::Bundle;
use zunder_validator::{Preset, Validator, ValidatorConfig};

/// Exit code used when validation blocks a Bundle.
const EXIT_REJECTED: u8 = 2;

#[derive(Parser)]
#[command(
    name = "tlq",
    about = "Validate, re-identify and submit FHIR collection Bundles",
    version,
    arg_required_else_help = true
)]
struct Cli {
    /// Path to a configuration file (yaml, toml or json). Defaults to ./config.* if present.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a collection Bundle and, if accepted, submit it as a transaction.
    Receive {
        /// Path to a Bundle JSON file (or "-" for stdin).
        input: PathBuf,
        /// Output file path (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pretty-print JSON output.
        #[arg(short, long, action = ArgAction::SetTrue)]
        pretty: bool,
    },

    /// Convert a collection Bundle into a transaction Bundle without validating or submitting.
    Transform {
        /// Path to a Bundle JSON file (or "-" for stdin).
        input: PathBuf,
        /// Output file path (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pretty-print JSON output.
        #[arg(short, long, action = ArgAction::SetTrue)]
        pretty: bool,
    },

    /// Validate a resource or Bundle and print the OperationOutcome.
    Validate {
        /// Path to a resource JSON file (or "-" for stdin).
        input: PathBuf,
        /// Validation preset (ingestion, authoring, server, publication). Overrides the config file.
        #[arg(long)]
        preset: Option<String>,
        /// Output file path (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pretty-print JSON output.
        #[arg(short, long, action = ArgAction::SetTrue)]
        pretty: bool,
    },

    /// Print CLI version.
    Version,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Receive {
            input,
            output,
            pretty,
        } => run_receive(cli.config.as_deref(), &input, output.as_deref(), pretty).await,
        Commands::Transform {
            input,
            output,
            pretty,
        } => run_transform(&input, output.as_deref(), pretty),
        Commands::Validate {
            input,
            preset,
            output,
            pretty,
        } => run_validate(
            cli.config.as_deref(),
            &input,
            preset.as_deref(),
            output.as_deref(),
            pretty,
        ),
    }
}

async fn run_receive(
    config_path: Option<&Path>,
    input: &Path,
    output: Option<&Path>,
    pretty: bool,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let _logging_guard = init_logging(&config.logging).context("Failed to initialize logging")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        executor = ?config.executor.mode,
        "Starting bundle intake"
    );

    let state = AppState::new(config).context("Failed to initialize application state")?;
    let bundle = read_bundle(input)?;

    match state.receive_service.receive(bundle).await {
        Ok(ReceiveOutcome::Committed {
            response,
            validation,
        }) => {
            if validation.warning_count() > 0 {
                tracing::warn!(
                    warnings = validation.warning_count(),
                    "Bundle accepted with warnings"
                );
            }
            let value = serde_json::to_value(&response)?;
            write_json_output(&value, output, pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Ok(ReceiveOutcome::Rejected(validation)) => {
            write_json_output(&validation.to_operation_outcome(), output, pretty)?;
            Ok(ExitCode::from(EXIT_REJECTED))
        }
        Err(e) => {
            tracing::error!(error = %e, "Bundle intake failed");
            write_json_output(&e.to_operation_outcome(), output, pretty)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_transform(input: &Path, output: Option<&Path>, pretty: bool) -> Result<ExitCode> {
    let _logging_guard = init_stderr_logging()?;

    let bundle = read_bundle(input)?;
    let transaction = zunder_bundle::to_transaction_bundle(bundle)
        .context("Failed to convert collection to transaction")?;

    let value = serde_json::to_value(&transaction)?;
    write_json_output(&value, output, pretty)?;
    Ok(ExitCode::SUCCESS)
}

fn run_validate(
    config_path: Option<&Path>,
    input: &Path,
    preset: Option<&str>,
    output: Option<&Path>,
    pretty: bool,
) -> Result<ExitCode> {
    let validation = match preset {
        Some(name) => ValidatorConfig::preset(parse_preset(name)?),
        None => load_config(config_path)?.validation,
    };
    let _logging_guard = init_stderr_logging()?;

    let validator = Validator::from_config(&validation).context("Invalid validation settings")?;
    let resource = read_json(input)?;
    let outcome = validator.validate(&resource);

    tracing::debug!(
        valid = outcome.valid,
        errors = outcome.error_count(),
        warnings = outcome.warning_count(),
        "Validation finished"
    );

    write_json_output(&outcome.to_operation_outcome(), output, pretty)?;
    if outcome.valid {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_REJECTED))
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path).context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    Ok(config)
}

fn init_stderr_logging() -> Result<LoggingGuard> {
    init_logging(&LoggingConfig::default()).context("Failed to initialize logging")
}

fn parse_preset(name: &str) -> Result<Preset> {
    match name.to_ascii_lowercase().as_str() {
        "ingestion" => Ok(Preset::Ingestion),
        "authoring" => Ok(Preset::Authoring),
        "server" => Ok(Preset::Server),
        "publication" => Ok(Preset::Publication),
        other => anyhow::bail!(
            "Unknown preset '{}'. Expected one of: ingestion, authoring, server, publication",
            other
        ),
    }
}

fn read_bundle(input: &Path) -> Result<Bundle> {
    let json = read_json(input)?;
    Bundle::from_value(&json)
        .with_context(|| format!("Input is not a Bundle: {}", input.display()))
}

fn read_json(input: &Path) -> Result<Value> {
    if input.to_string_lossy() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read JSON from stdin")?;
        return serde_json::from_str(&buf).context("stdin input is not valid JSON");
    }

    let contents = fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file '{}'", input.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Input file is not valid JSON: {}", input.display()))
}

fn write_json_output(value: &Value, output: Option<&Path>, pretty: bool) -> Result<()> {
    let content = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    if let Some(output_path) = output {
        fs::write(output_path, content)
            .with_context(|| format!("Failed to write to {:?}", output_path))?;
        eprintln!("Wrote output to {:?}", output_path);
    } else {
        println!("{}", content);
    }

    Ok(())
}

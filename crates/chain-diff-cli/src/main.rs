// crates/chain-diff-cli/src/main.rs
// ============================================================================
// Module: Chain Diff CLI Entry Point
// Description: Command dispatcher for differential runs and config checks.
// Purpose: Parse arguments, load configuration, and own the process lifecycle.
// Dependencies: chain-diff-catalog, chain-diff-config, chain-diff-core, clap, thiserror, tokio
// ============================================================================

//! ## Overview
//! `chain-diff run` compares a candidate node against a reference node until
//! interrupted; `chain-diff config validate` checks a config file; and
//! `chain-diff operations` lists the comparison catalogue. Every failure is
//! reported as one line on stderr with a non-zero exit code.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use chain_diff_catalog::catalog;
use chain_diff_cli::RunOverrides;
use chain_diff_cli::build_scheduler;
use chain_diff_config::ChainDiffConfig;
use chain_diff_core::EventLevel;
use chain_diff_core::ShutdownHandle;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "chain-diff", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare the candidate against the reference as the chain advances.
    Run(RunCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// List the comparison operations, one per line.
    Operations,
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Config file path (defaults to `CHAIN_DIFF_CONFIG` or `chain-diff.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Reference endpoint URL.
    #[arg(long, value_name = "URL")]
    reference_url: Option<String>,
    /// Reference bearer token.
    #[arg(long, value_name = "TOKEN")]
    reference_token: Option<String>,
    /// Candidate endpoint URL.
    #[arg(long, value_name = "URL")]
    candidate_url: Option<String>,
    /// Candidate bearer token.
    #[arg(long, value_name = "TOKEN")]
    candidate_token: Option<String>,
    /// First height to compare.
    #[arg(long, value_name = "HEIGHT")]
    start_height: Option<u64>,
    /// Maximum in-flight comparisons.
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,
    /// Checkpoints to lag behind the chain head.
    #[arg(long, value_name = "N")]
    confidence: Option<u64>,
    /// Minimum event level.
    #[arg(long, value_enum, value_name = "LEVEL")]
    log_level: Option<LogLevelArg>,
}

impl RunCommand {
    /// Collects the configuration overrides given on the command line.
    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            reference_url: self.reference_url.clone(),
            reference_token: self.reference_token.clone(),
            candidate_url: self.candidate_url.clone(),
            candidate_token: self.candidate_token.clone(),
            start_height: self.start_height,
            concurrency: self.concurrency,
            confidence: self.confidence,
            log_level: self.log_level.map(EventLevel::from),
        }
    }
}

/// Event level accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogLevelArg {
    /// Per-request detail.
    Debug,
    /// Normal progress.
    Info,
    /// Failures and abandoned passes.
    Warn,
    /// Fatal problems only.
    Error,
}

impl From<LogLevelArg> for EventLevel {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Debug => Self::Debug,
            LogLevelArg::Info => Self::Info,
            LogLevelArg::Warn => Self::Warn,
            LogLevelArg::Error => Self::Error,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file path (defaults to `CHAIN_DIFF_CONFIG` or `chain-diff.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying the message shown to the user.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self { message }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(command) => command_run(&command).await,
        Commands::Config { command: ConfigCommand::Validate(command) } => {
            command_config_validate(&command)
        }
        Commands::Operations => command_operations(),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs the scheduler until a shutdown signal or a fatal error.
async fn command_run(command: &RunCommand) -> CliResult<ExitCode> {
    let config = load_with_overrides(command.config.as_deref(), &command.overrides())?;
    let scheduler =
        build_scheduler(&config).map_err(|err| CliError::new(format!("startup failed: {err}")))?;

    let handle = ShutdownHandle::new();
    let signal = handle.signal();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => handle.shutdown(),
            Err(err) => {
                let _ = write_stderr_line(&format!("signal handler unavailable: {err}"));
            }
        }
    });

    scheduler.run(signal).await.map_err(|err| CliError::new(format!("run failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Validates a config file and reports `ok`.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    ChainDiffConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(err.to_string()))?;
    write_stdout_line("ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints the sorted operation names.
fn command_operations() -> CliResult<ExitCode> {
    let registry = catalog();
    write_stdout_line(&registry.names().join("\n"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads configuration, applies overrides, then validates the result.
fn load_with_overrides(
    path: Option<&Path>,
    overrides: &RunOverrides,
) -> CliResult<ChainDiffConfig> {
    let mut config = ChainDiffConfig::read(path).map_err(|err| CliError::new(err.to_string()))?;
    overrides.apply(&mut config);
    config.validate().map_err(|err| CliError::new(err.to_string()))?;
    Ok(config)
}

/// Resolves when the process receives SIGINT or SIGTERM.
#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::SignalKind;
    use tokio::signal::unix::signal;

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

/// Resolves when the process receives ctrl-c.
#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

//! Binary entry point for the `packet-tester` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use clap::error::ErrorKind;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use packet_tester::cli::{Cli, USAGE};
use packet_tester::{
    ConfigError, EndpointConfig, HttpReporter, PacketBackend, PacketBackendError, RunError,
    TelemetryError, TesterConfig, TesterRun,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Arguments(ConfigError),
    #[error("{0}")]
    Settings(ConfigError),
    #[error("backend error: {0}")]
    Backend(#[from] PacketBackendError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("{0}")]
    Run(#[from] RunError<PacketBackendError>),
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                err.print().ok();
                process::exit(1);
            }
        },
    };

    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = TesterConfig::from_cli(cli).map_err(CliError::Arguments)?;
    info!(
        facilities = ?config.facilities,
        plan = %config.plan,
        os = %config.operating_system,
        quantity = config.quantity,
        "Arguments look good!"
    );

    let endpoints = EndpointConfig::load_without_cli_args().map_err(CliError::Settings)?;
    let backend = PacketBackend::new(endpoints.api_url.as_str(), config.api_key.as_str())?;
    let reporter = HttpReporter::new(
        endpoints.telemetry_url.as_str(),
        endpoints.telemetry_token(),
    )?;

    let summary = TesterRun::new(backend, reporter).execute(&config).await?;
    info!(
        project_id = %summary.project_id,
        devices = summary.reports.len(),
        "Run complete"
    );
    Ok(())
}

fn report_error(err: &CliError) {
    match err {
        CliError::Arguments(_) => write_error(io::stdout(), err),
        _ => write_error(io::stderr(), err),
    }
}

/// Renders `err` using the tool's established diagnostic wording.
fn write_error(mut target: impl Write, err: &CliError) {
    match err {
        CliError::Arguments(config) => {
            writeln!(target, "{config}").ok();
            if config.wants_usage() {
                writeln!(target, "{USAGE}").ok();
            }
        }
        CliError::Run(RunError::Authentication { .. }) => {
            writeln!(target, "ERROR: {err}").ok();
        }
        CliError::Run(RunError::ProjectCreation(source)) => {
            writeln!(target, "Error creating project!!").ok();
            let detail = source.status_line().unwrap_or_else(|| source.to_string());
            writeln!(target, "{detail}").ok();
        }
        CliError::Run(RunError::Telemetry { hostname, source }) => {
            writeln!(target, "Error inserting record!").ok();
            writeln!(target, "{source} ({hostname})").ok();
        }
        _ => {
            writeln!(target, "{err}").ok();
        }
    }
}

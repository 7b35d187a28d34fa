//! Run configuration resolved from command-line arguments and environment
//! fallbacks.
//!
//! [`TesterConfig`] is built once in the binary and then passed by reference
//! to every stage of the run; nothing mutates it afterwards.

mod endpoints;

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::cli::{API_KEY_ENV, Cli, DEFAULT_PROJECT_NAME, ORG_ID_ENV};

pub use endpoints::{DEFAULT_API_URL, DEFAULT_TELEMETRY_URL, EndpointConfig};

/// Immutable parameters for a single provisioning run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TesterConfig {
    /// Facilities to deploy into, in the order given on the command line.
    pub facilities: Vec<String>,
    /// Device plan slug (for example `c3.small.x86`).
    pub plan: String,
    /// Operating system slug (for example `ubuntu_18_04`).
    pub operating_system: String,
    /// Number of devices to create in each facility.
    pub quantity: u32,
    /// Provider API key.
    pub api_key: String,
    /// Organization that owns the temporary project.
    pub org_id: String,
    /// Name given to the temporary project.
    pub project_name: String,
    /// Delay between polling passes.
    pub poll_interval: Duration,
    /// Upper bound on the polling phase; `None` polls until every device is
    /// active.
    pub max_wait: Option<Duration>,
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Facility, plan, or operating system was not supplied.
    #[error("ERROR: Missing arguments")]
    MissingArguments,
    /// No API key on the command line or in the environment.
    #[error(
        "ERROR: API Key is required either pass it in via the command line or export 'PACKET_TOKEN'"
    )]
    MissingApiKey,
    /// No organization id on the command line or in the environment.
    #[error(
        "ERROR: Organization ID is required either pass it in via the command line or export 'PACKET_ORG_ID'"
    )]
    MissingOrgId,
    /// Quantity was not a positive integer.
    #[error("ERROR: Quantity must be a valid integer. Example: 5 (got '{0}')")]
    InvalidQuantity(String),
    /// Poll interval was zero.
    #[error("ERROR: Poll interval must be at least one second")]
    InvalidPollInterval,
    /// A required endpoint setting is empty or missing.
    #[error("missing configuration setting: {0}")]
    MissingSetting(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl ConfigError {
    /// Returns `true` when the error should be followed by the usage text.
    #[must_use]
    pub const fn wants_usage(&self) -> bool {
        matches!(self, Self::MissingArguments)
    }
}

impl TesterConfig {
    /// Resolves and validates parsed command-line arguments.
    ///
    /// Checks run in a fixed order: facility/plan/OS presence, API key,
    /// organization id, quantity, poll interval. No network calls are made.
    /// A blank `--api_key` or `--org_id` falls back to `PACKET_TOKEN` or
    /// `PACKET_ORG_ID`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        Self::resolve(cli, |key| env::var(key).ok())
    }

    /// [`Self::from_cli`] with the environment read through `env_lookup`.
    pub(crate) fn resolve(
        cli: Cli,
        env_lookup: fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let facilities = cli
            .facility
            .as_deref()
            .map(split_facilities)
            .unwrap_or_default();
        let plan = non_blank(cli.plan);
        let operating_system = non_blank(cli.os);
        let (Some(plan), Some(operating_system)) = (plan, operating_system) else {
            return Err(ConfigError::MissingArguments);
        };
        if facilities.is_empty() {
            return Err(ConfigError::MissingArguments);
        }

        let api_key = non_blank(cli.api_key)
            .or_else(|| non_blank(env_lookup(API_KEY_ENV)))
            .ok_or(ConfigError::MissingApiKey)?;
        let org_id = non_blank(cli.org_id)
            .or_else(|| non_blank(env_lookup(ORG_ID_ENV)))
            .ok_or(ConfigError::MissingOrgId)?;
        let quantity = parse_quantity(&cli.quantity)?;

        if cli.poll_interval == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }

        Ok(Self {
            facilities,
            plan,
            operating_system,
            quantity,
            api_key,
            org_id,
            project_name: non_blank(Some(cli.project_name))
                .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_owned()),
            poll_interval: Duration::from_secs(cli.poll_interval),
            max_wait: cli.max_wait.map(Duration::from_secs),
        })
    }
}

/// Splits a comma-separated facility list, trimming entries and dropping
/// empty ones while preserving order.
#[must_use]
pub fn split_facilities(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|facility| !facility.is_empty())
        .map(str::to_owned)
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|inner| inner.trim().to_owned())
        .filter(|inner| !inner.is_empty())
}

fn parse_quantity(raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(quantity) if quantity > 0 => Ok(quantity),
        _ => Err(ConfigError::InvalidQuantity(raw.to_owned())),
    }
}

//! Provisioning telemetry: one record per activated device, posted to a
//! remote collector.

mod record;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

pub use record::TelemetryRecord;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while building or delivering telemetry.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TelemetryError {
    /// Raised when the reporter cannot be constructed.
    #[error("telemetry configuration error: {0}")]
    Config(String),
    /// Raised when a device timestamp does not match the provider format.
    #[error("device {field} '{value}' is not a valid timestamp: {message}")]
    Timestamp {
        /// Field that failed to parse (`created_at` or `updated_at`).
        field: String,
        /// Raw value reported by the provider.
        value: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the HTTP exchange itself fails.
    #[error("failed to post telemetry record: {0}")]
    Transport(String),
    /// Raised when the collector answers with anything but 200 or 201.
    #[error("{status}: {reason}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status.
        reason: String,
    },
}

/// Future returned by [`Reporter::report`].
pub type ReportFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TelemetryError>> + Send + 'a>>;

/// Sink for telemetry records.
pub trait Reporter {
    /// Delivers a single record.
    fn report<'a>(&'a self, record: &'a TelemetryRecord) -> ReportFuture<'a>;
}

/// Posts records as JSON to the configured collector URL.
#[derive(Clone, Debug)]
pub struct HttpReporter {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl HttpReporter {
    /// Creates a reporter for `url`, authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Config`] when either value is blank or the
    /// HTTP client cannot be built.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Result<Self, TelemetryError> {
        let collector_url = url.into().trim().to_owned();
        let collector_token = token.into().trim().to_owned();
        if collector_url.is_empty() {
            return Err(TelemetryError::Config(String::from("collector URL is empty")));
        }
        if collector_token.is_empty() {
            return Err(TelemetryError::Config(String::from(
                "collector token is empty",
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| TelemetryError::Config(err.to_string()))?;

        Ok(Self {
            http,
            url: collector_url,
            token: collector_token,
        })
    }

    async fn post(&self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        let response = self
            .http
            .post(&self.url)
            .header("Accept", "application/json")
            .header("X-Auth-Token", &self.token)
            .json(record)
            .send()
            .await
            .map_err(|err| TelemetryError::Transport(err.to_string()))?;

        let status = response.status();
        if is_accepted(status) {
            return Ok(());
        }

        Err(TelemetryError::Rejected {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_owned(),
        })
    }
}

impl Reporter for HttpReporter {
    fn report<'a>(&'a self, record: &'a TelemetryRecord) -> ReportFuture<'a> {
        Box::pin(async move { self.post(record).await })
    }
}

/// The collector acknowledges inserts with 200 or 201; any other status,
/// including other 2xx codes, is a failure.
fn is_accepted(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::CREATED
}

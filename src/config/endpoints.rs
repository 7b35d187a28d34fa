//! Endpoint settings loaded via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;

use super::ConfigError;

/// Default base URL of the Packet REST API.
pub const DEFAULT_API_URL: &str = "https://api.packet.net";

/// Default telemetry collector URL.
pub const DEFAULT_TELEMETRY_URL: &str = "https://packet.codyhill.co/insert";

/// Remote endpoints and the telemetry credential, derived from defaults,
/// configuration files, and `PACKET_TESTER_*` environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "PACKET_TESTER")]
pub struct EndpointConfig {
    /// Base URL of the provider API. Defaults to `https://api.packet.net`.
    #[ortho_config(default = DEFAULT_API_URL.to_owned())]
    pub api_url: String,
    /// URL that receives one telemetry record per activated device.
    #[ortho_config(default = DEFAULT_TELEMETRY_URL.to_owned())]
    pub telemetry_url: String,
    /// Token sent as `X-Auth-Token` to the telemetry collector. Required.
    pub telemetry_token: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl EndpointConfig {
    fn require_field(value: Option<&str>, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.is_none_or(|inner| inner.trim().is_empty()) {
            return Err(ConfigError::MissingSetting(format!(
                "missing {}: set {} or add {} to packet-tester.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads settings without attempting to parse CLI arguments; run
    /// parameters are owned by [`crate::cli::Cli`]. Values merge defaults,
    /// configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails, or
    /// [`ConfigError::MissingSetting`] when validation fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        let config = Self::load_from_iter([std::ffi::OsString::from("packet-tester")])
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that supply the missing value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            Some(self.api_url.as_str()),
            &FieldMetadata::new("provider API URL", "PACKET_TESTER_API_URL", "api_url"),
        )?;
        Self::require_field(
            Some(self.telemetry_url.as_str()),
            &FieldMetadata::new(
                "telemetry URL",
                "PACKET_TESTER_TELEMETRY_URL",
                "telemetry_url",
            ),
        )?;
        Self::require_field(
            self.telemetry_token.as_deref(),
            &FieldMetadata::new(
                "telemetry token",
                "PACKET_TESTER_TELEMETRY_TOKEN",
                "telemetry_token",
            ),
        )?;
        Ok(())
    }

    /// Returns the telemetry token, or an empty string when unset.
    ///
    /// Callers are expected to have run [`Self::validate`] first.
    #[must_use]
    pub fn telemetry_token(&self) -> &str {
        self.telemetry_token.as_deref().unwrap_or_default()
    }
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

//! Telemetry record schema and timestamp arithmetic.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::TelemetryError;
use crate::backend::Device;

/// Timestamp layout used by the provider API.
const PROVIDER_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Timestamp layout expected by the collector.
const RECORD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Provisioning timing for one device, in the collector's schema.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// Device identifier.
    pub uuid: String,
    /// Device state when reported (always `active`).
    pub state: String,
    /// Device hostname.
    pub hostname: String,
    /// Facility code.
    pub facility: String,
    /// Plan slug.
    pub plan: String,
    /// Operating system slug.
    pub operating_system: String,
    /// Creation time, `%Y-%m-%d %H:%M:%S`.
    pub created_at: String,
    /// Activation time, `%Y-%m-%d %H:%M:%S`.
    pub updated_at: String,
    /// Seconds between creation and activation.
    pub creation_duration: i64,
}

impl TelemetryRecord {
    /// Builds a record from an activated device snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Timestamp`] when either timestamp does not
    /// match `%Y-%m-%dT%H:%M:%SZ`.
    pub fn from_device(device: &Device) -> Result<Self, TelemetryError> {
        let created = parse_timestamp("created_at", &device.created_at)?;
        let updated = parse_timestamp("updated_at", &device.updated_at)?;

        Ok(Self {
            uuid: device.id.clone(),
            state: device.state.as_str().to_owned(),
            hostname: device.hostname.clone(),
            facility: device.facility.clone(),
            plan: device.plan.clone(),
            operating_system: device.operating_system.clone(),
            created_at: created.format(RECORD_TIMESTAMP_FORMAT).to_string(),
            updated_at: updated.format(RECORD_TIMESTAMP_FORMAT).to_string(),
            creation_duration: (updated - created).num_seconds(),
        })
    }
}

fn parse_timestamp(field: &str, value: &str) -> Result<NaiveDateTime, TelemetryError> {
    NaiveDateTime::parse_from_str(value, PROVIDER_TIMESTAMP_FORMAT).map_err(|err| {
        TelemetryError::Timestamp {
            field: field.to_owned(),
            value: value.to_owned(),
            message: err.to_string(),
        }
    })
}

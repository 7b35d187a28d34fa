//! Backend abstraction over the provider API used by a tester run.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Organization visible to the API credential.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Organization {
    /// Provider identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Parameters for creating the temporary project.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectRequest {
    /// Organization that will own the project.
    pub organization_id: String,
    /// Project name.
    pub name: String,
}

/// Project created to hold the run's devices.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Project {
    /// Provider identifier.
    pub id: String,
    /// Project name as stored by the provider.
    pub name: String,
    /// Organization that owns the project.
    pub organization_id: String,
}

/// Parameters required to create a device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceRequest {
    /// Project the device is created in.
    pub project_id: String,
    /// Hostname assigned to the device.
    pub hostname: String,
    /// Plan slug (for example `c3.small.x86`).
    pub plan: String,
    /// Facility code (for example `ewr1`).
    pub facility: String,
    /// Operating system slug (for example `ubuntu_18_04`).
    pub operating_system: String,
}

impl DeviceRequest {
    /// Starts a builder for a [`DeviceRequest`].
    #[must_use]
    pub fn builder() -> DeviceRequestBuilder {
        DeviceRequestBuilder::new()
    }

    /// Validates the request, returning a descriptive error when a required
    /// field is missing.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Validation`] when any field is empty.
    pub fn validate(&self) -> Result<(), BackendError> {
        let fields = [
            ("project_id", &self.project_id),
            ("hostname", &self.hostname),
            ("plan", &self.plan),
            ("facility", &self.facility),
            ("operating_system", &self.operating_system),
        ];
        match fields.iter().find(|(_, value)| value.is_empty()) {
            Some((name, _)) => Err(BackendError::Validation((*name).to_owned())),
            None => Ok(()),
        }
    }
}

/// Builder for [`DeviceRequest`] that defers trimming and validation to
/// construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeviceRequestBuilder {
    project_id: String,
    hostname: String,
    plan: String,
    facility: String,
    operating_system: String,
}

impl DeviceRequestBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project identifier.
    #[must_use]
    pub fn project_id(mut self, value: impl Into<String>) -> Self {
        self.project_id = value.into();
        self
    }

    /// Sets the hostname.
    #[must_use]
    pub fn hostname(mut self, value: impl Into<String>) -> Self {
        self.hostname = value.into();
        self
    }

    /// Sets the plan slug.
    #[must_use]
    pub fn plan(mut self, value: impl Into<String>) -> Self {
        self.plan = value.into();
        self
    }

    /// Sets the facility code.
    #[must_use]
    pub fn facility(mut self, value: impl Into<String>) -> Self {
        self.facility = value.into();
        self
    }

    /// Sets the operating system slug.
    #[must_use]
    pub fn operating_system(mut self, value: impl Into<String>) -> Self {
        self.operating_system = value.into();
        self
    }

    /// Builds and validates the [`DeviceRequest`], trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Validation`] when any required field is empty.
    pub fn build(self) -> Result<DeviceRequest, BackendError> {
        let request = DeviceRequest {
            project_id: self.project_id.trim().to_owned(),
            hostname: self.hostname.trim().to_owned(),
            plan: self.plan.trim().to_owned(),
            facility: self.facility.trim().to_owned(),
            operating_system: self.operating_system.trim().to_owned(),
        };
        request.validate()?;
        Ok(request)
    }
}

/// Lifecycle state reported for a device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeviceState {
    /// Accepted but not yet scheduled.
    Queued,
    /// Hardware is being prepared.
    Provisioning,
    /// Ready for use.
    Active,
    /// Removed by the provider.
    Deleted,
    /// Any other state string, kept verbatim.
    Other(String),
}

impl DeviceState {
    /// Maps a provider state string onto a [`DeviceState`].
    #[must_use]
    pub fn from_provider(value: &str) -> Self {
        match value {
            "queued" => Self::Queued,
            "provisioning" => Self::Provisioning,
            "active" => Self::Active,
            "deleted" => Self::Deleted,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Provider spelling of the state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Provisioning => "provisioning",
            Self::Active => "active",
            Self::Deleted => "deleted",
            Self::Other(other) => other.as_str(),
        }
    }

    /// Returns `true` once the device has finished provisioning.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a device as last reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Device {
    /// Provider identifier.
    pub id: String,
    /// Hostname assigned at creation.
    pub hostname: String,
    /// Facility code.
    pub facility: String,
    /// Plan slug.
    pub plan: String,
    /// Operating system slug.
    pub operating_system: String,
    /// Current lifecycle state.
    pub state: DeviceState,
    /// Creation timestamp, `%Y-%m-%dT%H:%M:%SZ`.
    pub created_at: String,
    /// Last update timestamp, `%Y-%m-%dT%H:%M:%SZ`.
    pub updated_at: String,
}

/// Errors raised by backends before a request leaves the process.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum BackendError {
    /// Raised when a request is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Future returned by backend operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Provider operations a tester run depends on.
pub trait Backend {
    /// Provider specific error type returned by the backend.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists organizations visible to the credential.
    fn list_organizations(&self) -> BackendFuture<'_, Vec<Organization>, Self::Error>;

    /// Creates a project inside an organization.
    fn create_project<'a>(
        &'a self,
        request: &'a ProjectRequest,
    ) -> BackendFuture<'a, Project, Self::Error>;

    /// Deletes a project.
    fn delete_project<'a>(&'a self, project_id: &'a str) -> BackendFuture<'a, (), Self::Error>;

    /// Creates a device and returns its initial snapshot.
    fn create_device<'a>(
        &'a self,
        request: &'a DeviceRequest,
    ) -> BackendFuture<'a, Device, Self::Error>;

    /// Fetches the current snapshot of a device.
    fn get_device<'a>(&'a self, device_id: &'a str) -> BackendFuture<'a, Device, Self::Error>;

    /// Deletes a device.
    fn delete_device<'a>(&'a self, device_id: &'a str) -> BackendFuture<'a, (), Self::Error>;
}

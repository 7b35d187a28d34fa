//! Orchestrates a single tester run end to end.
//!
//! The workflow is strictly sequential: verify the credential against the
//! organization, create a project, create every device, poll until each
//! device is active (reporting telemetry and deleting it as it finishes),
//! and finally delete the project. Failures stop the run immediately; no
//! compensating cleanup is attempted, but errors name the resources left
//! behind so an operator can remove them.

use std::fmt::Display;
use std::time::Instant;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::backend::{Backend, BackendError, Device, DeviceRequest, ProjectRequest};
use crate::config::TesterConfig;
use crate::telemetry::{Reporter, TelemetryError, TelemetryRecord};

/// Errors surfaced while performing a tester run.
#[derive(Debug, Error)]
pub enum RunError<BackendErr>
where
    BackendErr: std::error::Error + 'static,
{
    /// Raised when the credential cannot list organizations or the
    /// configured organization is not among them.
    #[error("Could not validate Auth Token or the Org ID does not belong to you. ({detail})")]
    Authentication {
        /// Organization the run was configured for.
        org_id: String,
        /// What went wrong.
        detail: String,
    },
    /// Raised when the provider refuses to create the project.
    #[error("failed to create project: {0}")]
    ProjectCreation(#[source] BackendErr),
    /// Raised when a device request cannot be built from configuration.
    #[error("invalid device request: {0}")]
    InvalidRequest(#[source] BackendError),
    /// Raised when creating a device fails; earlier devices are left running.
    #[error(
        "failed to create {hostname}: {source} (left behind: project {project_id}, devices [{}])",
        .created.join(", ")
    )]
    DeviceCreation {
        /// Hostname whose creation failed.
        hostname: String,
        /// Project the devices live in.
        project_id: String,
        /// Identifiers of devices created before the failure.
        created: Vec<String>,
        /// Provider-specific error.
        #[source]
        source: BackendErr,
    },
    /// Raised when fetching a device's state fails.
    #[error("failed to poll {hostname} ({device_id}): {source}")]
    Poll {
        /// Hostname of the device being polled.
        hostname: String,
        /// Provider identifier of the device.
        device_id: String,
        /// Provider-specific error.
        #[source]
        source: BackendErr,
    },
    /// Raised when a telemetry record cannot be built or delivered.
    #[error("failed to record telemetry for {hostname}: {source}")]
    Telemetry {
        /// Hostname of the device being reported.
        hostname: String,
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Raised when deleting a device fails.
    #[error("failed to delete {hostname} ({device_id}): {source}")]
    DeviceDeletion {
        /// Hostname of the device being deleted.
        hostname: String,
        /// Provider identifier of the device.
        device_id: String,
        /// Provider-specific error.
        #[source]
        source: BackendErr,
    },
    /// Raised when deleting the project fails after every device is gone.
    #[error("failed to delete project {project_id}: {source}")]
    ProjectDeletion {
        /// Project that could not be deleted.
        project_id: String,
        /// Provider-specific error.
        #[source]
        source: BackendErr,
    },
    /// Raised when devices are still pending after the configured maximum wait.
    #[error(
        "devices still pending after {waited_secs}s: [{}] (left behind: project {project_id})",
        .pending.join(", ")
    )]
    Timeout {
        /// Configured maximum wait in seconds.
        waited_secs: u64,
        /// Hostnames that never became active.
        pending: Vec<String>,
        /// Project the devices live in.
        project_id: String,
    },
}

/// Outcome of a successful run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunSummary {
    /// Project that was created and deleted.
    pub project_id: String,
    /// Telemetry records in the order devices became active.
    pub reports: Vec<TelemetryRecord>,
}

/// Hostname given to the `index`-th device in `facility`.
#[must_use]
pub fn device_hostname(facility: &str, index: u32) -> String {
    format!("tester-{facility}-{index}")
}

/// Facility and hostname pairs in creation order: outer loop over the
/// quantity index, inner loop over facilities.
///
/// Yielded lazily so large quantities never allocate up front.
pub fn planned_devices(config: &TesterConfig) -> impl Iterator<Item = (&str, String)> + '_ {
    (0..config.quantity).flat_map(move |index| {
        config
            .facilities
            .iter()
            .map(move |facility| (facility.as_str(), device_hostname(facility, index)))
    })
}

/// Executes the tester workflow using the provided backend and reporter.
#[derive(Debug)]
pub struct TesterRun<B, R> {
    backend: B,
    reporter: R,
}

impl<B, R> TesterRun<B, R>
where
    B: Backend,
    B::Error: Display + Send + Sync + std::error::Error + 'static,
    R: Reporter,
{
    /// Creates a new run.
    #[must_use]
    pub const fn new(backend: B, reporter: R) -> Self {
        Self { backend, reporter }
    }

    /// Runs the whole workflow.
    ///
    /// The project is deleted only after every device has been reported and
    /// deleted. When any step fails the run stops at once and the returned
    /// error names whatever was left behind.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] for the first failing step.
    pub async fn execute(&self, config: &TesterConfig) -> Result<RunSummary, RunError<B::Error>> {
        self.authenticate(config).await?;
        info!(org_id = %config.org_id, "Authenticated successfully!");

        let request = ProjectRequest {
            organization_id: config.org_id.clone(),
            name: config.project_name.clone(),
        };
        let project = self
            .backend
            .create_project(&request)
            .await
            .map_err(RunError::ProjectCreation)?;
        info!(project_id = %project.id, name = %project.name, "Created project!");

        let devices = self.create_devices(config, &project.id).await?;
        info!(count = devices.len(), "All devices created!");

        let reports = self.poll_devices(config, &project.id, devices).await?;

        info!(project_id = %project.id, "All devices are deleted, deleting project!");
        self.backend
            .delete_project(&project.id)
            .await
            .map_err(|source| RunError::ProjectDeletion {
                project_id: project.id.clone(),
                source,
            })?;
        info!("All devices have finished!");

        Ok(RunSummary {
            project_id: project.id,
            reports,
        })
    }

    async fn authenticate(&self, config: &TesterConfig) -> Result<(), RunError<B::Error>> {
        let organizations =
            self.backend
                .list_organizations()
                .await
                .map_err(|err| RunError::Authentication {
                    org_id: config.org_id.clone(),
                    detail: err.to_string(),
                })?;

        if organizations.iter().any(|org| org.id == config.org_id) {
            return Ok(());
        }

        Err(RunError::Authentication {
            org_id: config.org_id.clone(),
            detail: format!(
                "organization {} not among {} visible organizations",
                config.org_id,
                organizations.len()
            ),
        })
    }

    async fn create_devices(
        &self,
        config: &TesterConfig,
        project_id: &str,
    ) -> Result<Vec<Device>, RunError<B::Error>> {
        let mut created: Vec<Device> = Vec::new();
        for (facility, hostname) in planned_devices(config) {
            info!(%hostname, %facility, "Creating {}", hostname);
            let request = DeviceRequest::builder()
                .project_id(project_id)
                .hostname(hostname.as_str())
                .plan(config.plan.as_str())
                .facility(facility)
                .operating_system(config.operating_system.as_str())
                .build()
                .map_err(RunError::InvalidRequest)?;

            let device = self
                .backend
                .create_device(&request)
                .await
                .map_err(|source| RunError::DeviceCreation {
                    hostname,
                    project_id: project_id.to_owned(),
                    created: created.iter().map(|device| device.id.clone()).collect(),
                    source,
                })?;
            created.push(device);
        }
        Ok(created)
    }

    /// Polls until every device has been reported and deleted.
    ///
    /// Each pass walks the current pending list and builds a fresh list of
    /// devices that are still provisioning, so a device is never skipped or
    /// visited twice within a pass.
    async fn poll_devices(
        &self,
        config: &TesterConfig,
        project_id: &str,
        devices: Vec<Device>,
    ) -> Result<Vec<TelemetryRecord>, RunError<B::Error>> {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(devices.len());
        let mut pending = devices;

        while !pending.is_empty() {
            let mut still_pending = Vec::with_capacity(pending.len());
            for device in pending {
                info!(hostname = %device.hostname, "Checking if {} is active", device.hostname);
                let current = self.backend.get_device(&device.id).await.map_err(|source| {
                    RunError::Poll {
                        hostname: device.hostname.clone(),
                        device_id: device.id.clone(),
                        source,
                    }
                })?;

                if current.state.is_active() {
                    reports.push(self.report_and_delete(&current).await?);
                } else {
                    still_pending.push(current);
                }
            }
            pending = still_pending;

            if pending.is_empty() {
                break;
            }
            if let Some(limit) = config.max_wait.filter(|limit| started.elapsed() >= *limit) {
                warn!(pending = pending.len(), "Giving up on pending devices");
                return Err(RunError::Timeout {
                    waited_secs: limit.as_secs(),
                    pending: pending.into_iter().map(|device| device.hostname).collect(),
                    project_id: project_id.to_owned(),
                });
            }
            sleep(config.poll_interval).await;
        }

        Ok(reports)
    }

    async fn report_and_delete(
        &self,
        device: &Device,
    ) -> Result<TelemetryRecord, RunError<B::Error>> {
        info!(hostname = %device.hostname, "{} is active!", device.hostname);
        let record =
            TelemetryRecord::from_device(device).map_err(|source| RunError::Telemetry {
                hostname: device.hostname.clone(),
                source,
            })?;
        self.reporter
            .report(&record)
            .await
            .map_err(|source| RunError::Telemetry {
                hostname: device.hostname.clone(),
                source,
            })?;
        info!(
            hostname = %device.hostname,
            duration_secs = record.creation_duration,
            "Recorded creation duration"
        );

        info!(hostname = %device.hostname, "Deleting {}!", device.hostname);
        self.backend
            .delete_device(&device.id)
            .await
            .map_err(|source| RunError::DeviceDeletion {
                hostname: device.hostname.clone(),
                device_id: device.id.clone(),
                source,
            })?;
        Ok(record)
    }
}

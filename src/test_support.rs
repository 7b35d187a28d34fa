//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::backend::{
    Backend, BackendFuture, Device, DeviceRequest, DeviceState, Organization, Project,
    ProjectRequest,
};
use crate::telemetry::{ReportFuture, Reporter, TelemetryError, TelemetryRecord};

/// Creation timestamp given to every scripted device.
pub const SCRIPTED_CREATED_AT: &str = "2023-01-01T00:00:00Z";

/// Activation timestamp given to scripted devices unless overridden.
pub const SCRIPTED_UPDATED_AT: &str = "2023-01-01T00:05:30Z";

/// Project identifier returned by [`ScriptedBackend::create_project`].
pub const SCRIPTED_PROJECT_ID: &str = "scripted-project";

/// One externally visible call made against the scripted provider or
/// collector, in the order it happened.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    /// `list_organizations`.
    ListOrganizations,
    /// `create_project` with the requested name.
    CreateProject(String),
    /// `create_device` with the requested hostname.
    CreateDevice(String),
    /// `get_device` for the device with this hostname.
    GetDevice(String),
    /// Telemetry delivered for this hostname.
    Report(String),
    /// `delete_device` for the device with this hostname.
    DeleteDevice(String),
    /// `delete_project` with the project id.
    DeleteProject(String),
}

/// Failures the scripted backend can be told to produce.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedBackendError {
    /// Organization listing failed.
    #[error("list organizations failure")]
    ListOrganizations,
    /// Project creation was rejected with this status.
    #[error("create project rejected with status {0}")]
    CreateProject(u16),
    /// Device creation failed for this hostname.
    #[error("create device failure for {0}")]
    CreateDevice(String),
    /// Device lookup failed for this id.
    #[error("get device failure for {0}")]
    GetDevice(String),
    /// Device deletion failed for this id.
    #[error("delete device failure for {0}")]
    DeleteDevice(String),
    /// Project deletion failed for this id.
    #[error("delete project failure for {0}")]
    DeleteProject(String),
}

#[derive(Debug, Default)]
struct ScriptState {
    organizations: Vec<String>,
    fail_list_organizations: bool,
    reject_project_with: Option<u16>,
    fail_create_for: Option<String>,
    fail_delete_device: bool,
    fail_delete_project: bool,
    reject_report_with: Option<u16>,
    state_scripts: HashMap<String, VecDeque<DeviceState>>,
    updated_at: HashMap<String, String>,
    devices: HashMap<String, Device>,
    calls: Vec<Call>,
    reports: Vec<TelemetryRecord>,
}

impl ScriptState {
    fn hostname_of(&self, device_id: &str) -> String {
        self.devices
            .get(device_id)
            .map_or_else(|| device_id.to_owned(), |device| device.hostname.clone())
    }
}

/// Scripted in-memory provider that records every call.
///
/// Devices report `active` on their first poll unless a state script is
/// registered with [`ScriptedBackend::script_states`]. The last scripted
/// state repeats once the script runs out.
#[derive(Clone, Debug, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedBackend {
    /// Creates a backend that recognises the given organization ids.
    #[must_use]
    pub fn with_organizations(organizations: &[&str]) -> Self {
        let backend = Self::default();
        backend.lock().organizations = organizations.iter().map(|id| (*id).to_owned()).collect();
        backend
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `list_organizations` fail.
    pub fn fail_list_organizations(&self) {
        self.lock().fail_list_organizations = true;
    }

    /// Makes `create_project` fail with the given HTTP status.
    pub fn reject_project_with(&self, status: u16) {
        self.lock().reject_project_with = Some(status);
    }

    /// Makes `create_device` fail for `hostname`.
    pub fn fail_create_for(&self, hostname: &str) {
        self.lock().fail_create_for = Some(hostname.to_owned());
    }

    /// Makes every `delete_device` call fail.
    pub fn fail_delete_device(&self) {
        self.lock().fail_delete_device = true;
    }

    /// Makes `delete_project` fail.
    pub fn fail_delete_project(&self) {
        self.lock().fail_delete_project = true;
    }

    /// Registers the states returned by successive polls of `hostname`.
    pub fn script_states(&self, hostname: &str, states: &[DeviceState]) {
        self.lock()
            .state_scripts
            .insert(hostname.to_owned(), states.iter().cloned().collect());
    }

    /// Overrides the activation timestamp reported for `hostname`.
    pub fn set_updated_at(&self, hostname: &str, updated_at: &str) {
        self.lock()
            .updated_at
            .insert(hostname.to_owned(), updated_at.to_owned());
    }

    /// Returns a reporter that records into this backend's call log.
    #[must_use]
    pub fn reporter(&self) -> ScriptedReporter {
        ScriptedReporter {
            state: Arc::clone(&self.state),
        }
    }

    /// Makes the associated reporter reject records with `status`.
    pub fn reject_reports_with(&self, status: u16) {
        self.lock().reject_report_with = Some(status);
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Returns the records accepted by the associated reporter.
    #[must_use]
    pub fn reports(&self) -> Vec<TelemetryRecord> {
        self.lock().reports.clone()
    }

    /// Hostnames passed to `create_device`, in call order.
    #[must_use]
    pub fn created_hostnames(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::CreateDevice(hostname) => Some(hostname.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls matching `predicate`.
    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }
}

impl Backend for ScriptedBackend {
    type Error = ScriptedBackendError;

    fn list_organizations(&self) -> BackendFuture<'_, Vec<Organization>, Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(Call::ListOrganizations);
            if state.fail_list_organizations {
                return Err(ScriptedBackendError::ListOrganizations);
            }
            Ok(state
                .organizations
                .iter()
                .map(|id| Organization {
                    id: id.clone(),
                    name: format!("org {id}"),
                })
                .collect())
        })
    }

    fn create_project<'a>(
        &'a self,
        request: &'a ProjectRequest,
    ) -> BackendFuture<'a, Project, Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(Call::CreateProject(request.name.clone()));
            if let Some(status) = state.reject_project_with {
                return Err(ScriptedBackendError::CreateProject(status));
            }
            Ok(Project {
                id: SCRIPTED_PROJECT_ID.to_owned(),
                name: request.name.clone(),
                organization_id: request.organization_id.clone(),
            })
        })
    }

    fn delete_project<'a>(&'a self, project_id: &'a str) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(Call::DeleteProject(project_id.to_owned()));
            if state.fail_delete_project {
                return Err(ScriptedBackendError::DeleteProject(project_id.to_owned()));
            }
            Ok(())
        })
    }

    fn create_device<'a>(
        &'a self,
        request: &'a DeviceRequest,
    ) -> BackendFuture<'a, Device, Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(Call::CreateDevice(request.hostname.clone()));
            if state.fail_create_for.as_deref() == Some(request.hostname.as_str()) {
                return Err(ScriptedBackendError::CreateDevice(request.hostname.clone()));
            }
            let device = Device {
                id: format!("device-{}", state.devices.len()),
                hostname: request.hostname.clone(),
                facility: request.facility.clone(),
                plan: request.plan.clone(),
                operating_system: request.operating_system.clone(),
                state: DeviceState::Queued,
                created_at: SCRIPTED_CREATED_AT.to_owned(),
                updated_at: SCRIPTED_CREATED_AT.to_owned(),
            };
            state.devices.insert(device.id.clone(), device.clone());
            Ok(device)
        })
    }

    fn get_device<'a>(&'a self, device_id: &'a str) -> BackendFuture<'a, Device, Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            let hostname = state.hostname_of(device_id);
            state.calls.push(Call::GetDevice(hostname.clone()));
            let Some(mut device) = state.devices.get(device_id).cloned() else {
                return Err(ScriptedBackendError::GetDevice(device_id.to_owned()));
            };

            let next_state = match state.state_scripts.get_mut(&hostname) {
                Some(script) if script.len() > 1 => script.pop_front(),
                Some(script) => script.front().cloned(),
                None => None,
            };
            device.state = next_state.unwrap_or(DeviceState::Active);
            if device.state.is_active() {
                device.updated_at = state
                    .updated_at
                    .get(&hostname)
                    .cloned()
                    .unwrap_or_else(|| SCRIPTED_UPDATED_AT.to_owned());
            }
            Ok(device)
        })
    }

    fn delete_device<'a>(&'a self, device_id: &'a str) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            let hostname = state.hostname_of(device_id);
            state.calls.push(Call::DeleteDevice(hostname));
            if state.fail_delete_device {
                return Err(ScriptedBackendError::DeleteDevice(device_id.to_owned()));
            }
            Ok(())
        })
    }
}

/// Reporter double sharing the call log of a [`ScriptedBackend`].
#[derive(Clone, Debug)]
pub struct ScriptedReporter {
    state: Arc<Mutex<ScriptState>>,
}

impl Reporter for ScriptedReporter {
    fn report<'a>(&'a self, record: &'a TelemetryRecord) -> ReportFuture<'a> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.calls.push(Call::Report(record.hostname.clone()));
            if let Some(status) = state.reject_report_with {
                return Err(TelemetryError::Rejected {
                    status,
                    reason: String::from("Scripted Rejection"),
                });
            }
            state.reports.push(record.clone());
            Ok(())
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

//! Core library for the `packet-tester` provisioning probe.
//!
//! The crate measures how long the Packet bare-metal service takes to bring
//! devices to the `active` state. A run creates a throwaway project, launches
//! devices across the requested facilities, reports one telemetry record per
//! device as it activates, then deletes every device and the project.

pub mod backend;
pub mod cli;
pub mod config;
pub mod packet;
pub mod run;
pub mod telemetry;
pub mod test_support;

pub use backend::{
    Backend, BackendError, Device, DeviceRequest, DeviceRequestBuilder, DeviceState,
    Organization, Project, ProjectRequest,
};
pub use config::{ConfigError, EndpointConfig, TesterConfig};
pub use packet::{PacketBackend, PacketBackendError};
pub use run::{RunError, RunSummary, TesterRun};
pub use telemetry::{HttpReporter, Reporter, TelemetryError, TelemetryRecord};

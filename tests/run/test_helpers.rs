//! Shared fixtures for run BDD scenarios.

use std::time::Duration;

use packet_tester::test_support::ScriptedBackend;
use packet_tester::{RunSummary, TesterConfig};
use rstest::fixture;

pub const ORG_ID: &str = "org-1";

#[derive(Clone, Debug)]
pub struct RunContext {
    pub backend: ScriptedBackend,
    pub config: TesterConfig,
    pub outcome: Option<RunResult>,
}

#[derive(Clone, Debug)]
pub enum RunResult {
    Success(RunSummary),
    Failure(String),
}

#[fixture]
pub fn run_context() -> RunContext {
    RunContext {
        backend: ScriptedBackend::with_organizations(&[ORG_ID]),
        config: tester_config(),
        outcome: None,
    }
}

pub fn tester_config() -> TesterConfig {
    TesterConfig {
        facilities: vec![String::from("ewr1"), String::from("sjc1")],
        plan: String::from("c3.small.x86"),
        operating_system: String::from("ubuntu_18_04"),
        quantity: 1,
        api_key: String::from("api-key"),
        org_id: String::from(ORG_ID),
        project_name: String::from("packet_device_tester"),
        poll_interval: Duration::from_millis(1),
        max_wait: None,
    }
}

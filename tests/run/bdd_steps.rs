//! BDD step definitions for the tester run workflow.

use std::time::Duration;

use packet_tester::config::split_facilities;
use packet_tester::test_support::{Call, ScriptedBackend};
use packet_tester::{DeviceState, TesterRun};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{RunContext, RunResult};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a provider that recognises organization \"{org_id}\"")]
fn provider_with_organization(mut run_context: RunContext, org_id: String) -> RunContext {
    run_context.backend = ScriptedBackend::with_organizations(&[org_id.as_str()]);
    run_context
}

#[given("facilities \"{facilities}\" with quantity \"{quantity}\"")]
fn facilities_and_quantity(
    mut run_context: RunContext,
    facilities: String,
    quantity: u32,
) -> RunContext {
    run_context.config.facilities = split_facilities(&facilities);
    run_context.config.quantity = quantity;
    run_context
}

#[given("device \"{hostname}\" reports \"{state}\" before becoming active")]
fn device_activates_late(run_context: RunContext, hostname: String, state: String) -> RunContext {
    run_context.backend.script_states(
        &hostname,
        &[DeviceState::from_provider(&state), DeviceState::Active],
    );
    run_context
}

#[given("device \"{hostname}\" never leaves \"{state}\"")]
fn device_stuck(run_context: RunContext, hostname: String, state: String) -> RunContext {
    run_context
        .backend
        .script_states(&hostname, &[DeviceState::from_provider(&state)]);
    run_context
}

#[given("a maximum wait of \"{millis}\" milliseconds")]
fn maximum_wait(mut run_context: RunContext, millis: u64) -> RunContext {
    run_context.config.max_wait = Some(Duration::from_millis(millis));
    run_context
}

#[given("the provider rejects project creation with status \"{status}\"")]
fn project_rejected(run_context: RunContext, status: u16) -> RunContext {
    run_context.backend.reject_project_with(status);
    run_context
}

#[given("the collector rejects records with status \"{status}\"")]
fn collector_rejects(run_context: RunContext, status: u16) -> RunContext {
    run_context.backend.reject_reports_with(status);
    run_context
}

#[when("I execute the tester run")]
fn execute_run(run_context: RunContext) -> Result<RunContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let RunContext {
        backend, config, ..
    } = run_context;
    let run = TesterRun::new(backend.clone(), backend.reporter());
    let result = runtime.block_on(run.execute(&config));

    let outcome = match result {
        Ok(summary) => RunResult::Success(summary),
        Err(err) => RunResult::Failure(err.to_string()),
    };

    Ok(RunContext {
        backend,
        config,
        outcome: Some(outcome),
    })
}

fn failure_message(run_context: &RunContext) -> Result<&str, StepError> {
    match &run_context.outcome {
        Some(RunResult::Failure(message)) => Ok(message),
        Some(RunResult::Success(summary)) => Err(StepError::Assertion(format!(
            "run succeeded unexpectedly: {summary:?}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("devices are created in order \"{order}\"")]
fn devices_created_in_order(run_context: &RunContext, order: String) -> Result<(), StepError> {
    let expected = split_facilities(&order);
    let actual = run_context.backend.created_hostnames();
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected creation order {expected:?}, got {actual:?}"
        )))
    }
}

#[then("\"{count}\" telemetry records are reported")]
fn records_reported(run_context: &RunContext, count: usize) -> Result<(), StepError> {
    let Some(RunResult::Success(summary)) = &run_context.outcome else {
        return Err(StepError::Assertion(format!(
            "expected success, got {:?}",
            run_context.outcome
        )));
    };
    let delivered = run_context.backend.reports();
    if summary.reports.len() == count && delivered == summary.reports {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} records, summary has {} and collector saw {}",
            summary.reports.len(),
            delivered.len()
        )))
    }
}

#[then("the project is deleted once after every device")]
fn project_deleted_last(run_context: &RunContext) -> Result<(), StepError> {
    let calls = run_context.backend.calls();
    let project_deletes: Vec<_> = calls
        .iter()
        .enumerate()
        .filter(|(_, call)| matches!(call, Call::DeleteProject(_)))
        .map(|(index, _)| index)
        .collect();
    let last_device_delete = calls
        .iter()
        .rposition(|call| matches!(call, Call::DeleteDevice(_)));

    match (project_deletes.as_slice(), last_device_delete) {
        ([project], Some(device)) if project > &device => Ok(()),
        _ => Err(StepError::Assertion(format!(
            "project must be deleted exactly once after all devices: {calls:?}"
        ))),
    }
}

#[then("the run fails mentioning \"{text}\"")]
fn run_fails_with(run_context: &RunContext, text: String) -> Result<(), StepError> {
    let message = failure_message(run_context)?;
    if message.contains(&text) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected failure mentioning '{text}', got: {message}"
        )))
    }
}

#[then("no devices are created")]
fn no_devices_created(run_context: &RunContext) -> Result<(), StepError> {
    let created = run_context.backend.created_hostnames();
    if created.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no devices, got {created:?}"
        )))
    }
}

#[then("no devices are deleted")]
fn no_devices_deleted(run_context: &RunContext) -> Result<(), StepError> {
    let deletes = run_context
        .backend
        .count_calls(|call| matches!(call, Call::DeleteDevice(_)));
    if deletes == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no device deletions, got {deletes}"
        )))
    }
}

#[then("the project is not deleted")]
fn project_not_deleted(run_context: &RunContext) -> Result<(), StepError> {
    let deletes = run_context
        .backend
        .count_calls(|call| matches!(call, Call::DeleteProject(_)));
    if deletes == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(String::from(
            "project should be left in place",
        )))
    }
}

#[then("device \"{hostname}\" is polled \"{polls}\" times and reported once")]
fn device_polled_and_reported(
    run_context: &RunContext,
    hostname: String,
    polls: usize,
) -> Result<(), StepError> {
    let backend = &run_context.backend;
    let polled = backend.count_calls(|call| *call == Call::GetDevice(hostname.clone()));
    let reported = backend.count_calls(|call| *call == Call::Report(hostname.clone()));
    if polled == polls && reported == 1 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "{hostname} polled {polled} times and reported {reported} times"
        )))
    }
}

use std::panic::{catch_unwind, AssertUnwindSafe};

use thread_lab_core::prelude::{
    DeadlineExceededError, ExecutionLog, ShutdownHandle, ShutdownSignalError,
    WorkerInterruptedError,
};
use thread_lab_instruments::OperationRecord;
use thread_lab_summary_model::{RunResult, RunStatus};

use crate::context::RunContext;
use crate::definition::ScenarioRunner;
use crate::params::ScenarioParameters;
use crate::report::{RawRun, ResultReporter};
use crate::worker::panic_message;

/// Run one scenario to completion and package its result.
///
/// The run gets a child of `interrupt`, so shutting `interrupt` down cancels this run, while this
/// run timing out does not touch `interrupt`. Errors and panics from the runner become a
/// [RunStatus::Failed] result with the cause in the log.
pub fn run_scenario<R: ScenarioRunner + ?Sized>(
    name: &str,
    runner: &R,
    params: &ScenarioParameters,
    interrupt: &ShutdownHandle,
) -> RunResult {
    log::info!("Running scenario: {}", name);

    let record = OperationRecord::new(name);
    let log = ExecutionLog::new(name);
    let run_interrupt = interrupt.child();
    let mut ctx = RunContext::new(
        name,
        params.clone(),
        log.clone(),
        run_interrupt.clone(),
        record.started(),
    );

    let status = match catch_unwind(AssertUnwindSafe(|| runner.execute(&mut ctx))) {
        Ok(Ok(status)) => status,
        Ok(Err(e)) if e.is::<DeadlineExceededError>() => {
            log.append(format!("Run timed out: {e}"));
            RunStatus::TimedOut
        }
        Ok(Err(e)) if e.is::<WorkerInterruptedError>() || e.is::<ShutdownSignalError>() => {
            log.append(format!("Run interrupted: {e}"));
            RunStatus::Failed
        }
        Ok(Err(e)) => {
            log::error!("Scenario {} failed: {:?}", name, e);
            log.append(format!("Error: {e:#}"));
            RunStatus::Failed
        }
        Err(panic) => {
            let message = panic_message(&*panic);
            log::error!("Scenario {} panicked: {}", name, message);
            log.append(format!("Runner panicked: {message}"));
            RunStatus::Failed
        }
    };

    // Release anything the runner left waiting, the run is over either way.
    run_interrupt.shutdown();

    let thread_info = ctx.thread_summary();
    let result = ResultReporter::package(RawRun {
        scenario_name: name,
        title: runner.title(),
        description: runner.description(params),
        params,
        record,
        log: &log,
        status,
        thread_info,
    });

    log::info!(
        "Scenario {} finished with status {} in {}ms",
        name,
        result.status,
        result.duration_ms
    );
    result
}

/// Package a run that was refused before it started.
pub(crate) fn reject_run<R: ScenarioRunner + ?Sized>(
    name: &str,
    runner: &R,
    params: &ScenarioParameters,
    reason: &str,
) -> RunResult {
    log::warn!("Refusing to run scenario {}: {}", name, reason);

    let log = ExecutionLog::new(name);
    log.append(format!("Invalid parameters: {reason}"));

    ResultReporter::package(RawRun {
        scenario_name: name,
        title: runner.title(),
        description: runner.description(params),
        params,
        record: OperationRecord::new(name),
        log: &log,
        status: RunStatus::Failed,
        thread_info: "No threads were started".to_string(),
    })
}

use std::time::{Duration, Instant};

use thread_lab_core::prelude::{DelegatedShutdownListener, ExecutionLog, ShutdownHandle};

use crate::executor::Executor;
use crate::params::{ScenarioParameters, MAX_TIMEOUT};
use crate::worker::{JoinReport, WorkerGroup, WorkerOutcome};

/// How long interrupted workers get to exit before they are abandoned.
const DEFAULT_GRACE: Duration = Duration::from_millis(500);

/// Everything a runner needs while it executes one scenario.
///
/// A context is created per run and owns that run's log, interrupt signal and deadline. Nothing in
/// it is shared with any other run.
#[derive(Debug)]
pub struct RunContext {
    scenario: String,
    params: ScenarioParameters,
    log: ExecutionLog,
    interrupt: ShutdownHandle,
    deadline: Instant,
    grace: Duration,
    workers: JoinReport,
    async_threads: usize,
}

impl RunContext {
    pub(crate) fn new(
        scenario: &str,
        params: ScenarioParameters,
        log: ExecutionLog,
        interrupt: ShutdownHandle,
        started: Instant,
    ) -> Self {
        let deadline = started + params.timeout().min(MAX_TIMEOUT);
        Self {
            scenario: scenario.to_string(),
            params,
            log,
            interrupt,
            deadline,
            grace: DEFAULT_GRACE,
            workers: JoinReport::default(),
            async_threads: 0,
        }
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn params(&self) -> &ScenarioParameters {
        &self.params
    }

    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    pub fn append(&self, message: impl Into<String>) {
        self.log.append(message);
    }

    pub fn interrupt_handle(&self) -> &ShutdownHandle {
        &self.interrupt
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        self.interrupt.new_listener()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// A new, empty group of workers bound to this run's log, interrupt signal and deadline.
    pub fn worker_group(&self) -> WorkerGroup {
        WorkerGroup::new(self.log.clone(), self.interrupt.clone(), self.deadline)
    }

    /// Join `group` against the run deadline.
    ///
    /// Every worker that did not complete gets a log entry explaining why, and the outcomes are
    /// remembered for the run's thread summary.
    pub fn join(&mut self, group: WorkerGroup) -> JoinReport {
        let report = group.join_until(self.deadline, self.grace);
        for (name, outcome) in report.outcomes() {
            match outcome {
                WorkerOutcome::Completed => {}
                WorkerOutcome::TimedOut { reclaimed: false } => {
                    self.append(format!(
                        "{name}: {outcome}. The thread stays blocked in the background"
                    ));
                }
                outcome => self.append(format!("{name}: {outcome}")),
            }
        }
        self.workers.merge(&report);
        report
    }

    /// A tokio runtime with `worker_threads` threads owned by this run, cancelled by its interrupt.
    pub fn executor(&mut self, worker_threads: usize) -> anyhow::Result<Executor> {
        let executor = Executor::new(&self.scenario, worker_threads, self.interrupt.clone())?;
        self.async_threads += worker_threads.max(1);
        Ok(executor)
    }

    pub(crate) fn thread_summary(&self) -> String {
        let current = std::thread::current();
        let mut summary = format!(
            "Dispatched on thread {} ({:?})",
            current.name().unwrap_or("unnamed"),
            current.id()
        );

        if !self.workers.is_empty() {
            summary.push_str(&format!(
                "; {} worker threads: {} completed, {} interrupted, {} failed, {} timed out ({} abandoned)",
                self.workers.len(),
                self.workers.completed(),
                self.workers.interrupted(),
                self.workers.failed(),
                self.workers.timed_out(),
                self.workers.abandoned(),
            ));
        }
        if self.async_threads > 0 {
            summary.push_str(&format!("; {} async runtime threads", self.async_threads));
        }

        summary
    }
}

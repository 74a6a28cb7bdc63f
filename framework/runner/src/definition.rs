use std::collections::HashMap;
use std::sync::Arc;

use thread_lab_core::prelude::ShutdownHandle;
use thread_lab_summary_model::{RunResult, RunStatus};

use crate::context::RunContext;
use crate::error::ScenarioError;
use crate::params::ScenarioParameters;
use crate::registry::ScenarioRegistry;
use crate::run::{reject_run, run_scenario};

/// What a runner returns from [ScenarioRunner::execute]. An `Err` means the run failed and the
/// error is recorded in the log.
pub type ExecuteResult = anyhow::Result<RunStatus>;

/// One concurrency pattern, runnable with parameters.
///
/// Implementations only describe the pattern. The lifecycle around it (log, timing, interrupt,
/// packaging the result, turning errors and panics into a failed run) is provided by
/// [run_scenario], so [ScenarioRunner::run] never unwinds into the caller.
pub trait ScenarioRunner: Send + Sync {
    /// The name the runner is known by, for example `countdown-latch`.
    fn name(&self) -> &str;

    /// Human friendly title, for example `CountDownLatch Demo`.
    fn title(&self) -> &str;

    /// What a run with these parameters demonstrates.
    fn description(&self, params: &ScenarioParameters) -> String;

    /// The parameters a caller gets when it does not specify any.
    fn default_parameters(&self) -> ScenarioParameters {
        ScenarioParameters::default()
    }

    /// Reject parameters this pattern cannot run with. Called before any thread is started.
    fn validate(&self, _params: &ScenarioParameters) -> Result<(), String> {
        Ok(())
    }

    /// Execute the pattern to completion, or until the context's deadline.
    fn execute(&self, ctx: &mut RunContext) -> ExecuteResult;

    /// Validate and execute the pattern, blocking until the result is ready.
    fn run(&self, params: &ScenarioParameters) -> RunResult {
        match params.check_common().and_then(|_| self.validate(params)) {
            Ok(()) => run_scenario(self.name(), self, params, &ShutdownHandle::new()),
            Err(reason) => reject_run(self.name(), self, params, &reason),
        }
    }
}

/// The builder for a scenario registry.
///
/// Registration happens once, at process start. The built [ScenarioRegistry] is read-only.
#[derive(Default)]
pub struct ScenarioRegistryBuilder {
    /// Names in registration order, so listings are stable.
    order: Vec<String>,
    runners: HashMap<String, Arc<dyn ScenarioRunner>>,
    /// Root interrupt signal for every run dispatched through the registry.
    interrupt: Option<ShutdownHandle>,
}

impl ScenarioRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `runner` under `name`, which must not already be taken.
    pub fn register(
        mut self,
        name: &str,
        runner: impl ScenarioRunner + 'static,
    ) -> Result<Self, ScenarioError> {
        if self.runners.contains_key(name) {
            return Err(ScenarioError::DuplicateScenario(name.to_string()));
        }

        log::debug!("Registering scenario [{}]: {}", name, runner.title());
        self.order.push(name.to_string());
        self.runners.insert(name.to_string(), Arc::new(runner));
        Ok(self)
    }

    /// Register `runner` under its own [ScenarioRunner::name].
    pub fn add(self, runner: impl ScenarioRunner + 'static) -> Result<Self, ScenarioError> {
        let name = runner.name().to_string();
        self.register(&name, runner)
    }

    /// Interrupt every run dispatched through the registry when `interrupt` is shut down. Each run
    /// still gets its own child signal, so one run timing out does not affect the next.
    pub fn use_interrupt(mut self, interrupt: ShutdownHandle) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn build(self) -> ScenarioRegistry {
        ScenarioRegistry::new(
            self.order,
            self.runners,
            self.interrupt.unwrap_or_default(),
        )
    }
}

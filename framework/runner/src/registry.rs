use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use thread_lab_core::prelude::ShutdownHandle;
use thread_lab_summary_model::RunResult;

use crate::definition::ScenarioRunner;
use crate::error::ScenarioError;
use crate::params::{ParameterOverrides, ScenarioParameters};
use crate::run::run_scenario;

/// Maps scenario names to their runners and dispatches run requests.
///
/// The map is never changed after [crate::definition::ScenarioRegistryBuilder::build], so lookups
/// need no locking and [ScenarioRegistry::dispatch] may be called from many threads at once. Each
/// dispatch is an independent run.
pub struct ScenarioRegistry {
    order: Vec<String>,
    runners: HashMap<String, Arc<dyn ScenarioRunner>>,
    interrupt: ShutdownHandle,
}

impl ScenarioRegistry {
    pub(crate) fn new(
        order: Vec<String>,
        runners: HashMap<String, Arc<dyn ScenarioRunner>>,
        interrupt: ShutdownHandle,
    ) -> Self {
        Self {
            order,
            runners,
            interrupt,
        }
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Result<&dyn ScenarioRunner, ScenarioError> {
        self.runners
            .get(name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ScenarioError::UnknownScenario(name.to_string()))
    }

    pub fn default_parameters(&self, name: &str) -> Result<ScenarioParameters, ScenarioError> {
        Ok(self.get(name)?.default_parameters())
    }

    /// Run scenario `name` with `params`, blocking until it finishes or times out.
    ///
    /// Fails only if the scenario is unknown or the parameters are rejected, in both cases before
    /// any worker thread is started. Everything that goes wrong during the run is reported in the
    /// returned [RunResult].
    pub fn dispatch(
        &self,
        name: &str,
        params: &ScenarioParameters,
    ) -> Result<RunResult, ScenarioError> {
        let runner = self.get(name)?;
        params
            .check_common()
            .and_then(|_| runner.validate(params))
            .map_err(|reason| ScenarioError::InvalidParameters {
                scenario: name.to_string(),
                reason,
            })?;

        log::info!("Dispatching scenario [{}]", name);
        Ok(run_scenario(name, runner, params, &self.interrupt))
    }

    /// Like [ScenarioRegistry::dispatch], starting from the scenario's own defaults.
    pub fn dispatch_with_defaults(
        &self,
        name: &str,
        overrides: &ParameterOverrides,
    ) -> Result<RunResult, ScenarioError> {
        let params = overrides.apply(self.default_parameters(name)?);
        self.dispatch(name, &params)
    }
}

impl Debug for ScenarioRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRegistry")
            .field("scenarios", &self.order)
            .finish()
    }
}

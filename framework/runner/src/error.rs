/// Errors reported to the caller of the registry, before any worker thread is started.
///
/// Failures that happen while a scenario is running are never returned this way, they are recorded
/// in the run's log and reflected in its status.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Scenario not found: {0}")]
    UnknownScenario(String),
    #[error("Scenario [{0}] is already registered")]
    DuplicateScenario(String),
    #[error("Invalid parameters for scenario [{scenario}]: {reason}")]
    InvalidParameters { scenario: String, reason: String },
}

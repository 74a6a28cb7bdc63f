mod cli;
mod context;
mod definition;
mod error;
mod executor;
mod init;
mod params;
mod registry;
mod report;
mod run;
mod shutdown;
mod types;
mod worker;

pub mod prelude {
    pub use crate::cli::{Command, OverrideArgs, RunAllArgs, RunArgs, ThreadLabCli};
    pub use crate::context::RunContext;
    pub use crate::definition::{ExecuteResult, ScenarioRegistryBuilder, ScenarioRunner};
    pub use crate::error::ScenarioError;
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::params::{
        ParameterOverrides, PoolKind, ScenarioParameters, MAX_TIMEOUT, MAX_WORK_DELAY,
    };
    pub use crate::registry::ScenarioRegistry;
    pub use crate::report::{RawRun, ResultReporter};
    pub use crate::run::run_scenario;
    pub use crate::shutdown::start_shutdown_listener;
    pub use crate::types::ThreadLabResult;
    pub use crate::worker::{JoinReport, WorkerContext, WorkerGroup, WorkerOutcome};

    pub use thread_lab_core::prelude::*;
    pub use thread_lab_summary_model::{RunResult, RunStatus};
}

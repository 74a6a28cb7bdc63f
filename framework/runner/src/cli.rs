use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::params::{ParameterOverrides, PoolKind};

#[derive(Debug, Parser)]
#[command(name = "thread-lab", about, long_about = None)]
pub struct ThreadLabCli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the available scenarios
    List,
    /// Run a single scenario
    Run(RunArgs),
    /// Run every scenario with its default parameters and print a summary table
    RunAll(RunAllArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// The name of the scenario to run, see `thread-lab list`
    pub scenario: String,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    /// Print the run result as JSON instead of narrating the log
    #[clap(long, default_value = "false")]
    pub json: bool,

    /// Append the run result to this JSON Lines file
    #[clap(long, env = "RESULTS_PATH")]
    pub results_path: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RunAllArgs {
    /// Base unit of simulated work in milliseconds, applied to every scenario
    #[clap(long)]
    pub delay_ms: Option<u64>,

    /// Append every run result to this JSON Lines file
    #[clap(long, env = "RESULTS_PATH")]
    pub results_path: Option<PathBuf>,
}

/// Parameters that override a scenario's defaults. Anything left unset keeps the default.
#[derive(Debug, Default, Args)]
pub struct OverrideArgs {
    /// Worker threads: consumers, racing threads, latch workers, barrier parties, readers, or the
    /// size of a fixed pool
    #[clap(long)]
    pub workers: Option<usize>,

    /// Writer threads for the read-write lock scenario
    #[clap(long)]
    pub writers: Option<usize>,

    /// Items to produce, tasks to submit, or the highest number to print
    #[clap(long)]
    pub items: Option<usize>,

    /// Barrier phases
    #[clap(long)]
    pub phases: Option<usize>,

    /// Slots in the producer-consumer buffer
    #[clap(long)]
    pub buffer_capacity: Option<usize>,

    /// The kind of thread pool to build
    #[clap(long, value_enum)]
    pub pool: Option<PoolKind>,

    /// Acquire locks in a consistent order in the deadlock scenario
    #[clap(long, default_value = "false")]
    pub apply_fix: bool,

    /// Make one unit of the future composition scenario fail
    #[clap(long, default_value = "false")]
    pub inject_failure: bool,

    /// Base unit of simulated work in milliseconds
    #[clap(long)]
    pub delay_ms: Option<u64>,

    /// Overall time budget for the run in seconds
    #[clap(long)]
    pub timeout_s: Option<u64>,
}

impl OverrideArgs {
    pub fn to_overrides(&self) -> ParameterOverrides {
        ParameterOverrides {
            worker_count: self.workers,
            writer_count: self.writers,
            item_count: self.items,
            phase_count: self.phases,
            buffer_capacity: self.buffer_capacity,
            pool_kind: self.pool,
            apply_fix: self.apply_fix.then_some(true),
            inject_failure: self.inject_failure.then_some(true),
            work_delay: self.delay_ms.map(Duration::from_millis),
            timeout: self.timeout_s.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_arguments_become_overrides() {
        let cli = ThreadLabCli::try_parse_from([
            "thread-lab",
            "run",
            "thread-pool",
            "--items",
            "12",
            "--pool",
            "cached",
            "--delay-ms",
            "5",
            "--json",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("Expected the run command");
        };
        assert_eq!("thread-pool", args.scenario);
        assert!(args.json);

        let overrides = args.overrides.to_overrides();
        assert_eq!(Some(12), overrides.item_count);
        assert_eq!(Some(PoolKind::Cached), overrides.pool_kind);
        assert_eq!(Some(Duration::from_millis(5)), overrides.work_delay);
        assert_eq!(None, overrides.apply_fix);
        assert_eq!(None, overrides.worker_count);
    }

    #[test]
    fn flags_only_override_when_present() {
        let cli =
            ThreadLabCli::try_parse_from(["thread-lab", "run", "deadlock", "--apply-fix"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("Expected the run command");
        };
        assert_eq!(Some(true), args.overrides.to_overrides().apply_fix);
    }

    #[test]
    fn unknown_pool_kind_is_rejected() {
        assert!(
            ThreadLabCli::try_parse_from(["thread-lab", "run", "thread-pool", "--pool", "elastic"])
                .is_err()
        );
    }
}

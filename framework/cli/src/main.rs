use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use thread_lab_instruments::{InMemoryReporter, ReportCollector};
use thread_lab_runner::prelude::*;
use thread_lab_scenarios::default_registry_builder;
use thread_lab_summary_model::append_run_result;

fn main() -> ThreadLabResult<ExitCode> {
    let cli = init();

    // Only drives the Ctrl-C listener, scenarios build their own runtimes.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("signal-listener")
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    let interrupt = start_shutdown_listener(&runtime)?;

    let registry = default_registry_builder()?
        .use_interrupt(interrupt.clone())
        .build();

    let succeeded = match cli.command {
        Command::List => {
            list(&registry)?;
            true
        }
        Command::Run(args) => run_one(&registry, args)?,
        Command::RunAll(args) => run_all(&registry, &interrupt, args)?,
    };

    runtime.shutdown_timeout(Duration::from_millis(100));

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn list(registry: &ScenarioRegistry) -> anyhow::Result<()> {
    for name in registry.names() {
        let runner = registry.get(name)?;
        println!(
            "{:<20} {}\n{:<20} {}",
            name,
            runner.title(),
            "",
            runner.description(&runner.default_parameters())
        );
    }
    Ok(())
}

fn run_one(registry: &ScenarioRegistry, args: RunArgs) -> anyhow::Result<bool> {
    let result = registry
        .dispatch_with_defaults(&args.scenario, &args.overrides.to_overrides())
        .with_context(|| format!("Could not run scenario {}", args.scenario))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize run result")?
        );
    } else {
        print_narration(&result);
    }

    if let Some(path) = &args.results_path {
        store(&result, path)?;
    }

    Ok(result.status.is_success())
}

fn run_all(
    registry: &ScenarioRegistry,
    interrupt: &ShutdownHandle,
    args: RunAllArgs,
) -> anyhow::Result<bool> {
    let overrides = ParameterOverrides {
        work_delay: args.delay_ms.map(Duration::from_millis),
        ..Default::default()
    };

    let mut reporter = InMemoryReporter::new();
    for name in registry.names() {
        if interrupt.is_shutdown() {
            log::warn!("Interrupted, skipping the remaining scenarios");
            break;
        }

        let result = registry.dispatch_with_defaults(name, &overrides)?;
        println!(
            "{:<20} {:<10} {:>6}ms  {}",
            name, result.status, result.duration_ms, result.title
        );

        if let Some(path) = &args.results_path {
            store(&result, path)?;
        }
        reporter.add_run(&result);
    }

    reporter.finalize();
    Ok(!reporter.runs().is_empty() && reporter.all_succeeded())
}

fn print_narration(result: &RunResult) {
    println!("== {} ({}) ==", result.title, result.scenario_name);
    println!("{}", result.description);
    println!();
    for entry in &result.log {
        println!(
            "[{:>6}ms] [{}] {}",
            entry.elapsed_ms, entry.thread, entry.message
        );
    }
    println!();
    println!(
        "Status: {} after {}ms, started at {}",
        result.status,
        result.duration_ms,
        result.started_at.to_rfc3339()
    );
    println!("Threads: {}", result.thread_info);
}

fn store(result: &RunResult, path: &Path) -> anyhow::Result<()> {
    append_run_result(result, path)
        .with_context(|| format!("Failed to write run result to {}", path.display()))?;
    log::info!("Appended run {} to {}", result.run_id, path.display());
    Ok(())
}

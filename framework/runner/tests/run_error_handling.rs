use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use thread_lab_runner::prelude::*;

/// Runs a closure on the run context, so each test can describe its own behaviour.
struct FnRunner<F> {
    title: &'static str,
    execute: F,
}

impl<F> ScenarioRunner for FnRunner<F>
where
    F: Fn(&mut RunContext) -> ExecuteResult + Send + Sync,
{
    fn name(&self) -> &str {
        "demo"
    }

    fn title(&self) -> &str {
        self.title
    }

    fn description(&self, params: &ScenarioParameters) -> String {
        format!("{} with {} workers", self.title, params.worker_count())
    }

    fn validate(&self, params: &ScenarioParameters) -> Result<(), String> {
        if params.worker_count() == 0 {
            return Err("worker_count must be at least 1".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) -> ExecuteResult {
        (self.execute)(ctx)
    }
}

fn runner<F>(title: &'static str, execute: F) -> FnRunner<F>
where
    F: Fn(&mut RunContext) -> ExecuteResult + Send + Sync,
{
    FnRunner { title, execute }
}

fn quick_params() -> ScenarioParameters {
    ScenarioParameters::default()
        .with_work_delay(Duration::from_millis(1))
        .with_timeout(Duration::from_secs(5))
}

#[test]
fn duplicate_registration_is_rejected() {
    let result = ScenarioRegistryBuilder::new()
        .register("demo", runner("Demo", |_| Ok(RunStatus::Success)))
        .unwrap()
        .register("demo", runner("Other demo", |_| Ok(RunStatus::Success)));

    assert!(matches!(
        result,
        Err(ScenarioError::DuplicateScenario(name)) if name == "demo"
    ));
}

#[test]
fn unknown_scenario_is_rejected_before_running() {
    let registry = ScenarioRegistryBuilder::new()
        .register("demo", runner("Demo", |_| Ok(RunStatus::Success)))
        .unwrap()
        .build();

    let result = registry.dispatch("missing", &quick_params());
    assert!(matches!(
        result,
        Err(ScenarioError::UnknownScenario(name)) if name == "missing"
    ));
    assert_eq!(vec!["demo"], registry.names().collect::<Vec<_>>());
}

#[test]
fn invalid_parameters_are_rejected_before_running() {
    let registry = ScenarioRegistryBuilder::new()
        .register(
            "demo",
            runner("Demo", |_| panic!("should never be executed")),
        )
        .unwrap()
        .build();

    let result = registry.dispatch("demo", &quick_params().with_worker_count(0));
    assert!(matches!(
        result,
        Err(ScenarioError::InvalidParameters { scenario, .. }) if scenario == "demo"
    ));
}

#[test]
fn out_of_range_durations_are_rejected_before_running() {
    let registry = ScenarioRegistryBuilder::new()
        .register(
            "demo",
            runner("Demo", |_| panic!("should never be executed")),
        )
        .unwrap()
        .build();

    for params in [
        quick_params().with_timeout(Duration::from_secs(u64::MAX)),
        quick_params().with_work_delay(Duration::from_secs(u64::MAX / 4)),
    ] {
        assert!(matches!(
            registry.dispatch("demo", &params),
            Err(ScenarioError::InvalidParameters { .. })
        ));
    }
}

#[test]
fn run_without_registry_reports_invalid_parameters() {
    let demo = runner("Demo", |_| panic!("should never be executed"));

    let result = demo.run(&quick_params().with_worker_count(0));

    assert_eq!(RunStatus::Failed, result.status);
    assert_eq!("demo", result.scenario_name);
    assert!(result.log[0].message.starts_with("Invalid parameters"));
}

#[test]
fn direct_run_reports_the_runner_name() {
    let demo = runner("Demo Title", |ctx| {
        ctx.append("working");
        Ok(RunStatus::Success)
    });

    let result = demo.run(&quick_params());

    assert_eq!(RunStatus::Success, result.status);
    assert_eq!("demo", result.scenario_name);
    assert_eq!("Demo Title", result.title);
}

#[test]
fn capture_error_from_runner() {
    let demo = runner("Demo", |ctx| {
        ctx.append("about to fail");
        Err(anyhow::anyhow!("Error in runner"))
    });

    let result = demo.run(&quick_params());

    assert_eq!(RunStatus::Failed, result.status);
    assert_eq!(
        vec!["about to fail", "Error: Error in runner"],
        result.messages()
    );
}

#[test]
fn capture_panic_from_runner() {
    let demo = runner("Demo", |_| panic!("Panic in runner"));

    let result = demo.run(&quick_params());

    assert_eq!(RunStatus::Failed, result.status);
    assert_eq!(1, result.count_of("Panic in runner"));
}

#[test]
fn worker_failure_fails_the_run() {
    let demo = runner("Demo", |ctx| {
        let mut group = ctx.worker_group();
        group.spawn("Worker-0", |ctx| {
            ctx.log("Worker-0: done");
            Ok(())
        })?;
        group.spawn("Worker-1", |_| Err(anyhow::anyhow!("Error in worker")))?;

        let report = ctx.join(group);
        Ok(report.status())
    });

    let result = demo.run(&quick_params());

    assert_eq!(RunStatus::Failed, result.status);
    assert_eq!(Some(0), result.position_of("Worker-0: done"));
    assert_eq!(1, result.count_of("Worker-1: failed: Error in worker"));
    assert!(result.thread_info.contains("2 worker threads"));
}

#[test]
fn blocked_worker_times_out_the_run() {
    let demo = runner("Demo", |ctx| {
        let mut group = ctx.worker_group();
        group.spawn("Sleeper", |ctx| {
            ctx.sleep(Duration::from_secs(30))?;
            Ok(())
        })?;

        let report = ctx.join(group);
        Ok(report.status())
    });

    let result = demo.run(&quick_params().with_timeout(Duration::from_millis(100)));

    assert_eq!(RunStatus::TimedOut, result.status);
    assert!(result.duration_ms < 5_000);
    assert_eq!(1, result.count_of("Sleeper: timed out"));
}

#[test]
fn interrupting_the_registry_cancels_a_run() {
    let interrupt = ShutdownHandle::new();
    let registry = ScenarioRegistryBuilder::new()
        .register(
            "sleepy",
            runner("Sleepy", |ctx| {
                let mut group = ctx.worker_group();
                group.spawn("Sleeper", |ctx| {
                    ctx.sleep(Duration::from_secs(30))?;
                    Ok(())
                })?;
                Ok(ctx.join(group).status())
            }),
        )
        .unwrap()
        .use_interrupt(interrupt.clone())
        .build();

    let trigger = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        interrupt.shutdown();
    });
    let result = registry.dispatch("sleepy", &quick_params()).unwrap();
    trigger.join().unwrap();

    assert_eq!(RunStatus::Failed, result.status);
    assert_eq!(1, result.count_of("Sleeper: interrupted"));
}

#[test]
fn concurrent_dispatches_are_independent() {
    let registry = Arc::new(
        ScenarioRegistryBuilder::new()
            .register(
                "count",
                runner("Count", |ctx| {
                    let mut group = ctx.worker_group();
                    for i in 0..ctx.params().worker_count() {
                        group.spawn(format!("Worker-{i}"), move |ctx| {
                            ctx.log(format!("Worker-{i}: done"));
                            Ok(())
                        })?;
                    }
                    Ok(ctx.join(group).status())
                }),
            )
            .unwrap()
            .build(),
    );

    let handles = (1..=4)
        .map(|workers| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                registry
                    .dispatch("count", &quick_params().with_worker_count(workers))
                    .unwrap()
            })
        })
        .collect::<Vec<_>>();

    for (workers, handle) in (1..=4).zip(handles) {
        let result = handle.join().unwrap();
        assert_eq!(RunStatus::Success, result.status);
        assert_eq!(workers, result.count_of(": done"));
    }
}

mod pool;

pub use pool::{PoolStats, TaskPool};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thread_lab_runner::prelude::*;

/// How long running tasks get to notice an interrupt after the pool has timed out.
const TERMINATION_GRACE: Duration = Duration::from_millis(500);

/// Runs `item_count` tasks of increasing length on a fixed, cached or single thread pool and
/// reports the pool's counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPoolScenario;

impl ScenarioRunner for ThreadPoolScenario {
    fn name(&self) -> &str {
        "thread-pool"
    }

    fn title(&self) -> &str {
        "ThreadPool Demo"
    }

    fn description(&self, params: &ScenarioParameters) -> String {
        format!(
            "Runs {} tasks on a {} thread pool",
            params.item_count(),
            params.pool_kind()
        )
    }

    fn default_parameters(&self) -> ScenarioParameters {
        ScenarioParameters::default()
            .with_pool_kind(PoolKind::Fixed)
            .with_item_count(6)
            .with_worker_count(3)
    }

    fn validate(&self, params: &ScenarioParameters) -> Result<(), String> {
        if params.pool_kind() == PoolKind::Fixed && params.worker_count() == 0 {
            return Err("a fixed pool needs a worker_count of at least 1".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) -> ExecuteResult {
        let params = ctx.params().clone();
        let task_count = params.item_count();

        let pool = TaskPool::new("pool-worker", params.pool_kind(), params.worker_count());
        match pool.kind() {
            PoolKind::Fixed => ctx.append(format!(
                "Created Fixed Thread Pool with {} threads",
                params.worker_count()
            )),
            PoolKind::Cached => ctx.append("Created Cached Thread Pool"),
            PoolKind::Single => ctx.append("Created Single Thread Executor"),
        }

        let finished = Arc::new(AtomicUsize::new(0));
        for id in 0..task_count {
            let log = ctx.log().clone();
            let listener = ctx.new_listener();
            let finished = finished.clone();
            let work = params.staggered_delay(2, id);
            pool.submit(move || {
                let thread = std::thread::current();
                let thread = thread.name().unwrap_or("unnamed");

                log.append(format!("Task-{id}: Started by {thread}"));
                listener.sleep(work)?;

                let total = finished.fetch_add(1, Ordering::SeqCst) + 1;
                log.append(format!(
                    "Task-{id}: Completed by {thread} (total completed: {total})"
                ));
                Ok(())
            })?;
        }
        ctx.append(format!("After submitting: {}", pool.stats()));

        pool.shutdown();
        let outcome = pool.await_termination(&ctx.new_listener(), ctx.deadline());

        match outcome {
            WaitOutcome::Completed => {
                let stats = pool.stats();
                ctx.append(format!("After completion: {stats}"));
                ctx.append(format!(
                    "Total tasks completed: {}/{}",
                    stats.completed, task_count
                ));

                if stats.completed == task_count {
                    Ok(RunStatus::Success)
                } else {
                    Ok(RunStatus::Failed)
                }
            }
            WaitOutcome::TimedOut => {
                let dropped = pool.shutdown_now();
                ctx.interrupt_handle().shutdown();
                let reclaimed = pool.await_termination(
                    &ShutdownHandle::new().new_listener(),
                    Instant::now() + TERMINATION_GRACE,
                );

                let stats = pool.stats();
                ctx.append(format!(
                    "Timed out with {dropped} task(s) still queued, workers {}",
                    match reclaimed {
                        WaitOutcome::Completed => "exited after interrupt",
                        _ => "are still running in the background",
                    }
                ));
                ctx.append(format!("At timeout: {stats}"));
                Ok(RunStatus::TimedOut)
            }
            WaitOutcome::Interrupted | WaitOutcome::Broken => {
                pool.shutdown_now();
                Err(
                    WorkerInterruptedError::new("ThreadPool", "waiting for the pool to finish")
                        .into(),
                )
            }
        }
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thread_lab_runner::prelude::*;

use crate::require_at_least_one;

/// A coordinator waits on a latch until every worker has counted it down.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountDownLatchScenario;

impl ScenarioRunner for CountDownLatchScenario {
    fn name(&self) -> &str {
        "countdown-latch"
    }

    fn title(&self) -> &str {
        "CountDownLatch Demo"
    }

    fn description(&self, params: &ScenarioParameters) -> String {
        format!(
            "A coordinator waits for all {} workers to complete before proceeding",
            params.worker_count()
        )
    }

    fn default_parameters(&self) -> ScenarioParameters {
        ScenarioParameters::default().with_worker_count(4)
    }

    fn validate(&self, params: &ScenarioParameters) -> Result<(), String> {
        require_at_least_one("worker_count", params.worker_count())
    }

    fn execute(&self, ctx: &mut RunContext) -> ExecuteResult {
        let worker_count = ctx.params().worker_count();
        let params = ctx.params().clone();

        let latch = Arc::new(CountDownLatch::new(worker_count));
        let completed = Arc::new(AtomicUsize::new(0));

        let mut group = ctx.worker_group();

        for id in 0..worker_count {
            let latch = latch.clone();
            let completed = completed.clone();
            // Later workers take longer, so they finish in a visible order.
            let work = params.staggered_delay(5, id);
            group.spawn(format!("Worker-{id}"), move |ctx| {
                ctx.log(format!("Worker-{id}: Starting task"));
                ctx.sleep(work)?;

                let total = completed.fetch_add(1, Ordering::SeqCst) + 1;
                ctx.log(format!(
                    "Worker-{id}: Task completed (total completed: {total})"
                ));
                latch.count_down();
                Ok(())
            })?;
        }

        let coordinator_latch = latch.clone();
        let final_task = params.delay_units(2);
        group.spawn("Coordinator", move |ctx| {
            ctx.log("Coordinator: Waiting for all workers to complete...");
            ctx.wait_for_latch(&coordinator_latch)?;

            ctx.log(format!(
                "Coordinator: All {worker_count} workers completed! Proceeding with final task."
            ));
            ctx.sleep(final_task)?;
            ctx.log("Coordinator: Final task completed!");
            Ok(())
        })?;

        let report = ctx.join(group);
        ctx.append(format!(
            "{} of {} tasks completed, latch count is {}",
            completed.load(Ordering::SeqCst),
            worker_count,
            latch.count()
        ));

        Ok(report.status())
    }
}

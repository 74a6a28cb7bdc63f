use std::sync::Arc;

use thread_lab_runner::prelude::*;

use crate::require_at_least_one;

/// `worker_count` threads work through `phase_count` phases, meeting at a barrier after each one.
#[derive(Debug, Default, Clone, Copy)]
pub struct CyclicBarrierScenario;

impl ScenarioRunner for CyclicBarrierScenario {
    fn name(&self) -> &str {
        "cyclic-barrier"
    }

    fn title(&self) -> &str {
        "CyclicBarrier Demo"
    }

    fn description(&self, params: &ScenarioParameters) -> String {
        format!(
            "{} threads synchronize at a barrier after each of {} phases",
            params.worker_count(),
            params.phase_count()
        )
    }

    fn default_parameters(&self) -> ScenarioParameters {
        ScenarioParameters::default()
            .with_worker_count(3)
            .with_phase_count(2)
    }

    fn validate(&self, params: &ScenarioParameters) -> Result<(), String> {
        require_at_least_one("worker_count", params.worker_count())?;
        require_at_least_one("phase_count", params.phase_count())
    }

    fn execute(&self, ctx: &mut RunContext) -> ExecuteResult {
        let params = ctx.params().clone();
        let thread_count = params.worker_count();
        let phases = params.phase_count();

        let barrier_log = ctx.log().clone();
        let barrier = Arc::new(CyclicBarrier::new(thread_count).with_action(move |generation| {
            barrier_log.append(format!(
                "=== BARRIER REACHED: All threads synchronized after phase {} ===",
                generation + 1
            ));
        }));

        let mut group = ctx.worker_group();
        for id in 0..thread_count {
            let barrier = barrier.clone();
            let work = params.staggered_delay(6, id) / 2;
            group.spawn(format!("Thread-{id}"), move |ctx| {
                for phase in 1..=phases {
                    ctx.log(format!("Thread-{id}: Starting phase {phase}"));
                    ctx.sleep(work)?;
                    ctx.log(format!(
                        "Thread-{id}: Completed phase {phase}, waiting at barrier"
                    ));

                    let arrival = ctx.wait_at_barrier(&barrier)?;
                    log::debug!(
                        "Thread-{} arrived {} of {} at generation {}",
                        id,
                        arrival.arrival_index + 1,
                        barrier.parties(),
                        arrival.generation
                    );
                    ctx.log(format!("Thread-{id}: Passed barrier for phase {phase}"));
                }

                ctx.log(format!("Thread-{id}: All phases completed!"));
                Ok(())
            })?;
        }

        let report = ctx.join(group);
        if barrier.is_broken() {
            ctx.append("The barrier was broken before every phase completed");
        }

        Ok(report.status())
    }
}

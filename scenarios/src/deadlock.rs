use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thread_lab_runner::prelude::*;

/// Two threads, two locks. Without the fix they take the locks in opposite orders and deadlock,
/// with it they take them in the same order and both finish.
///
/// Lock acquisition polls the run's interrupt signal, so once the run times out the deadlocked
/// threads give up and are reclaimed. A thread that still does not exit within the grace period is
/// abandoned and stays blocked in the background.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeadlockScenario;

/// A named lock, so the narration can say which one is held.
#[derive(Debug)]
struct NamedLock {
    name: &'static str,
    lock: Mutex<()>,
}

impl NamedLock {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            lock: Mutex::new(()),
        })
    }
}

impl ScenarioRunner for DeadlockScenario {
    fn name(&self) -> &str {
        "deadlock"
    }

    fn title(&self) -> &str {
        "Deadlock Demo"
    }

    fn description(&self, params: &ScenarioParameters) -> String {
        if params.apply_fix() {
            "Deadlock prevention using ordered locking".to_string()
        } else {
            "Classic deadlock: two threads take two locks in opposite orders".to_string()
        }
    }

    fn default_parameters(&self) -> ScenarioParameters {
        ScenarioParameters::default()
            .with_apply_fix(false)
            .with_timeout(Duration::from_secs(3))
    }

    fn execute(&self, ctx: &mut RunContext) -> ExecuteResult {
        let apply_fix = ctx.params().apply_fix();
        let hold_delay = ctx.params().work_delay();

        let lock1 = NamedLock::new("lock1");
        let lock2 = NamedLock::new("lock2");

        let plans = if apply_fix {
            ctx.append("Both threads acquire lock1 before lock2");
            [
                ("Thread-1", lock1.clone(), lock2.clone()),
                ("Thread-2", lock1, lock2),
            ]
        } else {
            ctx.append("Thread-1 acquires lock1 then lock2, Thread-2 acquires lock2 then lock1");
            [
                ("Thread-1", lock1.clone(), lock2.clone()),
                ("Thread-2", lock2, lock1),
            ]
        };

        // Without the fix both threads hold their first lock before either reaches for its second,
        // which makes the deadlock certain rather than likely.
        let rendezvous = (!apply_fix).then(|| Arc::new(CyclicBarrier::new(2)));

        let mut group = ctx.worker_group();
        for (name, first, second) in plans {
            let rendezvous = rendezvous.clone();
            group.spawn(name, move |ctx| {
                let _first_guard =
                    ctx.lock_interruptibly(&first.lock, &format!("waiting for {}", first.name))?;
                ctx.log(format!("{name}: Acquired {}", first.name));

                if let Some(rendezvous) = &rendezvous {
                    ctx.wait_at_barrier(rendezvous)?;
                }
                ctx.sleep(hold_delay)?;

                ctx.log(format!("{name}: Waiting for {}", second.name));
                let _second_guard =
                    ctx.lock_interruptibly(&second.lock, &format!("waiting for {}", second.name))?;
                if apply_fix {
                    ctx.log(format!("{name}: Acquired {} (ordered locking)", second.name));
                } else {
                    ctx.log(format!("{name}: Acquired {}", second.name));
                }

                Ok(())
            })?;
        }

        let report = ctx.join(group);
        let status = report.status();
        match status {
            RunStatus::Success if apply_fix => {
                ctx.append("SUCCESS: No deadlock, ordered locking prevented the issue");
            }
            RunStatus::Success => ctx.append("SUCCESS: All threads completed successfully"),
            RunStatus::TimedOut => {
                ctx.append("DEADLOCK: Threads are waiting indefinitely for each other's locks");
                if report.abandoned() > 0 {
                    ctx.append(format!(
                        "{} thread(s) could not be reclaimed and remain blocked",
                        report.abandoned()
                    ));
                }
            }
            RunStatus::Failed => ctx.append("Deadlock demo did not complete"),
        }

        Ok(status)
    }
}

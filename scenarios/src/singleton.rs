use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use thread_lab_runner::prelude::*;

use crate::require_at_least_one;

/// A lazily initialised value shared by many threads, created at most once.
///
/// Each run owns its own cell, so concurrent runs never see each other's instance.
pub struct LazyShared<T> {
    cell: OnceLock<T>,
    initialisations: AtomicUsize,
}

impl<T> LazyShared<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            initialisations: AtomicUsize::new(0),
        }
    }

    /// Get the value, creating it with `init` if no thread has done so yet. When several threads
    /// race here, exactly one of them runs `init` and the rest block until it has finished.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(|| {
            self.initialisations.fetch_add(1, Ordering::SeqCst);
            init()
        })
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// How many times an initialiser has run.
    pub fn initialisations(&self) -> usize {
        self.initialisations.load(Ordering::SeqCst)
    }
}

impl<T> Default for LazyShared<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> Debug for LazyShared<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyShared")
            .field("value", &self.cell.get())
            .field("initialisations", &self.initialisations())
            .finish()
    }
}

#[derive(Debug)]
struct SharedService {
    created_by: String,
    access_count: AtomicUsize,
}

/// `worker_count` threads, released together, race to create one shared instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingletonScenario;

impl ScenarioRunner for SingletonScenario {
    fn name(&self) -> &str {
        "singleton"
    }

    fn title(&self) -> &str {
        "Thread-safe Singleton"
    }

    fn description(&self, params: &ScenarioParameters) -> String {
        format!(
            "{} threads race to lazily create a shared instance, exactly one of them creates it",
            params.worker_count()
        )
    }

    fn default_parameters(&self) -> ScenarioParameters {
        ScenarioParameters::default().with_worker_count(5)
    }

    fn validate(&self, params: &ScenarioParameters) -> Result<(), String> {
        require_at_least_one("worker_count", params.worker_count())
    }

    fn execute(&self, ctx: &mut RunContext) -> ExecuteResult {
        let thread_count = ctx.params().worker_count();
        let work_delay = ctx.params().work_delay() / 2;

        let shared = Arc::new(LazyShared::<SharedService>::new());
        let start = Arc::new(CountDownLatch::new(1));

        let mut group = ctx.worker_group();
        for id in 0..thread_count {
            let shared = shared.clone();
            let start = start.clone();
            group.spawn(format!("Thread-{id}"), move |ctx| {
                ctx.wait_for_latch(&start)?;

                let instance = shared.get_or_init(|| {
                    ctx.log(format!("Thread-{id}: Singleton instance created"));
                    SharedService {
                        created_by: ctx.name().to_string(),
                        access_count: AtomicUsize::new(0),
                    }
                });
                let count = instance.access_count.fetch_add(1, Ordering::SeqCst) + 1;
                ctx.log(format!(
                    "Thread-{id}: Accessed singleton (count: {count}, instance: {instance:p})"
                ));

                ctx.sleep(work_delay)?;
                Ok(())
            })?;
        }

        ctx.append(format!("Releasing {thread_count} threads at once"));
        start.count_down();

        let report = ctx.join(group);

        let created = shared.initialisations();
        let accesses = shared
            .get()
            .map(|s| s.access_count.load(Ordering::SeqCst))
            .unwrap_or_default();
        match shared.get() {
            Some(instance) => ctx.append(format!(
                "{created} instance(s) created, by {}, accessed {accesses} times",
                instance.created_by
            )),
            None => ctx.append("No instance was created"),
        }

        let status = report.status();
        if !status.is_success() {
            return Ok(status);
        }
        if created != 1 || accesses != thread_count {
            ctx.append(format!(
                "Expected exactly one instance accessed by all {thread_count} threads"
            ));
            return Ok(RunStatus::Failed);
        }

        Ok(RunStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_shared_initialises_once_under_contention() {
        let shared = Arc::new(LazyShared::<usize>::new());

        let handles = (0..16)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || *shared.get_or_init(|| i))
            })
            .collect::<Vec<_>>();
        let seen = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>();

        assert_eq!(1, shared.initialisations());
        assert!(seen.iter().all(|v| Some(v) == shared.get()));
    }

    #[test]
    fn zero_threads_is_invalid() {
        let scenario = SingletonScenario;
        assert!(scenario
            .validate(&scenario.default_parameters().with_worker_count(0))
            .is_err());
    }
}

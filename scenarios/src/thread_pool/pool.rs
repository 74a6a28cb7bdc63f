use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use parking_lot::{Condvar, Mutex};
use thread_lab_runner::prelude::{DelegatedShutdownListener, PoolKind, WaitOutcome};

/// How long an idle worker of a cached pool waits for new work before it retires.
const CACHED_KEEP_ALIVE: Duration = Duration::from_secs(60);

const WAIT_SLICE: Duration = Duration::from_millis(10);

type Task = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// A snapshot of a pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub kind: PoolKind,
    /// Live worker threads.
    pub pool_size: usize,
    pub largest_pool_size: usize,
    /// Workers running a task right now.
    pub active: usize,
    pub queued: usize,
    /// Tasks that ran to completion without an error.
    pub completed: usize,
    /// Tasks that returned an error or panicked.
    pub failed: usize,
    pub submitted: usize,
}

impl Display for PoolStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Thread Pool Stats ({}) - Pool Size: {}, Largest Pool Size: {}, Active: {}, Queue Size: {}, Completed Tasks: {}, Failed Tasks: {}, Submitted Tasks: {}",
            self.kind,
            self.pool_size,
            self.largest_pool_size,
            self.active,
            self.queued,
            self.completed,
            self.failed,
            self.submitted
        )
    }
}

struct PoolState {
    queue: VecDeque<Task>,
    pool_size: usize,
    largest_pool_size: usize,
    idle: usize,
    active: usize,
    completed: usize,
    failed: usize,
    submitted: usize,
    next_worker_id: usize,
    shutdown: bool,
}

struct PoolInner {
    name: String,
    kind: PoolKind,
    /// Workers the pool keeps alive even when idle.
    core_size: usize,
    max_size: usize,
    keep_alive: Option<Duration>,
    state: Mutex<PoolState>,
    /// Signalled when a task is queued or the pool shuts down.
    task_available: Condvar,
    /// Signalled when a worker finishes a task or exits.
    worker_changed: Condvar,
}

/// A small thread pool in the three classic shapes.
///
/// Workers are started lazily as tasks are submitted. A fixed pool grows to its size and stays
/// there, a cached pool starts a new worker whenever no idle worker can take the task and retires
/// workers that stay idle for the keep-alive period, and a single pool runs every task on one
/// thread in submission order.
pub struct TaskPool {
    inner: Arc<PoolInner>,
}

impl TaskPool {
    /// `size` is only used by [PoolKind::Fixed].
    pub fn new(name: impl Into<String>, kind: PoolKind, size: usize) -> Self {
        let (core_size, max_size, keep_alive) = match kind {
            PoolKind::Fixed => (size, size, None),
            PoolKind::Cached => (0, usize::MAX, Some(CACHED_KEEP_ALIVE)),
            PoolKind::Single => (1, 1, None),
        };

        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                kind,
                core_size,
                max_size,
                keep_alive,
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    pool_size: 0,
                    largest_pool_size: 0,
                    idle: 0,
                    active: 0,
                    completed: 0,
                    failed: 0,
                    submitted: 0,
                    next_worker_id: 0,
                    shutdown: false,
                }),
                task_available: Condvar::new(),
                worker_changed: Condvar::new(),
            }),
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.inner.kind
    }

    pub fn submit(
        &self,
        task: impl FnOnce() -> anyhow::Result<()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let mut state = self.inner.state.lock();
        if state.shutdown {
            anyhow::bail!("Pool {} is shut down", self.inner.name);
        }

        state.queue.push_back(Box::new(task));
        state.submitted += 1;

        let needs_worker = state.pool_size < self.inner.core_size
            || (state.queue.len() > state.idle && state.pool_size < self.inner.max_size);
        if needs_worker {
            let id = state.next_worker_id;
            let thread_name = format!("{}-{}", self.inner.name, id);
            let inner = self.inner.clone();
            std::thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || inner.work())
                .with_context(|| format!("Failed to start pool worker {thread_name}"))?;

            state.next_worker_id += 1;
            state.pool_size += 1;
            state.largest_pool_size = state.largest_pool_size.max(state.pool_size);
            log::debug!("Started pool worker {}", thread_name);
        }

        self.inner.task_available.notify_one();
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            kind: self.inner.kind,
            pool_size: state.pool_size,
            largest_pool_size: state.largest_pool_size,
            active: state.active,
            queued: state.queue.len(),
            completed: state.completed,
            failed: state.failed,
            submitted: state.submitted,
        }
    }

    /// Stop accepting tasks. Queued tasks still run, then the workers exit.
    pub fn shutdown(&self) {
        self.inner.state.lock().shutdown = true;
        self.inner.task_available.notify_all();
    }

    /// Stop accepting tasks and drop everything still queued, returning how many tasks were
    /// dropped. Running tasks are not stopped here, they watch the run's interrupt signal.
    pub fn shutdown_now(&self) -> usize {
        let dropped = {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
            let dropped = state.queue.len();
            state.queue.clear();
            dropped
        };
        self.inner.task_available.notify_all();
        dropped
    }

    /// Wait for every worker to exit after a shutdown.
    pub fn await_termination(
        &self,
        listener: &DelegatedShutdownListener,
        deadline: Instant,
    ) -> WaitOutcome {
        let mut state = self.inner.state.lock();
        while state.pool_size > 0 {
            if listener.should_shutdown() {
                return WaitOutcome::Interrupted;
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            self.inner
                .worker_changed
                .wait_for(&mut state, WAIT_SLICE.min(deadline - now));
        }
        WaitOutcome::Completed
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        // Idle workers would otherwise wait for work that never comes.
        self.shutdown_now();
    }
}

impl PoolInner {
    fn work(&self) {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.queue.pop_front() {
                state.active += 1;
                drop(state);

                let outcome = catch_unwind(AssertUnwindSafe(task));

                state = self.state.lock();
                state.active -= 1;
                match outcome {
                    Ok(Ok(())) => state.completed += 1,
                    Ok(Err(e)) => {
                        log::warn!("Pool task failed: {:?}", e);
                        state.failed += 1;
                    }
                    Err(_) => {
                        log::warn!("Pool task panicked");
                        state.failed += 1;
                    }
                }
                self.worker_changed.notify_all();
                continue;
            }

            if state.shutdown {
                break;
            }

            state.idle += 1;
            let timed_out = match self.keep_alive {
                Some(keep_alive) if state.pool_size > self.core_size => self
                    .task_available
                    .wait_for(&mut state, keep_alive)
                    .timed_out(),
                _ => {
                    self.task_available.wait(&mut state);
                    false
                }
            };
            state.idle -= 1;

            if timed_out && state.queue.is_empty() {
                log::debug!("Pool worker retiring after keep-alive");
                break;
            }
        }

        state.pool_size -= 1;
        self.worker_changed.notify_all();
    }
}

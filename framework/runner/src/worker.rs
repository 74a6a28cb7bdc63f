use std::any::Any;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use parking_lot::{Condvar, Mutex, MutexGuard};
use thread_lab_core::prelude::{
    BarrierArrival, CountDownLatch, CyclicBarrier, DeadlineExceededError,
    DelegatedShutdownListener, ExecutionLog, ShutdownHandle, ShutdownSignalError, WaitOutcome,
    WorkerInterruptedError,
};
use thread_lab_summary_model::RunStatus;

/// How long a blocked worker sleeps before it checks for interruption again.
const POLL_SLICE: Duration = Duration::from_millis(10);

/// How a single worker thread ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed,
    /// The worker noticed the interrupt signal and stopped early.
    Interrupted(String),
    /// The worker returned an error or panicked.
    Failed(String),
    /// The worker was still running when the run deadline passed. `reclaimed` is true if it exited
    /// once it was interrupted, false if it had to be abandoned.
    TimedOut { reclaimed: bool },
}

impl Display for WorkerOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerOutcome::Completed => f.write_str("completed"),
            WorkerOutcome::Interrupted(msg) => write!(f, "interrupted ({msg})"),
            WorkerOutcome::Failed(msg) => write!(f, "failed: {msg}"),
            WorkerOutcome::TimedOut { reclaimed: true } => {
                f.write_str("timed out, exited after interrupt")
            }
            WorkerOutcome::TimedOut { reclaimed: false } => {
                f.write_str("timed out, abandoned while still blocked")
            }
        }
    }
}

/// The outcome of every worker in a [WorkerGroup], in spawn order.
#[derive(Debug, Clone, Default)]
pub struct JoinReport {
    outcomes: Vec<(String, WorkerOutcome)>,
}

impl JoinReport {
    pub fn outcomes(&self) -> &[(String, WorkerOutcome)] {
        &self.outcomes
    }

    pub fn outcome_of(&self, worker: &str) -> Option<&WorkerOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == worker)
            .map(|(_, outcome)| outcome)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, WorkerOutcome::Completed))
    }

    pub fn interrupted(&self) -> usize {
        self.count(|o| matches!(o, WorkerOutcome::Interrupted(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, WorkerOutcome::Failed(_)))
    }

    pub fn timed_out(&self) -> usize {
        self.count(|o| matches!(o, WorkerOutcome::TimedOut { .. }))
    }

    pub fn abandoned(&self) -> usize {
        self.count(|o| matches!(o, WorkerOutcome::TimedOut { reclaimed: false }))
    }

    /// The run status these outcomes imply on their own.
    ///
    /// Any timeout wins over any failure, and an interrupted worker counts as a failure of the run.
    pub fn status(&self) -> RunStatus {
        if self.timed_out() > 0 {
            RunStatus::TimedOut
        } else if self.failed() > 0 || self.interrupted() > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Success
        }
    }

    pub(crate) fn merge(&mut self, other: &JoinReport) {
        self.outcomes.extend(other.outcomes.iter().cloned());
    }

    fn count(&self, f: impl Fn(&WorkerOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| f(o)).count()
    }
}

/// Handed to every worker closure spawned by a [WorkerGroup].
#[derive(Debug, Clone)]
pub struct WorkerContext {
    name: String,
    log: ExecutionLog,
    listener: DelegatedShutdownListener,
    deadline: Instant,
}

impl WorkerContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self, message: impl Into<String>) {
        self.log.append(message);
    }

    pub fn listener(&self) -> &DelegatedShutdownListener {
        &self.listener
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn interrupted(&self, during: &str) -> WorkerInterruptedError {
        WorkerInterruptedError::new(self.name.clone(), during)
    }

    pub fn check_interrupted(&self, during: &str) -> Result<(), WorkerInterruptedError> {
        if self.listener.should_shutdown() {
            Err(self.interrupted(during))
        } else {
            Ok(())
        }
    }

    /// Simulate a piece of work, waking up early if the run is interrupted.
    pub fn sleep(&self, duration: Duration) -> Result<(), WorkerInterruptedError> {
        log::trace!("{} starting work for {:?}", self.name, duration);
        self.listener
            .sleep(duration)
            .map_err(|_| self.interrupted("working"))
    }

    /// Acquire `mutex`, giving up only if the run is interrupted.
    ///
    /// Unlike a plain `lock`, a worker blocked here can be reclaimed when the run times out.
    pub fn lock_interruptibly<'a, T>(
        &self,
        mutex: &'a Mutex<T>,
        during: &str,
    ) -> Result<MutexGuard<'a, T>, WorkerInterruptedError> {
        self.acquire_interruptibly(|slice| mutex.try_lock_for(slice), during)
    }

    /// Poll `try_acquire` in short slices until it yields a guard or the run is interrupted.
    ///
    /// A guard obtained after the interrupt fired is dropped again. Another worker may only have
    /// released the lock because it was interrupted, and the run is already over.
    pub fn acquire_interruptibly<G>(
        &self,
        mut try_acquire: impl FnMut(Duration) -> Option<G>,
        during: &str,
    ) -> Result<G, WorkerInterruptedError> {
        loop {
            self.check_interrupted(during)?;
            if let Some(guard) = try_acquire(POLL_SLICE) {
                if let Err(e) = self.check_interrupted(during) {
                    drop(guard);
                    return Err(e);
                }
                return Ok(guard);
            }
        }
    }

    /// Wait on `condvar` while `condition` holds for the guarded value.
    pub fn wait_while<T>(
        &self,
        condvar: &Condvar,
        guard: &mut MutexGuard<'_, T>,
        mut condition: impl FnMut(&mut T) -> bool,
        during: &str,
    ) -> Result<(), WorkerInterruptedError> {
        while condition(&mut *guard) {
            self.check_interrupted(during)?;
            condvar.wait_for(guard, POLL_SLICE);
        }
        Ok(())
    }

    pub fn wait_for_latch(&self, latch: &CountDownLatch) -> anyhow::Result<()> {
        match latch.wait(&self.listener, self.deadline) {
            WaitOutcome::Completed => Ok(()),
            outcome => Err(self.wait_error(outcome, "waiting on the latch")),
        }
    }

    pub fn wait_at_barrier(&self, barrier: &CyclicBarrier) -> anyhow::Result<BarrierArrival> {
        barrier
            .wait(&self.listener, self.deadline)
            .map_err(|outcome| self.wait_error(outcome, "waiting at the barrier"))
    }

    fn wait_error(&self, outcome: WaitOutcome, during: &str) -> anyhow::Error {
        match outcome {
            WaitOutcome::TimedOut => DeadlineExceededError::new(self.name.clone(), during).into(),
            WaitOutcome::Broken => {
                WorkerInterruptedError::new(self.name.clone(), format!("{during}, it broke"))
                    .into()
            }
            _ => self.interrupted(during).into(),
        }
    }
}

/// Drops when the worker closure returns or unwinds, so the group hears about panics too.
struct CompletionGuard {
    index: usize,
    done: Sender<usize>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let _ = self.done.send(self.index);
    }
}

/// A set of named OS threads belonging to one run.
///
/// Workers are joined with [WorkerGroup::join_until], which never blocks past the deadline plus a
/// grace period. Workers that are still running at the deadline are interrupted; any that do not
/// exit within the grace period are detached and reported as abandoned.
pub struct WorkerGroup {
    log: ExecutionLog,
    interrupt: ShutdownHandle,
    deadline: Instant,
    workers: Vec<(String, JoinHandle<anyhow::Result<()>>)>,
    done_tx: Sender<usize>,
    done_rx: Receiver<usize>,
}

impl WorkerGroup {
    pub fn new(log: ExecutionLog, interrupt: ShutdownHandle, deadline: Instant) -> Self {
        let (done_tx, done_rx) = channel();
        Self {
            log,
            interrupt,
            deadline,
            workers: Vec::new(),
            done_tx,
            done_rx,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn spawn<F>(&mut self, name: impl Into<String>, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(WorkerContext) -> anyhow::Result<()> + Send + 'static,
    {
        let name = name.into();
        let guard = CompletionGuard {
            index: self.workers.len(),
            done: self.done_tx.clone(),
        };
        let ctx = WorkerContext {
            name: name.clone(),
            log: self.log.clone(),
            listener: self.interrupt.new_listener(),
            deadline: self.deadline,
        };

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _guard = guard;
                f(ctx)
            })
            .with_context(|| format!("Failed to spawn worker thread {name}"))?;

        self.workers.push((name, handle));
        Ok(())
    }

    /// Join every worker, waiting no longer than `deadline` for them to finish on their own and
    /// then no longer than `grace` for interrupted workers to exit.
    pub fn join_until(self, deadline: Instant, grace: Duration) -> JoinReport {
        let total = self.workers.len();
        let mut finished = vec![false; total];
        let mut remaining = total;

        while remaining > 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.done_rx.recv_timeout(deadline - now) {
                Ok(index) => {
                    finished[index] = true;
                    remaining -= 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut reclaimed = vec![false; total];
        if remaining > 0 {
            log::warn!("{remaining} of {total} workers still running at the deadline, interrupting");
            self.interrupt.shutdown();

            let grace_deadline = Instant::now() + grace;
            while remaining > 0 {
                let now = Instant::now();
                if now >= grace_deadline {
                    break;
                }
                match self.done_rx.recv_timeout(grace_deadline - now) {
                    Ok(index) => {
                        reclaimed[index] = true;
                        remaining -= 1;
                    }
                    Err(_) => break,
                }
            }
        }

        let outcomes = self
            .workers
            .into_iter()
            .enumerate()
            .map(|(index, (name, handle))| {
                let outcome = if finished[index] {
                    classify(handle.join())
                } else if reclaimed[index] {
                    // Joining is immediate, the thread has already run its completion guard
                    let _ = handle.join();
                    WorkerOutcome::TimedOut { reclaimed: true }
                } else {
                    // Dropping the handle detaches the thread
                    log::warn!("Abandoning worker {name}, it is still blocked");
                    WorkerOutcome::TimedOut { reclaimed: false }
                };
                (name, outcome)
            })
            .collect();

        JoinReport { outcomes }
    }
}

fn classify(joined: std::thread::Result<anyhow::Result<()>>) -> WorkerOutcome {
    match joined {
        Ok(Ok(())) => WorkerOutcome::Completed,
        Ok(Err(e))
            if e.is::<WorkerInterruptedError>() || e.is::<ShutdownSignalError>() =>
        {
            WorkerOutcome::Interrupted(e.to_string())
        }
        Ok(Err(e)) if e.is::<DeadlineExceededError>() => {
            WorkerOutcome::TimedOut { reclaimed: true }
        }
        Ok(Err(e)) => WorkerOutcome::Failed(format!("{e:#}")),
        Err(panic) => WorkerOutcome::Failed(format!("panicked: {}", panic_message(&*panic))),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

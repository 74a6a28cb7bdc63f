/// Return this error from a worker to indicate that it stopped early because the run asked it to.
///
/// This is not a failure of the worker itself. The run is being interrupted, either because its
/// deadline passed or because the process received a shutdown signal, and the worker has noticed
/// while waiting on a lock, a condition or a simulated piece of work.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("{worker} interrupted while {during}")]
pub struct WorkerInterruptedError {
    worker: String,
    during: String,
}

impl WorkerInterruptedError {
    pub fn new(worker: impl Into<String>, during: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            during: during.into(),
        }
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }
}

impl Default for WorkerInterruptedError {
    fn default() -> Self {
        Self::new("Worker", "waiting")
    }
}

/// Return this error from a worker that gave up waiting because the run's deadline passed.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("{worker} gave up after the run deadline while {during}")]
pub struct DeadlineExceededError {
    worker: String,
    during: String,
}

impl DeadlineExceededError {
    pub fn new(worker: impl Into<String>, during: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            during: during.into(),
        }
    }
}

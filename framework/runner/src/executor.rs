use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use thread_lab_core::prelude::{ShutdownHandle, ShutdownSignalError};

/// A tokio runtime owned by a single run.
///
/// Must be driven from a plain thread, not from inside another tokio runtime.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(
        scenario: &str,
        worker_threads: usize,
        shutdown_handle: ShutdownHandle,
    ) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name(format!("{scenario}-async"))
            .enable_all()
            .build()
            .context("Failed to create Tokio runtime")?;

        Ok(Self {
            runtime,
            shutdown_handle,
        })
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// Note that the future will be cancelled if the run is interrupted. You do not need to do
    /// anything special to handle this, but a future which does not yield will hold the run up
    /// until it does.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Stop the runtime, waiting at most `timeout` for blocking tasks to finish.
    pub fn shutdown(self, timeout: Duration) {
        self.runtime.shutdown_timeout(timeout);
    }
}

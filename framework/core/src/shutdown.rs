use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast::Sender;

/// How often a sleeping thread checks for the shutdown signal.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// A sticky cancellation signal.
///
/// Once [ShutdownHandle::shutdown] has been called, every listener created from this handle or from
/// any of its children observes the signal, including listeners created afterwards.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    signal: Arc<Signal>,
}

#[derive(Debug)]
struct Signal {
    fired: AtomicBool,
    sender: Sender<()>,
    children: Mutex<Vec<Weak<Signal>>>,
}

impl Signal {
    fn new(fired: bool) -> Self {
        Self {
            fired: AtomicBool::new(fired),
            sender: tokio::sync::broadcast::channel(1).0,
            children: Mutex::new(Vec::new()),
        }
    }

    fn fire(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }

        // Fails if nobody is waiting asynchronously, which is the common case for thread workers
        // that poll the flag instead.
        let _ = self.sender.send(());

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.fire();
        }
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            signal: Arc::new(Signal::new(false)),
        }
    }

    pub fn shutdown(&self) {
        log::debug!("Shutdown signal raised");
        self.signal.fire();
    }

    pub fn is_shutdown(&self) -> bool {
        self.signal.fired.load(Ordering::SeqCst)
    }

    /// Create a handle that is shut down when this handle is, but which can also be shut down on
    /// its own without affecting this handle.
    pub fn child(&self) -> ShutdownHandle {
        let mut children = self.signal.children.lock();
        // Checked under the lock so a concurrent `fire` either sees this child or we see the flag.
        let child = Arc::new(Signal::new(self.is_shutdown()));
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(&child));

        ShutdownHandle { signal: child }
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener {
            signal: self.signal.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    signal: Arc<Signal>,
}

impl DelegatedShutdownListener {
    /// Point in time check if the shutdown signal has been raised. If this returns true then work
    /// should be stopped so that the run can finish.
    pub fn should_shutdown(&self) -> bool {
        self.signal.fired.load(Ordering::SeqCst)
    }

    /// Block the current thread for `duration`, returning early with an error if the shutdown
    /// signal is raised in the meantime.
    pub fn sleep(&self, duration: Duration) -> Result<(), ShutdownSignalError> {
        // Too far away to represent means waiting until shutdown.
        let until = Instant::now().checked_add(duration);
        loop {
            if self.should_shutdown() {
                return Err(ShutdownSignalError::default());
            }
            let now = Instant::now();
            match until {
                Some(until) if now >= until => return Ok(()),
                Some(until) => std::thread::sleep(SLEEP_SLICE.min(until - now)),
                None => std::thread::sleep(SLEEP_SLICE),
            }
        }
    }

    /// Wait for the shutdown signal to be raised. It is safe to race this with another future so
    /// that the shutdown signal can be used to cancel other work in progress.
    pub async fn wait_for_shutdown(&self) {
        let mut receiver = self.signal.sender.subscribe();
        if self.should_shutdown() {
            return;
        }

        // Any outcome means the signal fired, the sender lives as long as this listener.
        let _ = receiver.recv().await;
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_is_sticky() {
        let handle = ShutdownHandle::new();
        let early = handle.new_listener();
        assert!(!early.should_shutdown());

        handle.shutdown();
        assert!(early.should_shutdown());
        assert!(early.should_shutdown());
        assert!(handle.new_listener().should_shutdown());
    }

    #[test]
    fn parent_shutdown_reaches_children() {
        let parent = ShutdownHandle::new();
        let child = parent.child();
        let grandchild = child.child();

        parent.shutdown();
        assert!(child.is_shutdown());
        assert!(grandchild.new_listener().should_shutdown());

        // Children created after the fact start out shut down
        assert!(parent.child().is_shutdown());
    }

    #[test]
    fn child_shutdown_does_not_reach_parent() {
        let parent = ShutdownHandle::new();
        let child = parent.child();
        let sibling = parent.child();

        child.shutdown();
        assert!(!parent.is_shutdown());
        assert!(!sibling.is_shutdown());
    }

    #[test]
    fn sleep_returns_early_on_shutdown() {
        let handle = ShutdownHandle::new();
        let listener = handle.new_listener();
        handle.shutdown();

        let started = Instant::now();
        assert!(listener.sleep(Duration::from_secs(30)).is_err());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(handle.child().new_listener().sleep(Duration::ZERO).is_err());
    }

    #[tokio::test]
    async fn async_wait_returns_after_shutdown() {
        let handle = ShutdownHandle::new();
        let listener = handle.new_listener();

        let waiter = tokio::spawn(async move { listener.wait_for_shutdown().await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        handle.shutdown();

        tokio::time::timeout(std::time::Duration::from_secs(2), waiter)
            .await
            .expect("wait_for_shutdown did not return")
            .unwrap();
    }
}

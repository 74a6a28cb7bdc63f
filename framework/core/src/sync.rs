use std::fmt::{Debug, Display, Formatter};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::shutdown::DelegatedShutdownListener;

/// Upper bound on how long a waiter sleeps before re-checking for interruption.
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// How a wait on one of the primitives in this module ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Completed,
    Interrupted,
    TimedOut,
    /// Another party of a [CyclicBarrier] gave up, so nobody can pass it.
    Broken,
}

impl Display for WaitOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WaitOutcome::Completed => "completed",
            WaitOutcome::Interrupted => "interrupted",
            WaitOutcome::TimedOut => "timed out",
            WaitOutcome::Broken => "barrier broken",
        };
        f.write_str(s)
    }
}

/// Sleep on `condvar` for at most one wait slice, or until `deadline`.
///
/// Returns the outcome that should end the wait, if any. Spurious wake-ups are fine, callers
/// re-check their own condition in a loop.
fn wait_slice<T>(
    condvar: &Condvar,
    guard: &mut MutexGuard<'_, T>,
    listener: &DelegatedShutdownListener,
    deadline: Instant,
) -> Option<WaitOutcome> {
    if listener.should_shutdown() {
        return Some(WaitOutcome::Interrupted);
    }
    let now = Instant::now();
    if now >= deadline {
        return Some(WaitOutcome::TimedOut);
    }

    condvar.wait_for(guard, WAIT_SLICE.min(deadline - now));
    None
}

/// A one-shot gate that opens once it has been counted down to zero.
#[derive(Debug)]
pub struct CountDownLatch {
    count: Mutex<usize>,
    released: Condvar,
}

impl CountDownLatch {
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            released: Condvar::new(),
        }
    }

    pub fn count_down(&self) {
        let mut count = self.count.lock();
        if *count > 0 {
            *count -= 1;
            if *count == 0 {
                self.released.notify_all();
            }
        }
    }

    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Block until the count reaches zero, the listener is signalled, or the deadline passes.
    pub fn wait(&self, listener: &DelegatedShutdownListener, deadline: Instant) -> WaitOutcome {
        let mut count = self.count.lock();
        while *count > 0 {
            if let Some(outcome) = wait_slice(&self.released, &mut count, listener, deadline) {
                return outcome;
            }
        }

        WaitOutcome::Completed
    }
}

/// What a party learns when it passes a [CyclicBarrier].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierArrival {
    /// Zero based count of how many times the barrier has tripped before this pass.
    pub generation: u64,
    /// Order of arrival within the generation, starting at 0.
    pub arrival_index: usize,
    /// True for the last party to arrive, which is also the one that ran the barrier action.
    pub is_leader: bool,
}

type BarrierAction = Box<dyn Fn(u64) + Send + Sync>;

#[derive(Debug)]
struct BarrierState {
    waiting: usize,
    generation: u64,
    broken: bool,
}

/// A reusable rendezvous point for a fixed number of parties.
///
/// When the last party arrives it runs the optional barrier action, with the generation number,
/// before any waiting party is released. If a waiting party is interrupted or runs out of time the
/// barrier breaks and every other waiter is released with [WaitOutcome::Broken].
pub struct CyclicBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    tripped: Condvar,
    action: Option<BarrierAction>,
}

impl CyclicBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(BarrierState {
                waiting: 0,
                generation: 0,
                broken: false,
            }),
            tripped: Condvar::new(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.action = Some(Box::new(action));
        self
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    pub fn is_broken(&self) -> bool {
        self.state.lock().broken
    }

    pub fn wait(
        &self,
        listener: &DelegatedShutdownListener,
        deadline: Instant,
    ) -> Result<BarrierArrival, WaitOutcome> {
        let mut state = self.state.lock();
        if state.broken {
            return Err(WaitOutcome::Broken);
        }

        let generation = state.generation;
        let arrival_index = state.waiting;
        state.waiting += 1;

        if state.waiting >= self.parties {
            if let Some(action) = &self.action {
                action(generation);
            }
            state.waiting = 0;
            state.generation += 1;
            self.tripped.notify_all();

            return Ok(BarrierArrival {
                generation,
                arrival_index,
                is_leader: true,
            });
        }

        loop {
            let outcome = wait_slice(&self.tripped, &mut state, listener, deadline);

            if state.generation != generation {
                return Ok(BarrierArrival {
                    generation,
                    arrival_index,
                    is_leader: false,
                });
            }
            if state.broken {
                return Err(WaitOutcome::Broken);
            }
            if let Some(outcome) = outcome {
                state.broken = true;
                self.tripped.notify_all();
                return Err(outcome);
            }
        }
    }
}

impl Debug for CyclicBarrier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CyclicBarrier")
            .field("parties", &self.parties)
            .field("state", &*self.state.lock())
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[test]
    fn latch_opens_after_last_count_down() {
        let latch = Arc::new(CountDownLatch::new(3));
        let handle = ShutdownHandle::new();

        let workers = (0..3)
            .map(|_| {
                let latch = latch.clone();
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_millis(5));
                    latch.count_down();
                })
            })
            .collect::<Vec<_>>();

        assert_eq!(
            WaitOutcome::Completed,
            latch.wait(&handle.new_listener(), far_deadline())
        );
        assert_eq!(0, latch.count());
        for w in workers {
            w.join().unwrap();
        }
    }

    #[test]
    fn latch_wait_times_out() {
        let latch = CountDownLatch::new(1);
        let handle = ShutdownHandle::new();
        let outcome = latch.wait(
            &handle.new_listener(),
            Instant::now() + Duration::from_millis(30),
        );
        assert_eq!(WaitOutcome::TimedOut, outcome);
    }

    #[test]
    fn latch_wait_is_interruptible() {
        let latch = CountDownLatch::new(1);
        let handle = ShutdownHandle::new();
        handle.shutdown();
        assert_eq!(
            WaitOutcome::Interrupted,
            latch.wait(&handle.new_listener(), far_deadline())
        );
    }

    #[test]
    fn extra_count_downs_are_ignored() {
        let latch = CountDownLatch::new(1);
        latch.count_down();
        latch.count_down();
        assert_eq!(0, latch.count());
    }

    #[test]
    fn barrier_runs_action_once_per_generation() {
        let trips = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new({
            let trips = trips.clone();
            CyclicBarrier::new(3).with_action(move |_| {
                trips.fetch_add(1, Ordering::SeqCst);
            })
        });
        let handle = ShutdownHandle::new();

        let parties = (0..3)
            .map(|_| {
                let barrier = barrier.clone();
                let listener = handle.new_listener();
                std::thread::spawn(move || {
                    let mut leaders = 0;
                    for _ in 0..4 {
                        let arrival = barrier.wait(&listener, far_deadline()).unwrap();
                        if arrival.is_leader {
                            leaders += 1;
                        }
                    }
                    leaders
                })
            })
            .collect::<Vec<_>>();

        let leaders: usize = parties.into_iter().map(|p| p.join().unwrap()).sum();
        assert_eq!(4, leaders);
        assert_eq!(4, trips.load(Ordering::SeqCst));
        assert!(!barrier.is_broken());
    }

    #[test]
    fn barrier_breaks_when_a_party_times_out() {
        let barrier = Arc::new(CyclicBarrier::new(3));
        let handle = ShutdownHandle::new();

        let impatient = {
            let barrier = barrier.clone();
            let listener = handle.new_listener();
            std::thread::spawn(move || {
                barrier.wait(&listener, Instant::now() + Duration::from_millis(30))
            })
        };
        let patient = {
            let barrier = barrier.clone();
            let listener = handle.new_listener();
            std::thread::spawn(move || barrier.wait(&listener, far_deadline()))
        };

        let first = impatient.join().unwrap().unwrap_err();
        let second = patient.join().unwrap().unwrap_err();
        assert_eq!(WaitOutcome::TimedOut, first);
        assert_eq!(WaitOutcome::Broken, second);
        assert!(barrier.is_broken());
    }
}

//! The concurrency patterns Thread Lab knows how to run.
//!
//! Every pattern is a [thread_lab_runner::prelude::ScenarioRunner] and [default_registry] registers
//! all of them under their own names, which are also the command line names.

mod countdown_latch;
mod cyclic_barrier;
mod deadlock;
mod future_composition;
mod odd_even;
mod producer_consumer;
mod read_write_lock;
mod singleton;
mod thread_pool;

pub use countdown_latch::CountDownLatchScenario;
pub use cyclic_barrier::CyclicBarrierScenario;
pub use deadlock::DeadlockScenario;
pub use future_composition::FutureCompositionScenario;
pub use odd_even::OddEvenScenario;
pub use producer_consumer::ProducerConsumerScenario;
pub use read_write_lock::ReadWriteLockScenario;
pub use singleton::{LazyShared, SingletonScenario};
pub use thread_pool::{PoolStats, TaskPool, ThreadPoolScenario};

use thread_lab_runner::prelude::{ScenarioError, ScenarioRegistry, ScenarioRegistryBuilder};

/// A registry builder with every scenario registered, ready for an interrupt handle to be added.
pub fn default_registry_builder() -> Result<ScenarioRegistryBuilder, ScenarioError> {
    ScenarioRegistryBuilder::new()
        .add(ProducerConsumerScenario)?
        .add(DeadlockScenario)?
        .add(SingletonScenario)?
        .add(CountDownLatchScenario)?
        .add(CyclicBarrierScenario)?
        .add(ReadWriteLockScenario)?
        .add(FutureCompositionScenario)?
        .add(ThreadPoolScenario)?
        .add(OddEvenScenario)
}

pub fn default_registry() -> Result<ScenarioRegistry, ScenarioError> {
    Ok(default_registry_builder()?.build())
}

/// Reject a count that must be at least one.
pub(crate) fn require_at_least_one(name: &str, value: usize) -> Result<(), String> {
    if value == 0 {
        Err(format!("{name} must be at least 1"))
    } else {
        Ok(())
    }
}

mod interrupt;
mod execution_log;
mod shutdown;
mod sync;

pub mod prelude {
    pub use crate::interrupt::{DeadlineExceededError, WorkerInterruptedError};
    pub use crate::execution_log::ExecutionLog;
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
    pub use crate::sync::{BarrierArrival, CountDownLatch, CyclicBarrier, WaitOutcome};
    pub use thread_lab_summary_model::LogEntry;
}

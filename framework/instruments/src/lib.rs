mod report;

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

pub use report::{InMemoryReporter, ReportCollector};

/// Timing for one operation, typically one scenario run.
///
/// Captures both a monotonic start, for measuring the duration, and the wall clock start, for
/// reporting when the operation happened.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    operation_id: String,
    started: Instant,
    started_at: DateTime<Utc>,
    elapsed: Option<Duration>,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            started_at: Utc::now(),
            elapsed: None,
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Stop the clock. Calling this more than once keeps the first measurement.
    pub fn finish(&mut self) -> Duration {
        *self.elapsed.get_or_insert_with(|| self.started.elapsed())
    }

    /// The measured duration, if [OperationRecord::finish] has been called.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_keeps_first_measurement() {
        let mut record = OperationRecord::new("op");
        assert!(record.duration().is_none());

        std::thread::sleep(Duration::from_millis(5));
        let first = record.finish();
        std::thread::sleep(Duration::from_millis(5));
        let second = record.finish();

        assert!(first >= Duration::from_millis(5));
        assert_eq!(first, second);
        assert_eq!(Some(first), record.duration());
        assert_eq!("op", record.operation_id());
    }
}

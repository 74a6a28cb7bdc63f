use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use thread_lab_summary_model::LogEntry;

/// Append-only narration of a single scenario run.
///
/// Any number of workers may append concurrently. Appends are serialised by an internal lock, so
/// the order of [ExecutionLog::snapshot] is the order in which appends won that lock. That is
/// consistent with any happens-before edge the scenario establishes between two appends, and
/// promises nothing beyond that.
///
/// Every append is also written to the `log` facade at info level, so a console with
/// `RUST_LOG=info` narrates the run as it happens.
#[derive(Clone)]
pub struct ExecutionLog {
    inner: Arc<Inner>,
}

struct Inner {
    scenario: String,
    started: Instant,
    entries: Mutex<Vec<LogEntry>>,
}

impl ExecutionLog {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                scenario: scenario.into(),
                started: Instant::now(),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn append(&self, message: impl Into<String>) {
        let message = message.into();
        let thread = std::thread::current()
            .name()
            .unwrap_or("unnamed")
            .to_string();

        log::info!("[{}] {}", self.inner.scenario, message);

        let mut entries = self.inner.entries.lock();
        entries.push(LogEntry {
            at: chrono::Utc::now(),
            elapsed_ms: self.inner.started.elapsed().as_millis() as u64,
            thread,
            message,
        });
    }

    /// The entries collected so far, in append order.
    ///
    /// Intended to be called once the owning runner has joined its workers.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.inner.entries.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.inner
            .entries
            .lock()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for ExecutionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionLog")
            .field("scenario", &self.inner.scenario)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_appends_are_all_kept_whole() {
        let _ = env_logger::builder().is_test(true).try_init();
        let log = ExecutionLog::new("test");

        let handles = (0..8)
            .map(|t| {
                let log = log.clone();
                std::thread::Builder::new()
                    .name(format!("writer-{t}"))
                    .spawn(move || {
                        for i in 0..100 {
                            log.append(format!("writer-{t} line {i}"));
                        }
                    })
                    .unwrap()
            })
            .collect::<Vec<_>>();

        for h in handles {
            h.join().unwrap();
        }

        let entries = log.snapshot();
        assert_eq!(800, entries.len());
        for t in 0..8 {
            let lines = entries
                .iter()
                .filter(|e| e.thread == format!("writer-{t}"))
                .map(|e| e.message.clone())
                .collect::<Vec<_>>();
            let expected = (0..100)
                .map(|i| format!("writer-{t} line {i}"))
                .collect::<Vec<_>>();
            // Per thread program order is preserved
            assert_eq!(expected, lines);
        }
    }

    #[test]
    fn timestamps_follow_append_order() {
        let log = ExecutionLog::new("test");
        log.append("first");
        log.append("second");

        let entries = log.snapshot();
        assert!(entries[0].at <= entries[1].at);
        assert!(entries[0].elapsed_ms <= entries[1].elapsed_ms);
        assert_eq!(vec!["first", "second"], log.messages());
    }
}

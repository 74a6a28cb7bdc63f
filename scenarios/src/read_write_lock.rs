use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thread_lab_runner::prelude::*;

const READS_PER_READER: usize = 3;
const WRITES_PER_WRITER: usize = 2;

/// Readers share a lock while writers take it exclusively. The log records every critical section
/// and is checked afterwards for a writer overlapping anyone else.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadWriteLockScenario;

impl ScenarioRunner for ReadWriteLockScenario {
    fn name(&self) -> &str {
        "read-write-lock"
    }

    fn title(&self) -> &str {
        "ReadWriteLock Demo"
    }

    fn description(&self, params: &ScenarioParameters) -> String {
        format!(
            "{} readers access the data concurrently while {} writers get exclusive access",
            params.worker_count(),
            params.writer_count()
        )
    }

    fn default_parameters(&self) -> ScenarioParameters {
        ScenarioParameters::default()
            .with_worker_count(3)
            .with_writer_count(2)
    }

    fn validate(&self, params: &ScenarioParameters) -> Result<(), String> {
        if params.worker_count() + params.writer_count() == 0 {
            return Err("at least one reader or writer is required".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) -> ExecuteResult {
        let params = ctx.params().clone();
        let data = Arc::new(RwLock::new(0usize));
        let reads = Arc::new(AtomicUsize::new(0));
        let writes = Arc::new(AtomicUsize::new(0));

        let mut group = ctx.worker_group();

        for id in 0..params.worker_count() {
            let data = data.clone();
            let reads = reads.clone();
            let read_time = params.work_delay();
            group.spawn(format!("Reader-{id}"), move |ctx| {
                for _ in 0..READS_PER_READER {
                    let value = read_interruptibly(&ctx, &data)?;
                    ctx.log(format!("Reader-{id}: ENTER read"));
                    let count = reads.fetch_add(1, Ordering::SeqCst) + 1;
                    ctx.log(format!(
                        "Reader-{id}: Read value {} (read count: {count})",
                        *value
                    ));
                    ctx.sleep(read_time)?;
                    ctx.log(format!("Reader-{id}: EXIT read"));
                }
                Ok(())
            })?;
        }

        for id in 0..params.writer_count() {
            let data = data.clone();
            let writes = writes.clone();
            let write_time = params.delay_units(2);
            group.spawn(format!("Writer-{id}"), move |ctx| {
                for _ in 0..WRITES_PER_WRITER {
                    let mut value = write_interruptibly(&ctx, &data)?;
                    ctx.log(format!("Writer-{id}: ENTER write"));
                    *value += 1;
                    let count = writes.fetch_add(1, Ordering::SeqCst) + 1;
                    ctx.log(format!(
                        "Writer-{id}: Wrote value {} (write count: {count})",
                        *value
                    ));
                    ctx.sleep(write_time)?;
                    ctx.log(format!("Writer-{id}: EXIT write"));
                }
                Ok(())
            })?;
        }

        let report = ctx.join(group);

        let final_value = *data.read();
        ctx.append(format!(
            "Final value: {}, reads: {}, writes: {}",
            final_value,
            reads.load(Ordering::SeqCst),
            writes.load(Ordering::SeqCst)
        ));

        let status = report.status();
        if !status.is_success() {
            return Ok(status);
        }

        if let Some(overlap) = find_overlap(&ctx.log().messages()) {
            ctx.append(format!("Exclusive access violated: {overlap}"));
            return Ok(RunStatus::Failed);
        }
        ctx.append("No writer overlapped any other reader or writer");

        if final_value != params.writer_count() * WRITES_PER_WRITER {
            ctx.append("Some writes were lost");
            return Ok(RunStatus::Failed);
        }

        Ok(RunStatus::Success)
    }
}

fn read_interruptibly<'a>(
    ctx: &WorkerContext,
    lock: &'a RwLock<usize>,
) -> Result<RwLockReadGuard<'a, usize>, WorkerInterruptedError> {
    ctx.acquire_interruptibly(|slice| lock.try_read_for(slice), "waiting for the read lock")
}

fn write_interruptibly<'a>(
    ctx: &WorkerContext,
    lock: &'a RwLock<usize>,
) -> Result<RwLockWriteGuard<'a, usize>, WorkerInterruptedError> {
    ctx.acquire_interruptibly(|slice| lock.try_write_for(slice), "waiting for the write lock")
}

/// Replay the ENTER/EXIT entries in log order and describe the first time a writer shared the lock.
///
/// Entries are appended while the lock is held, so the log order of critical sections matches the
/// order in which the lock was really held.
pub(crate) fn find_overlap(messages: &[String]) -> Option<String> {
    let mut readers = HashSet::new();
    let mut writer: Option<&str> = None;

    for message in messages {
        let Some((who, event)) = message.split_once(": ") else {
            continue;
        };

        match event {
            "ENTER read" => {
                if let Some(writer) = writer {
                    return Some(format!("{who} entered while {writer} was writing"));
                }
                readers.insert(who);
            }
            "EXIT read" => {
                readers.remove(who);
            }
            "ENTER write" => {
                if let Some(writer) = writer {
                    return Some(format!("{who} entered while {writer} was writing"));
                }
                if !readers.is_empty() {
                    return Some(format!(
                        "{who} entered while {} reader(s) were reading",
                        readers.len()
                    ));
                }
                writer = Some(who);
            }
            "EXIT write" => writer = None,
            _ => {}
        }
    }

    None
}

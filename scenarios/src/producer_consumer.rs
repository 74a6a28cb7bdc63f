use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use thread_lab_runner::prelude::*;

use crate::require_at_least_one;

/// One producer and `worker_count` consumers passing items through a bounded buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProducerConsumerScenario;

#[derive(Debug)]
struct Buffer {
    items: VecDeque<usize>,
    capacity: usize,
    /// Set by the producer once it has produced everything.
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    buffer: Mutex<Buffer>,
    not_full: Condvar,
    not_empty: Condvar,
    produced: AtomicUsize,
    consumed: AtomicUsize,
}

impl ScenarioRunner for ProducerConsumerScenario {
    fn name(&self) -> &str {
        "producer-consumer"
    }

    fn title(&self) -> &str {
        "Producer-Consumer with a bounded buffer"
    }

    fn description(&self, params: &ScenarioParameters) -> String {
        format!(
            "One producer hands {} items to {} consumer(s) through a buffer of {} slot(s), waiting while it is full or empty",
            params.item_count(),
            params.worker_count(),
            params.buffer_capacity()
        )
    }

    fn default_parameters(&self) -> ScenarioParameters {
        ScenarioParameters::default()
            .with_item_count(10)
            .with_worker_count(1)
            .with_buffer_capacity(1)
    }

    fn validate(&self, params: &ScenarioParameters) -> Result<(), String> {
        require_at_least_one("worker_count", params.worker_count())?;
        require_at_least_one("buffer_capacity", params.buffer_capacity())
    }

    fn execute(&self, ctx: &mut RunContext) -> ExecuteResult {
        let params = ctx.params().clone();
        let item_count = params.item_count();
        let shared = Arc::new(Shared {
            buffer: Mutex::new(Buffer {
                items: VecDeque::with_capacity(params.buffer_capacity()),
                capacity: params.buffer_capacity(),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            produced: AtomicUsize::new(0),
            consumed: AtomicUsize::new(0),
        });

        ctx.append(format!(
            "Starting Producer-Consumer with {} items and {} consumer(s)",
            item_count,
            params.worker_count()
        ));

        let mut group = ctx.worker_group();

        let producer_shared = shared.clone();
        let produce_delay = params.work_delay();
        group.spawn("Producer", move |ctx| {
            let shared = producer_shared;
            for item in 1..=item_count {
                {
                    let mut buffer = shared.buffer.lock();
                    ctx.wait_while(
                        &shared.not_full,
                        &mut buffer,
                        |b| b.items.len() >= b.capacity,
                        "waiting for a free slot",
                    )?;

                    buffer.items.push_back(item);
                    shared.produced.fetch_add(1, Ordering::SeqCst);
                    ctx.log(format!(
                        "PRODUCER: Produced item {} (buffer {}/{})",
                        item,
                        buffer.items.len(),
                        buffer.capacity
                    ));
                    shared.not_empty.notify_one();
                }

                ctx.sleep(produce_delay)?;
            }

            shared.buffer.lock().closed = true;
            shared.not_empty.notify_all();
            ctx.log(format!(
                "PRODUCER: Finished producing {item_count} items, closing the buffer"
            ));
            Ok(())
        })?;

        // Consumers are a little slower than the producer, so the buffer fills up.
        let consume_delay = params.delay_units(3) / 2;
        for id in 0..params.worker_count() {
            let shared = shared.clone();
            group.spawn(format!("Consumer-{id}"), move |ctx| loop {
                let item = {
                    let mut buffer = shared.buffer.lock();
                    ctx.wait_while(
                        &shared.not_empty,
                        &mut buffer,
                        |b| b.items.is_empty() && !b.closed,
                        "waiting for an item",
                    )?;

                    let item = buffer.items.pop_front();
                    if let Some(item) = item {
                        shared.consumed.fetch_add(1, Ordering::SeqCst);
                        ctx.log(format!("CONSUMER-{id}: Consumed item {item}"));
                        shared.not_full.notify_one();
                    }
                    item
                };

                match item {
                    Some(_) => ctx.sleep(consume_delay)?,
                    None => {
                        ctx.log(format!("CONSUMER-{id}: Buffer drained and closed, exiting"));
                        return Ok(());
                    }
                }
            })?;
        }

        let report = ctx.join(group);

        let produced = shared.produced.load(Ordering::SeqCst);
        let consumed = shared.consumed.load(Ordering::SeqCst);
        ctx.append(format!(
            "Produced {produced} items, consumed {consumed} items"
        ));

        let status = report.status();
        if !status.is_success() {
            return Ok(status);
        }
        if produced != item_count || consumed != produced {
            ctx.append(format!(
                "Expected {item_count} items to pass through the buffer"
            ));
            return Ok(RunStatus::Failed);
        }

        Ok(RunStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rejects_zero_consumers_and_zero_capacity() {
        let scenario = ProducerConsumerScenario;
        let params = scenario.default_parameters();

        assert!(scenario.validate(&params).is_ok());
        assert!(scenario
            .validate(&params.clone().with_worker_count(0))
            .is_err());
        assert!(scenario.validate(&params.with_buffer_capacity(0)).is_err());
    }

    #[test]
    fn each_item_is_produced_before_it_is_consumed() {
        let scenario = ProducerConsumerScenario;
        let params = scenario
            .default_parameters()
            .with_item_count(5)
            .with_work_delay(Duration::from_millis(1));

        let result = scenario.run(&params);

        assert_eq!(RunStatus::Success, result.status);
        for item in 1..=5 {
            let produced = result
                .position_of(&format!("Produced item {item} "))
                .unwrap();
            let consumed = result
                .position_of(&format!("Consumed item {item}"))
                .unwrap();
            assert!(produced < consumed);
        }
    }
}

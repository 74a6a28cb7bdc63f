use std::sync::Arc;

use itertools::Itertools;
use parking_lot::{Condvar, Mutex};
use thread_lab_runner::prelude::*;

/// Two threads take turns printing the numbers from 1 to `item_count`, one the odd numbers and one
/// the even numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct OddEvenScenario;

#[derive(Debug)]
struct Turn {
    next: Mutex<usize>,
    changed: Condvar,
}

impl ScenarioRunner for OddEvenScenario {
    fn name(&self) -> &str {
        "odd-even"
    }

    fn title(&self) -> &str {
        "Odd/Even Number Printing"
    }

    fn description(&self, params: &ScenarioParameters) -> String {
        format!(
            "Two threads print the numbers 1 to {} alternately",
            params.item_count()
        )
    }

    fn default_parameters(&self) -> ScenarioParameters {
        ScenarioParameters::default().with_item_count(20)
    }

    fn execute(&self, ctx: &mut RunContext) -> ExecuteResult {
        let max = ctx.params().item_count();
        let turn = Arc::new(Turn {
            next: Mutex::new(1),
            changed: Condvar::new(),
        });

        let mut group = ctx.worker_group();
        for (label, parity) in [("ODD", 1), ("EVEN", 0)] {
            let turn = turn.clone();
            group.spawn(format!("{label} Thread"), move |ctx| loop {
                let mut next = turn.next.lock();
                ctx.wait_while(
                    &turn.changed,
                    &mut next,
                    |n| *n <= max && *n % 2 != parity,
                    "waiting for its turn",
                )?;
                if *next > max {
                    return Ok(());
                }

                ctx.log(format!("{label} Thread: {}", *next));
                *next += 1;
                turn.changed.notify_all();
            })?;
        }

        let report = ctx.join(group);
        let status = report.status();
        if !status.is_success() {
            return Ok(status);
        }

        let printed = ctx
            .log()
            .messages()
            .iter()
            .filter_map(|m| m.split_once(" Thread: "))
            .filter_map(|(_, n)| n.parse::<usize>().ok())
            .collect::<Vec<_>>();
        let in_order = printed.len() == max
            && printed.first().map_or(true, |first| *first == 1)
            && printed.iter().tuple_windows().all(|(a, b)| b == &(a + 1));

        if in_order {
            ctx.append(format!("Printed 1 to {max} in order"));
            Ok(RunStatus::Success)
        } else {
            ctx.append(format!("Numbers were printed out of order: {printed:?}"));
            Ok(RunStatus::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_alternate() {
        let scenario = OddEvenScenario;
        let result = scenario.run(&scenario.default_parameters().with_item_count(9));

        assert_eq!(RunStatus::Success, result.status);
        let printed = result
            .messages()
            .into_iter()
            .filter(|m| m.contains(" Thread: "))
            .collect::<Vec<_>>();
        assert_eq!("ODD Thread: 1", printed[0]);
        assert_eq!("EVEN Thread: 2", printed[1]);
        assert_eq!("ODD Thread: 9", printed[8]);
    }

    #[test]
    fn nothing_to_print() {
        let scenario = OddEvenScenario;
        let result = scenario.run(&scenario.default_parameters().with_item_count(0));

        assert_eq!(RunStatus::Success, result.status);
        assert_eq!(0, result.count_of(" Thread: "));
    }
}

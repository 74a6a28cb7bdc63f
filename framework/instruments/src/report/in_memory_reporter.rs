mod runs_table;

use crate::report::in_memory_reporter::runs_table::RunRow;
use crate::report::ReportCollector;
use std::collections::BTreeMap;
use tabled::settings::Style;
use tabled::Table;
use thread_lab_summary_model::{RunResult, RunStatus};

/// A very basic reporter that keeps every finished run in memory and prints a summary table of the
/// runs, grouped by scenario, when it is finalized.
#[derive(Debug, Default)]
pub struct InMemoryReporter {
    run_results: Vec<RunResult>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> &[RunResult] {
        &self.run_results
    }

    /// True if every collected run succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.run_results.iter().all(|r| r.status.is_success())
    }

    pub(crate) fn rows(&self) -> Vec<RunRow> {
        self.run_results
            .iter()
            .fold(BTreeMap::<&str, Vec<&RunResult>>::new(), |mut acc, run| {
                acc.entry(run.scenario_name.as_str()).or_default().push(run);
                acc
            })
            .into_iter()
            .map(|(scenario, runs)| {
                let count_status =
                    |status: RunStatus| runs.iter().filter(|r| r.status == status).count();
                let total_ms = runs.iter().map(|r| r.duration_ms).sum::<u64>();

                RunRow {
                    scenario: scenario.to_string(),
                    runs: runs.len(),
                    succeeded: count_status(RunStatus::Success),
                    failed: count_status(RunStatus::Failed),
                    timed_out: count_status(RunStatus::TimedOut),
                    avg_time_ms: total_ms as f64 / runs.len() as f64,
                    min_time_ms: runs.iter().map(|r| r.duration_ms).min().unwrap_or_default(),
                    max_time_ms: runs.iter().map(|r| r.duration_ms).max().unwrap_or_default(),
                    log_entries: runs.iter().map(|r| r.log.len()).sum(),
                }
            })
            .collect()
    }

    /// Render the summary table without printing it.
    pub fn summary_table(&self) -> String {
        let mut table = Table::new(self.rows());
        table.with(Style::modern());
        table.to_string()
    }
}

impl ReportCollector for InMemoryReporter {
    fn add_run(&mut self, run_result: &RunResult) {
        log::debug!(
            "Collected run {} of {} with status {}",
            run_result.run_id,
            run_result.scenario_name,
            run_result.status
        );
        self.run_results.push(run_result.clone());
    }

    fn finalize(&self) {
        println!("\nSummary of runs");
        println!("{}", self.summary_table());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn run(scenario: &str, status: RunStatus, duration_ms: u64) -> RunResult {
        RunResult {
            run_id: format!("{scenario}-{duration_ms}"),
            scenario_name: scenario.to_string(),
            title: scenario.to_string(),
            status,
            description: String::new(),
            log: Vec::new(),
            started_at: Utc::now(),
            duration_ms,
            thread_info: String::new(),
            parameters: HashMap::new(),
        }
    }

    #[test]
    fn rows_are_grouped_by_scenario() {
        let mut reporter = InMemoryReporter::new();
        reporter.add_run(&run("deadlock", RunStatus::Success, 10));
        reporter.add_run(&run("deadlock", RunStatus::TimedOut, 30));
        reporter.add_run(&run("singleton", RunStatus::Failed, 5));

        let rows = reporter.rows();
        assert_eq!(2, rows.len());

        let deadlock = &rows[0];
        assert_eq!("deadlock", deadlock.scenario);
        assert_eq!(2, deadlock.runs);
        assert_eq!(1, deadlock.succeeded);
        assert_eq!(1, deadlock.timed_out);
        assert_eq!(20.0, deadlock.avg_time_ms);
        assert_eq!(10, deadlock.min_time_ms);
        assert_eq!(30, deadlock.max_time_ms);

        assert_eq!(1, rows[1].failed);
        assert!(!reporter.all_succeeded());
    }

    #[test]
    fn table_mentions_every_scenario() {
        let mut reporter = InMemoryReporter::new();
        reporter.add_run(&run("odd-even", RunStatus::Success, 1));
        reporter.add_run(&run("thread-pool", RunStatus::Success, 2));

        let table = reporter.summary_table();
        assert!(table.contains("odd-even"));
        assert!(table.contains("thread-pool"));
        assert!(table.contains("Avg ms"));
        assert!(reporter.all_succeeded());
    }
}

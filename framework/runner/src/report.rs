use thread_lab_core::prelude::ExecutionLog;
use thread_lab_instruments::OperationRecord;
use thread_lab_summary_model::{RunResult, RunStatus};

use crate::params::ScenarioParameters;

/// Everything a finished run produced, before it is packaged.
#[derive(Debug)]
pub struct RawRun<'a> {
    pub scenario_name: &'a str,
    pub title: &'a str,
    pub description: String,
    pub params: &'a ScenarioParameters,
    pub record: OperationRecord,
    pub log: &'a ExecutionLog,
    pub status: RunStatus,
    pub thread_info: String,
}

/// Packages the raw output of a run into an immutable [RunResult].
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultReporter;

impl ResultReporter {
    pub fn package(raw: RawRun<'_>) -> RunResult {
        let RawRun {
            scenario_name,
            title,
            description,
            params,
            mut record,
            log,
            status,
            thread_info,
        } = raw;

        let duration = record.finish();

        RunResult {
            run_id: nanoid::nanoid!(),
            scenario_name: scenario_name.to_string(),
            title: title.to_string(),
            status,
            description,
            log: log.snapshot(),
            started_at: record.started_at(),
            duration_ms: duration.as_millis() as u64,
            thread_info,
            parameters: params.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_copies_log_and_timing() {
        let log = ExecutionLog::new("demo");
        log.append("one");
        log.append("two");
        let params = ScenarioParameters::default().with_item_count(3);
        let record = OperationRecord::new("demo");

        let result = ResultReporter::package(RawRun {
            scenario_name: "demo",
            title: "Demo",
            description: "A demo".to_string(),
            params: &params,
            record: record.clone(),
            log: &log,
            status: RunStatus::Success,
            thread_info: "main".to_string(),
        });

        assert_eq!("demo", result.scenario_name);
        assert_eq!(vec!["one", "two"], result.messages());
        assert_eq!(record.started_at(), result.started_at);
        assert_eq!("3", result.parameters["item_count"]);
        assert!(!result.run_id.is_empty());
    }
}

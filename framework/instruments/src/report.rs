mod in_memory_reporter;

use thread_lab_summary_model::RunResult;

pub use in_memory_reporter::InMemoryReporter;

pub trait ReportCollector {
    fn add_run(&mut self, run_result: &RunResult);

    fn finalize(&self);
}

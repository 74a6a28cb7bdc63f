use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io::{BufRead, Read, Write};
use std::path::Path;

/// The final status of a scenario run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Every worker finished and the scenario's own checks passed.
    Success,
    /// A worker failed, was interrupted, or the scenario's checks did not hold.
    Failed,
    /// The run exceeded its wall-clock budget.
    TimedOut,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
            RunStatus::TimedOut => "TIMED_OUT",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One narration line written by a worker or by the runner itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    /// Wall clock time of the append.
    pub at: DateTime<Utc>,
    /// Milliseconds since the run started.
    pub elapsed_ms: u64,
    /// Name of the thread that appended the entry.
    pub thread: String,
    pub message: String,
}

/// The structured outcome of one scenario execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name the scenario is registered under
    pub scenario_name: String,
    /// Human friendly title of the scenario
    pub title: String,
    pub status: RunStatus,
    /// What the run demonstrated, for the parameters it was given
    pub description: String,
    /// Every entry of the run's execution log, in append order
    ///
    /// The order respects the happens-before edges created by the scenario's own primitives, and
    /// nothing stronger.
    pub log: Vec<LogEntry>,
    /// The time the run started
    pub started_at: DateTime<Utc>,
    /// Wall clock duration of the run, in milliseconds
    pub duration_ms: u64,
    /// Summary of the threads that took part in the run
    pub thread_info: String,
    /// The parameters the run was configured with, rendered as strings
    pub parameters: HashMap<String, String>,
}

impl RunResult {
    /// The message text of each log entry, in order.
    pub fn messages(&self) -> Vec<&str> {
        self.log.iter().map(|e| e.message.as_str()).collect()
    }

    /// Position of the first log entry whose message contains `needle`.
    pub fn position_of(&self, needle: &str) -> Option<usize> {
        self.log.iter().position(|e| e.message.contains(needle))
    }

    /// Number of log entries whose message contains `needle`.
    pub fn count_of(&self, needle: &str) -> usize {
        self.log
            .iter()
            .filter(|e| e.message.contains(needle))
            .count()
    }

    /// Compute a fingerprint for the configuration of this run
    ///
    /// Runs of the same scenario with the same parameters share a fingerprint. It uses the
    ///     - Scenario name
    ///     - Parameters, sorted by name
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        self.parameters
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run result to a file
///
/// The result will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_result(run_result: &RunResult, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_result(run_result, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run result to a writer
pub fn store_run_result<W: Write>(run_result: &RunResult, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_result)?;
    Ok(())
}

/// Load a single run result from a reader
pub fn load_run_result<R: Read>(reader: R) -> anyhow::Result<RunResult> {
    let reader = std::io::BufReader::new(reader);
    let run_result: RunResult = serde_json::from_reader(reader)?;
    Ok(run_result)
}

/// Load run results from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_result]. Blank lines are skipped.
pub fn load_run_results(path: impl AsRef<Path>) -> anyhow::Result<Vec<RunResult>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunResult = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(scenario_name: &str, items: &str) -> RunResult {
        let at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        RunResult {
            run_id: "run-1".to_string(),
            scenario_name: scenario_name.to_string(),
            title: "Sample".to_string(),
            status: RunStatus::Success,
            description: "A sample".to_string(),
            log: vec![
                LogEntry {
                    at,
                    elapsed_ms: 0,
                    thread: "main".to_string(),
                    message: "Worker-0: started".to_string(),
                },
                LogEntry {
                    at,
                    elapsed_ms: 3,
                    thread: "worker-0".to_string(),
                    message: "Worker-0: done".to_string(),
                },
            ],
            started_at: at,
            duration_ms: 3,
            thread_info: "main".to_string(),
            parameters: HashMap::from([
                ("item_count".to_string(), items.to_string()),
                ("worker_count".to_string(), "2".to_string()),
            ]),
        }
    }

    #[test]
    fn status_serializes_as_upper_snake_case() {
        let json = serde_json::to_string(&RunStatus::TimedOut).unwrap();
        assert_eq!("\"TIMED_OUT\"", json);
        assert_eq!("SUCCESS", RunStatus::Success.to_string());
    }

    #[test]
    fn fingerprint_depends_on_configuration_only() {
        let a = sample("latch", "10");
        let mut b = sample("latch", "10");
        b.run_id = "run-2".to_string();
        b.duration_ms = 500;
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = sample("latch", "11");
        assert_ne!(a.fingerprint(), c.fingerprint());

        let d = sample("barrier", "10");
        assert_ne!(a.fingerprint(), d.fingerprint());
    }

    #[test]
    fn log_helpers_find_messages() {
        let run = sample("latch", "1");
        assert_eq!(vec!["Worker-0: started", "Worker-0: done"], run.messages());
        assert_eq!(Some(1), run.position_of("done"));
        assert_eq!(2, run.count_of("Worker-0"));
        assert_eq!(None, run.position_of("missing"));
    }
}

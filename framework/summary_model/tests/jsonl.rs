use chrono::Utc;
use std::collections::HashMap;
use thread_lab_summary_model::{
    append_run_result, load_run_result, load_run_results, store_run_result, LogEntry, RunResult,
    RunStatus,
};

fn run_result(run_id: &str, status: RunStatus) -> RunResult {
    let now = Utc::now();
    RunResult {
        run_id: run_id.to_string(),
        scenario_name: "countdown-latch".to_string(),
        title: "CountDownLatch Demo".to_string(),
        status,
        description: "Workers count down".to_string(),
        log: vec![LogEntry {
            at: now,
            elapsed_ms: 1,
            thread: "coordinator".to_string(),
            message: "Coordinator: proceeding".to_string(),
        }],
        started_at: now,
        duration_ms: 12,
        thread_info: "dispatched from main".to_string(),
        parameters: HashMap::from([("worker_count".to_string(), "4".to_string())]),
    }
}

#[test]
fn appended_results_are_loaded_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.jsonl");

    let first = run_result("a", RunStatus::Success);
    let second = run_result("b", RunStatus::TimedOut);
    append_run_result(&first, &path).unwrap();
    append_run_result(&second, &path).unwrap();

    let loaded = load_run_results(&path).unwrap();
    pretty_assertions::assert_eq!(vec![first, second], loaded);
}

#[test]
fn stored_result_is_single_json_document() {
    let original = run_result("c", RunStatus::Failed);
    let mut buf = Vec::new();
    store_run_result(&original, &mut buf).unwrap();

    let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
    assert_eq!("FAILED", json["status"]);
    assert_eq!(12, json["duration_ms"]);
    assert!(json["started_at"].as_str().unwrap().contains('T'));

    let loaded = load_run_result(buf.as_slice()).unwrap();
    pretty_assertions::assert_eq!(original, loaded);
}

#[test]
fn missing_results_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_run_results(dir.path().join("nope.jsonl")).is_err());
}

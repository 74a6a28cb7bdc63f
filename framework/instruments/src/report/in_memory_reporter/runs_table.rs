use tabled::Tabled;

#[derive(Tabled)]
pub struct RunRow {
    #[tabled(rename = "Scenario")]
    pub scenario: String,
    #[tabled(rename = "Runs")]
    pub runs: usize,
    #[tabled(rename = "Succeeded")]
    pub succeeded: usize,
    #[tabled(rename = "Failed")]
    pub failed: usize,
    #[tabled(rename = "Timed out")]
    pub timed_out: usize,
    #[tabled(rename = "Avg ms", display = "float2")]
    pub avg_time_ms: f64,
    #[tabled(rename = "Min ms")]
    pub min_time_ms: u64,
    #[tabled(rename = "Max ms")]
    pub max_time_ms: u64,
    #[tabled(rename = "Log entries")]
    pub log_entries: usize,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

/// Longest wall-clock budget a run may ask for.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest base unit of simulated work.
pub const MAX_WORK_DELAY: Duration = Duration::from_secs(60 * 60);

/// The kind of thread pool the thread pool scenario builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PoolKind {
    /// A fixed number of worker threads sharing one queue.
    #[default]
    Fixed,
    /// Grows a new worker whenever no idle worker is available, idle workers retire after a
    /// keep-alive period.
    Cached,
    /// A single worker thread, tasks run strictly in submission order.
    Single,
}

impl Display for PoolKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PoolKind::Fixed => "fixed",
            PoolKind::Cached => "cached",
            PoolKind::Single => "single",
        };
        f.write_str(s)
    }
}

impl FromStr for PoolKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(PoolKind::Fixed),
            "cached" => Ok(PoolKind::Cached),
            "single" => Ok(PoolKind::Single),
            other => Err(anyhow::anyhow!("Unknown pool kind: {other}")),
        }
    }
}

/// Configuration for one scenario run.
///
/// Built once per request, starting either from [ScenarioParameters::default] or from a runner's
/// own defaults, and never changed after it has been handed to a runner. Each scenario reads the
/// fields that make sense for it and ignores the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioParameters {
    worker_count: usize,
    writer_count: usize,
    item_count: usize,
    phase_count: usize,
    buffer_capacity: usize,
    pool_kind: PoolKind,
    apply_fix: bool,
    inject_failure: bool,
    work_delay: Duration,
    timeout: Duration,
}

impl Default for ScenarioParameters {
    fn default() -> Self {
        Self {
            worker_count: 4,
            writer_count: 2,
            item_count: 10,
            phase_count: 2,
            buffer_capacity: 1,
            pool_kind: PoolKind::Fixed,
            apply_fix: false,
            inject_failure: false,
            work_delay: Duration::from_millis(100),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ScenarioParameters {
    /// Worker threads: consumers, racing threads, latch workers, barrier parties, readers, or the
    /// size of a fixed pool.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn writer_count(&self) -> usize {
        self.writer_count
    }

    /// Items to produce, tasks to submit, or the highest number to print.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn phase_count(&self) -> usize {
        self.phase_count
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    pub fn pool_kind(&self) -> PoolKind {
        self.pool_kind
    }

    pub fn apply_fix(&self) -> bool {
        self.apply_fix
    }

    pub fn inject_failure(&self) -> bool {
        self.inject_failure
    }

    /// Base unit of simulated work. Scenarios scale it per role.
    pub fn work_delay(&self) -> Duration {
        self.work_delay
    }

    /// Overall wall-clock budget for the run.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Checks that apply to every scenario, made before the scenario's own validation.
    pub fn check_common(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        if self.timeout > MAX_TIMEOUT {
            return Err(format!("timeout must be at most {}s", MAX_TIMEOUT.as_secs()));
        }
        if self.work_delay > MAX_WORK_DELAY {
            return Err(format!(
                "work_delay must be at most {}s",
                MAX_WORK_DELAY.as_secs()
            ));
        }
        Ok(())
    }

    /// `work_delay` scaled by `factor`.
    pub fn delay_units(&self, factor: u32) -> Duration {
        self.work_delay.saturating_mul(factor)
    }

    /// `base` units of work plus one more unit per position, so later workers finish later.
    pub fn staggered_delay(&self, base: u32, position: usize) -> Duration {
        let position = u32::try_from(position).unwrap_or(u32::MAX);
        self.delay_units(base).saturating_add(self.delay_units(position))
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_writer_count(mut self, writer_count: usize) -> Self {
        self.writer_count = writer_count;
        self
    }

    pub fn with_item_count(mut self, item_count: usize) -> Self {
        self.item_count = item_count;
        self
    }

    pub fn with_phase_count(mut self, phase_count: usize) -> Self {
        self.phase_count = phase_count;
        self
    }

    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    pub fn with_pool_kind(mut self, pool_kind: PoolKind) -> Self {
        self.pool_kind = pool_kind;
        self
    }

    pub fn with_apply_fix(mut self, apply_fix: bool) -> Self {
        self.apply_fix = apply_fix;
        self
    }

    pub fn with_inject_failure(mut self, inject_failure: bool) -> Self {
        self.inject_failure = inject_failure;
        self
    }

    pub fn with_work_delay(mut self, work_delay: Duration) -> Self {
        self.work_delay = work_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Every field rendered as a string, for the run result.
    pub fn describe(&self) -> HashMap<String, String> {
        HashMap::from([
            ("worker_count".to_string(), self.worker_count.to_string()),
            ("writer_count".to_string(), self.writer_count.to_string()),
            ("item_count".to_string(), self.item_count.to_string()),
            ("phase_count".to_string(), self.phase_count.to_string()),
            ("buffer_capacity".to_string(), self.buffer_capacity.to_string()),
            ("pool_kind".to_string(), self.pool_kind.to_string()),
            ("apply_fix".to_string(), self.apply_fix.to_string()),
            ("inject_failure".to_string(), self.inject_failure.to_string()),
            (
                "work_delay_ms".to_string(),
                self.work_delay.as_millis().to_string(),
            ),
            ("timeout_ms".to_string(), self.timeout.as_millis().to_string()),
        ])
    }
}

/// Partial parameters supplied by a caller, laid over a runner's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterOverrides {
    pub worker_count: Option<usize>,
    pub writer_count: Option<usize>,
    pub item_count: Option<usize>,
    pub phase_count: Option<usize>,
    pub buffer_capacity: Option<usize>,
    pub pool_kind: Option<PoolKind>,
    pub apply_fix: Option<bool>,
    pub inject_failure: Option<bool>,
    pub work_delay: Option<Duration>,
    pub timeout: Option<Duration>,
}

impl ParameterOverrides {
    pub fn apply(&self, base: ScenarioParameters) -> ScenarioParameters {
        ScenarioParameters {
            worker_count: self.worker_count.unwrap_or(base.worker_count),
            writer_count: self.writer_count.unwrap_or(base.writer_count),
            item_count: self.item_count.unwrap_or(base.item_count),
            phase_count: self.phase_count.unwrap_or(base.phase_count),
            buffer_capacity: self.buffer_capacity.unwrap_or(base.buffer_capacity),
            pool_kind: self.pool_kind.unwrap_or(base.pool_kind),
            apply_fix: self.apply_fix.unwrap_or(base.apply_fix),
            inject_failure: self.inject_failure.unwrap_or(base.inject_failure),
            work_delay: self.work_delay.unwrap_or(base.work_delay),
            timeout: self.timeout.unwrap_or(base.timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_replace_what_is_set() {
        let base = ScenarioParameters::default()
            .with_worker_count(3)
            .with_item_count(7);
        let overrides = ParameterOverrides {
            item_count: Some(1000),
            pool_kind: Some(PoolKind::Cached),
            ..Default::default()
        };

        let params = overrides.apply(base);
        assert_eq!(3, params.worker_count());
        assert_eq!(1000, params.item_count());
        assert_eq!(PoolKind::Cached, params.pool_kind());
        assert_eq!(Duration::from_secs(10), params.timeout());
    }

    #[test]
    fn out_of_range_durations_are_rejected() {
        let params = ScenarioParameters::default();
        assert_eq!(Ok(()), params.check_common());
        assert_eq!(Ok(()), params.clone().with_timeout(MAX_TIMEOUT).check_common());
        assert!(params
            .clone()
            .with_timeout(Duration::from_secs(u64::MAX))
            .check_common()
            .is_err());
        assert!(params
            .clone()
            .with_work_delay(MAX_WORK_DELAY + Duration::from_millis(1))
            .check_common()
            .is_err());
    }

    #[test]
    fn delay_arithmetic_saturates() {
        let params = ScenarioParameters::default().with_work_delay(Duration::from_millis(10));
        assert_eq!(Duration::from_millis(30), params.delay_units(3));
        assert_eq!(Duration::from_millis(70), params.staggered_delay(5, 2));

        let huge = ScenarioParameters::default().with_work_delay(Duration::MAX);
        assert_eq!(Duration::MAX, huge.delay_units(2));
        assert_eq!(Duration::MAX, huge.staggered_delay(2, usize::MAX));
    }

    #[test]
    fn pool_kind_parses_case_insensitively() {
        assert_eq!(PoolKind::Fixed, "FIXED".parse().unwrap());
        assert_eq!(PoolKind::Single, "single".parse().unwrap());
        assert!("elastic".parse::<PoolKind>().is_err());
    }

    #[test]
    fn describe_lists_every_field() {
        let described = ScenarioParameters::default()
            .with_work_delay(Duration::from_millis(5))
            .describe();
        assert_eq!(10, described.len());
        assert_eq!("5", described["work_delay_ms"]);
        assert_eq!("fixed", described["pool_kind"]);
    }
}

use std::time::Duration;

use anyhow::Context;
use thread_lab_runner::prelude::*;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How many runtime threads the composition runs on.
const ASYNC_WORKERS: usize = 4;

/// Three independent async units run concurrently and their results are composed: one is chained
/// into a follow-up step and two are combined into one value.
#[derive(Debug, Default, Clone, Copy)]
pub struct FutureCompositionScenario;

enum Composition {
    Completed(String),
    TimedOut,
}

impl ScenarioRunner for FutureCompositionScenario {
    fn name(&self) -> &str {
        "future-composition"
    }

    fn title(&self) -> &str {
        "Future Composition Demo"
    }

    fn description(&self, params: &ScenarioParameters) -> String {
        let mut description =
            "Email, report and notification units run concurrently and their results are chained and combined"
                .to_string();
        if params.inject_failure() {
            description.push_str(", with the report unit set up to fail");
        }
        description
    }

    fn execute(&self, ctx: &mut RunContext) -> ExecuteResult {
        let params = ctx.params().clone();
        let log = ctx.log().clone();
        let budget = ctx.remaining();

        let executor = ctx.executor(ASYNC_WORKERS)?;
        let composition = executor.execute_in_place(compose(log, params, budget));
        executor.shutdown(Duration::from_millis(100));

        match composition? {
            Composition::Completed(summary) => {
                ctx.append(format!("Composed result: {summary}"));
                Ok(RunStatus::Success)
            }
            Composition::TimedOut => {
                ctx.append(format!(
                    "Timed out after {budget:?} waiting for the async units"
                ));
                Ok(RunStatus::TimedOut)
            }
        }
    }
}

async fn compose(
    log: ExecutionLog,
    params: ScenarioParameters,
    budget: Duration,
) -> anyhow::Result<Composition> {
    log.append("Starting asynchronous operations...");

    let email = tokio::spawn(unit(log.clone(), "Email", params.delay_units(10), false));
    let report = tokio::spawn(unit(
        log.clone(),
        "Report",
        params.delay_units(15),
        params.inject_failure(),
    ));
    let notification = tokio::spawn(unit(log.clone(), "Notification", params.delay_units(5), false));

    let (email_tx, email_rx) = oneshot::channel();

    let chained_log = log.clone();
    let chain_delay = params.delay_units(5);
    let chained = async move {
        let email = joined(email).await?;
        // The combining step waits for this, it does not care if nobody is listening.
        let _ = email_tx.send(email.clone());

        chained_log.append(format!("Chained task processing: {email}"));
        tokio::time::sleep(chain_delay).await;
        let chained = format!("Chained result: {email}");
        chained_log.append(format!("Chained task result: {chained}"));
        anyhow::Ok(chained)
    };

    let combined_log = log.clone();
    let combined = async move {
        let report = joined(report).await?;
        let email = email_rx
            .await
            .context("The email unit finished without a result")?;

        combined_log.append(format!("Combining results: {email} + {report}"));
        let combined = format!("{email} + {report}");
        combined_log.append(format!("Combined result: {combined}"));
        anyhow::Ok(combined)
    };

    let all = async {
        let (chained, combined, notification) =
            tokio::try_join!(chained, combined, joined(notification))?;
        log.append("All tasks completed!");
        anyhow::Ok(format!("{chained}; {combined}; {notification}"))
    };

    match tokio::time::timeout(budget, all).await {
        Ok(result) => result.map(Composition::Completed),
        Err(_) => Ok(Composition::TimedOut),
    }
}

/// One simulated unit of async work.
async fn unit(
    log: ExecutionLog,
    name: &'static str,
    delay: Duration,
    fail: bool,
) -> anyhow::Result<String> {
    log.append(format!(
        "{name}: Started on {}",
        std::thread::current().name().unwrap_or("unnamed")
    ));
    tokio::time::sleep(delay).await;

    if fail {
        anyhow::bail!("{name} unit failed (injected failure)");
    }

    let result = format!("{name} completed");
    log.append(format!("{name}: {result}"));
    Ok(result)
}

async fn joined(handle: JoinHandle<anyhow::Result<String>>) -> anyhow::Result<String> {
    handle.await.context("Async unit panicked or was cancelled")?
}

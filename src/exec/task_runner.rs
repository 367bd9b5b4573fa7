// src/exec/task_runner.rs

//! Individual task run.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::block::run_block;
use crate::exec::runner::StepRunner;

/// Run a task's block and emit a `TaskCompleted` event with the report.
///
/// If the future is dropped (shutdown abort), no `TaskCompleted` event is
/// sent for that run.
pub async fn run_task(
    task: ScheduledTask,
    runner: &dyn StepRunner,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let task_name = task.name.clone();
    let slot = task.slot;
    if let Err(err) = run_task_inner(task, runner, &runtime_tx).await {
        error!(
            task = %task_name,
            %slot,
            error = %err,
            "task execution error"
        );
    }
}

async fn run_task_inner(
    task: ScheduledTask,
    runner: &dyn StepRunner,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> Result<()> {
    info!(
        task = %task.name,
        slot = %task.slot,
        steps = task.steps.len(),
        "starting task"
    );

    let report = run_block(&task.name, &task.steps, task.slot.at(), runner, task.timeout).await;
    let outcome = report.outcome();

    info!(
        task = %task.name,
        slot = %task.slot,
        success = outcome == TaskOutcome::Success,
        steps_run = report.steps.len(),
        "task finished"
    );

    runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            slot: task.slot,
            report,
        })
        .await
        .with_context(|| {
            format!(
                "sending TaskCompleted event for task '{}' to runtime",
                task.name
            )
        })?;

    Ok(())
}

// src/exec/executor_loop.rs

//! Main executor loop that manages running task blocks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskName};
use crate::exec::block::BlockReport;
use crate::exec::runner::StepRunner;
use crate::exec::task_runner::run_task;
use crate::trigger::SlotKey;

/// Messages accepted by the executor loop.
#[derive(Debug)]
pub enum ExecutorMessage {
    Run(ScheduledTask),
    /// Stop accepting work, give in-flight runs `grace` to finish, then kill
    /// what is left and acknowledge on `done`.
    Shutdown {
        grace: Duration,
        done: oneshot::Sender<()>,
    },
}

/// Bookkeeping for a spawned run, keyed by its Tokio task id.
#[derive(Debug)]
struct ActiveTask {
    name: TaskName,
    slot: SlotKey,
}

/// Spawn the background executor loop.
///
/// The returned sender is what `RealExecutorBackend` forwards scheduled tasks
/// to. Each scheduled task runs in its own Tokio task, but **at most
/// `max_parallel` blocks execute at the same time**; the rest wait for a
/// permit in arrival order.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    runner: Arc<dyn StepRunner>,
    max_parallel: usize,
) -> mpsc::Sender<ExecutorMessage> {
    let (tx, mut rx) = mpsc::channel::<ExecutorMessage>(32);

    tokio::spawn(async move {
        info!(max_parallel, "executor loop started");

        let permits = Arc::new(Semaphore::new(max_parallel.max(1)));
        let mut running: JoinSet<()> = JoinSet::new();
        let mut active: HashMap<Id, ActiveTask> = HashMap::new();

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(ExecutorMessage::Run(task)) => {
                        handle_scheduled_task(task, &permits, &runner, &runtime_tx, &mut running, &mut active);
                    }
                    Some(ExecutorMessage::Shutdown { grace, done }) => {
                        permits.close();
                        drain_with_grace(&mut running, &mut active, &runtime_tx, grace).await;
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        permits.close();
                        drain_with_grace(&mut running, &mut active, &runtime_tx, Duration::ZERO).await;
                        break;
                    }
                },
                Some(joined) = running.join_next_with_id(), if !running.is_empty() => {
                    reap(joined, &mut active, &runtime_tx).await;
                }
            }
        }

        info!("executor loop finished");
    });

    tx
}

/// Handle a newly scheduled task.
fn handle_scheduled_task(
    task: ScheduledTask,
    permits: &Arc<Semaphore>,
    runner: &Arc<dyn StepRunner>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    running: &mut JoinSet<()>,
    active: &mut HashMap<Id, ActiveTask>,
) {
    let name = task.name.clone();
    let slot = task.slot;

    let permits = Arc::clone(permits);
    let runner = Arc::clone(runner);
    let rt_tx = runtime_tx.clone();
    let spawn_name = name.clone();

    let handle = running.spawn(async move {
        // A closed semaphore means shutdown started before this run got a
        // worker; it never starts.
        let Ok(_permit) = permits.acquire_owned().await else {
            debug!(task = %spawn_name, %slot, "shutdown before start; run dropped");
            return;
        };
        run_task(task, runner.as_ref(), rt_tx).await;
        debug!(task = %spawn_name, %slot, "task runner future finished");
    });

    active.insert(handle.id(), ActiveTask { name, slot });
}

/// Forget a finished run.
///
/// A run that panicked never reported back, so its completion is sent here
/// as a failure; otherwise its ledger record would stay `Running` and hold
/// back every later slot of the task.
async fn reap(
    joined: Result<(Id, ()), JoinError>,
    active: &mut HashMap<Id, ActiveTask>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    let err = match joined {
        Ok((id, ())) => {
            active.remove(&id);
            return;
        }
        Err(err) => err,
    };

    let Some(task) = active.remove(&err.id()) else {
        return;
    };
    if !err.is_panic() {
        return;
    }

    error!(task = %task.name, slot = %task.slot, "task runner panicked");
    let event = RuntimeEvent::TaskCompleted {
        task: task.name.clone(),
        slot: task.slot,
        report: BlockReport::aborted("task runner panicked".to_string()),
    };
    if runtime_tx.send(event).await.is_err() {
        warn!(task = %task.name, slot = %task.slot, "runtime gone; panic not recorded");
    }
}

/// Wait up to `grace` for in-flight runs, then abort the rest.
///
/// Aborting drops the runner futures, and with them the child processes
/// (spawned with `kill_on_drop`).
async fn drain_with_grace(
    running: &mut JoinSet<()>,
    active: &mut HashMap<Id, ActiveTask>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    grace: Duration,
) {
    if running.is_empty() {
        return;
    }

    info!(in_flight = active.len(), ?grace, "waiting for in-flight tasks");

    let drained = tokio::time::timeout(grace, async {
        while let Some(joined) = running.join_next_with_id().await {
            reap(joined, active, runtime_tx).await;
        }
    })
    .await;

    if drained.is_err() {
        for task in active.values() {
            warn!(task = %task.name, slot = %task.slot, "grace period over; killing task");
        }
        running.shutdown().await;
        active.clear();
    }
}

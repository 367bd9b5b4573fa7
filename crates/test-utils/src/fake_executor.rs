use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use clockdag::dag::ScheduledTask;
use clockdag::engine::RuntimeEvent;
use clockdag::errors::Result;
use clockdag::exec::block::run_block;
use clockdag::exec::ExecutorBackend;
use clockdag::trigger::SlotKey;

use crate::scripted_runner::ScriptedRunner;

/// A fake executor that:
/// - records which (task, slot) pairs were "run"
/// - runs the task's block inline against a [`ScriptedRunner`] and
///   immediately reports `TaskCompleted` with the resulting report.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    runner: Arc<ScriptedRunner>,
    executed: Arc<Mutex<Vec<(String, SlotKey)>>>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        runner: Arc<ScriptedRunner>,
        executed: Arc<Mutex<Vec<(String, SlotKey)>>>,
    ) -> Self {
        Self {
            runtime_tx,
            runner,
            executed,
        }
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let runner = Arc::clone(&self.runner);
        let executed = Arc::clone(&self.executed);

        Box::pin(async move {
            for t in tasks {
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push((t.name.clone(), t.slot));
                }

                let report = run_block(&t.name, &t.steps, t.slot.at(), runner.as_ref(), t.timeout).await;

                tx.send(RuntimeEvent::TaskCompleted {
                    task: t.name.clone(),
                    slot: t.slot,
                    report,
                })
                .await
                .map_err(|e| anyhow::anyhow!("runtime channel closed: {e}"))?;
            }
            Ok(())
        })
    }

    fn shutdown(&mut self, _grace: Duration) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

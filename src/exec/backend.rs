// src/exec/backend.rs

//! Where dispatched runs go.
//!
//! [`RealExecutorBackend`] hands runs to the worker pool in
//! [`executor_loop`](super::executor_loop); integration tests swap in a fake
//! that runs blocks inline against a scripted runner.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::Result;

use super::executor_loop::{ExecutorMessage, spawn_executor};
use super::runner::StepRunner;

/// Sink for runs the core has decided to start.
///
/// Every dispatched run must eventually produce exactly one
/// `RuntimeEvent::TaskCompleted`, unless it is aborted at shutdown.
pub trait ExecutorBackend: Send {
    /// Hand over runs that passed their trigger and dependency checks.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stop executing: in-flight runs get `grace` to finish, then are killed.
    fn shutdown(&mut self, grace: Duration) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Bounded worker pool running blocks through a [`StepRunner`].
pub struct RealExecutorBackend {
    tx: mpsc::Sender<ExecutorMessage>,
}

impl RealExecutorBackend {
    /// Spawns the pool; completions are reported on `runtime_tx`.
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        runner: Arc<dyn StepRunner>,
        max_parallel: usize,
    ) -> Self {
        let tx = spawn_executor(runtime_tx, runner, max_parallel);
        Self { tx }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for task in tasks {
                tx.send(ExecutorMessage::Run(task))
                    .await
                    .map_err(|_| anyhow!("executor loop has stopped"))?;
            }
            Ok(())
        })
    }

    fn shutdown(&mut self, grace: Duration) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.tx.clone();

        Box::pin(async move {
            let (done_tx, done_rx) = oneshot::channel();
            if tx
                .send(ExecutorMessage::Shutdown {
                    grace,
                    done: done_tx,
                })
                .await
                .is_err()
            {
                debug!("executor loop already stopped");
                return Ok(());
            }
            let _ = done_rx.await;
            Ok(())
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDateTime;

    use super::*;
    use crate::config::model::Step;
    use crate::engine::TaskOutcome;
    use crate::exec::runner::ShellStepRunner;
    use crate::trigger::SlotKey;

    fn task(name: &str, cmd: &str) -> ScheduledTask {
        ScheduledTask {
            name: name.to_string(),
            slot: SlotKey::at_minute(
                NaiveDateTime::parse_from_str("2026-10-19 08:00", "%Y-%m-%d %H:%M").unwrap(),
            ),
            steps: vec![Step::Run(cmd.to_string())],
            timeout: None,
        }
    }

    #[tokio::test]
    async fn runs_blocks_and_reports_completion() {
        let (rt_tx, mut rt_rx) = mpsc::channel(8);
        let mut backend = RealExecutorBackend::new(rt_tx, Arc::new(ShellStepRunner::new()), 2);

        backend
            .spawn_ready_tasks(vec![task("ok", "true"), task("bad", "exit 5")])
            .await
            .unwrap();

        let mut outcomes = BTreeMap::new();
        for _ in 0..2 {
            match rt_rx.recv().await.unwrap() {
                RuntimeEvent::TaskCompleted { task, report, .. } => {
                    outcomes.insert(task, report.outcome());
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(outcomes["ok"], TaskOutcome::Success);
        assert_eq!(outcomes["bad"], TaskOutcome::Failed(5));

        backend.shutdown(Duration::from_millis(100)).await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_kills_runs_after_grace() {
        let (rt_tx, mut rt_rx) = mpsc::channel(8);
        let mut backend = RealExecutorBackend::new(rt_tx, Arc::new(ShellStepRunner::new()), 1);

        backend
            .spawn_ready_tasks(vec![task("slow", "sleep 30")])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        backend.shutdown(Duration::from_millis(200)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));

        // The killed run never reports completion; the loop is gone so the
        // channel closes.
        assert!(rt_rx.recv().await.is_none());
    }
}

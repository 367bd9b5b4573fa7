// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::notify::{Notification, Notifier};

use super::clock::Clock;
use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Timing knobs for the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeTiming {
    pub tick_interval: Duration,
    pub shutdown_grace: Duration,
}

/// Drives the scheduler from a fixed-interval ticker and `RuntimeEvent`s,
/// and delegates actual command execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: the ticker, reading
/// events from channels, reading the clock, dispatching tasks to the executor
/// and delivering notifications.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    notifications: JoinSet<()>,
    timing: RuntimeTiming,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        timing: RuntimeTiming,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            clock,
            notifier,
            notifications: JoinSet::new(),
            timing,
        }
    }

    /// Main event loop.
    ///
    /// - Ticks every `tick_interval` and consumes `RuntimeEvent`s from
    ///   `event_rx`.
    /// - Feeds them into the core runtime together with the current time.
    /// - Executes commands returned by the core (dispatch tasks, notify).
    /// - On shutdown, gives in-flight runs the grace period, records whatever
    ///   completes in that time, and waits for pending notifications.
    pub async fn run(mut self) -> Result<()> {
        info!(tick_interval = ?self.timing.tick_interval, "clockdag runtime started");

        let mut ticker = interval(self.timing.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                _ = ticker.tick() => RuntimeEvent::Tick,
                maybe = self.event_rx.recv() => match maybe {
                    Some(e) => e,
                    None => {
                        info!("runtime event channel closed; exiting");
                        break;
                    }
                },
            };

            if !matches!(event, RuntimeEvent::Tick) {
                debug!(?event, "runtime received event");
            }

            // Feed the event into the pure core and get commands back.
            let step = self.core.step(event, self.clock.now());

            for command in step.commands {
                self.execute_command(command).await?;
            }

            // Reap finished notification tasks so the set doesn't grow.
            while self.notifications.try_join_next().is_some() {}

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        self.shutdown().await?;
        info!("runtime exiting");
        Ok(())
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => {
                self.spawn_ready(tasks).await?;
            }
            CoreCommand::Notify(notification) => {
                deliver(&mut self.notifications, &self.notifier, notification);
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }

    async fn shutdown(&mut self) -> Result<()> {
        let grace = self.timing.shutdown_grace;
        info!(?grace, "shutting down executor");

        // Keep recording completions while the executor drains.
        {
            let shutdown = self.executor.shutdown(grace);
            tokio::pin!(shutdown);

            loop {
                tokio::select! {
                    res = &mut shutdown => {
                        res?;
                        break;
                    }
                    Some(event) = self.event_rx.recv() => {
                        record_late_event(&mut self.core, &mut self.notifications, &self.notifier, event, self.clock.now());
                    }
                }
            }
        }

        while let Ok(event) = self.event_rx.try_recv() {
            record_late_event(
                &mut self.core,
                &mut self.notifications,
                &self.notifier,
                event,
                self.clock.now(),
            );
        }

        // Hooks share the grace period; whatever is still hanging is dropped.
        let drained = tokio::time::timeout(grace, async {
            while self.notifications.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                pending = self.notifications.len(),
                "notifications still running after grace period; abandoning"
            );
            self.notifications.shutdown().await;
        }
        Ok(())
    }
}

/// Apply an event that arrives after the loop has stopped. Only completions
/// matter at that point; nothing new is dispatched.
fn record_late_event(
    core: &mut CoreRuntime,
    notifications: &mut JoinSet<()>,
    notifier: &Arc<dyn Notifier>,
    event: RuntimeEvent,
    now: chrono::NaiveDateTime,
) {
    if !matches!(event, RuntimeEvent::TaskCompleted { .. }) {
        return;
    }
    for command in core.step(event, now).commands {
        if let CoreCommand::Notify(n) = command {
            deliver(notifications, notifier, n);
        }
    }
}

/// Fire-and-forget delivery; failures are logged only.
fn deliver(notifications: &mut JoinSet<()>, notifier: &Arc<dyn Notifier>, notification: Notification) {
    let notifier = Arc::clone(notifier);
    notifications.spawn(async move {
        if let Err(err) = notifier.notify(&notification).await {
            warn!(
                task = %notification.task,
                slot = %notification.slot,
                error = %err,
                "notification failed"
            );
        }
    });
}

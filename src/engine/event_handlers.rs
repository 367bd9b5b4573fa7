// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::dag::{ScheduledTask, Scheduler};
use crate::engine::{RuntimeOptions, TaskName};
use crate::exec::block::BlockReport;
use crate::notify::Notification;
use crate::trigger::SlotKey;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Hand this outcome to the notifier.
    Notify(Notification),
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute (send tasks, notify).
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn dispatched(&self) -> Vec<&ScheduledTask> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchTasks(tasks) => Some(tasks.iter()),
                CoreCommand::Notify(_) => None,
            })
            .flatten()
            .collect()
    }

    pub fn notifications(&self) -> Vec<&Notification> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::Notify(n) => Some(n),
                CoreCommand::DispatchTasks(_) => None,
            })
            .collect()
    }
}

/// Handle a clock tick.
///
/// Missed slots are reported first (if enabled), then whatever became ready
/// is dispatched in one batch.
pub fn handle_tick(
    scheduler: &mut Scheduler,
    options: &RuntimeOptions,
    now: NaiveDateTime,
) -> CoreStep {
    let step = scheduler.tick(now);
    let mut commands = Vec::new();

    if options.notify_on_skip {
        for missed in step.newly_skipped {
            commands.push(CoreCommand::Notify(Notification::skipped(
                missed.task,
                missed.slot,
                missed.reason,
            )));
        }
    }

    if !step.waiting.is_empty() {
        debug!(waiting = step.waiting.len(), "due tasks held back this tick");
    }

    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }

    CoreStep {
        commands,
        keep_running: true,
    }
}

/// Handle a task completion event.
///
/// The outcome is recorded in the ledger and notified. Dependents are not
/// dispatched here; they are picked up by the next tick.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    task: TaskName,
    slot: SlotKey,
    report: BlockReport,
    now: NaiveDateTime,
) -> CoreStep {
    let mut commands = Vec::new();

    if let Some(status) = scheduler.handle_completion(&task, slot, report.outcome(), now) {
        commands.push(CoreCommand::Notify(Notification::from_report(
            task, slot, status, &report,
        )));
    }

    CoreStep {
        commands,
        keep_running: true,
    }
}

// src/dag/scheduler_step.rs

//! Result type for a single scheduler tick.

use crate::dag::ledger::MissedSlot;
use crate::dag::task_info::ScheduledTask;
use crate::engine::TaskName;
use crate::trigger::SlotKey;

/// Structured result of one [`Scheduler::tick`](crate::dag::Scheduler::tick).
///
/// Tests can step the scheduler by hand with a fixed `now` and make
/// assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks moved to `Running` in this tick, in topological order.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Pending slots whose window closed before they could be dispatched.
    pub newly_skipped: Vec<MissedSlot>,
    /// Due slots left `Pending` in this tick (dependency unmet or a previous
    /// run of the same task still going).
    pub waiting: Vec<(TaskName, SlotKey)>,
}

impl SchedulerStep {
    pub fn scheduled_names(&self) -> Vec<&str> {
        self.newly_scheduled.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.newly_scheduled.is_empty() && self.newly_skipped.is_empty() && self.waiting.is_empty()
    }
}

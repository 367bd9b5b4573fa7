// src/dag/task_info.rs

//! Task metadata handed from the scheduler to the executor.

use std::time::Duration;

use crate::config::model::{Step, TaskSpec};
use crate::engine::TaskName;
use crate::trigger::SlotKey;

/// Description of a task that the scheduler wants the executor to run now.
///
/// One `ScheduledTask` corresponds to exactly one claimed (task, slot) pair
/// in the ledger that has just been moved to `Running`.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    /// The trigger minute this run belongs to. While-loop keywords resolve
    /// against it.
    pub slot: SlotKey,
    pub steps: Vec<Step>,
    /// Per-step timeout.
    pub timeout: Option<Duration>,
}

impl ScheduledTask {
    pub fn from_spec(spec: &TaskSpec, slot: SlotKey) -> Self {
        Self {
            name: spec.name.clone(),
            slot,
            steps: spec.steps.clone(),
            timeout: spec.timeout,
        }
    }
}

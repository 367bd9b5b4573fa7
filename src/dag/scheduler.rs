use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use tracing::{debug, info, warn};

use crate::config::model::{ConfigFile, TaskSpec};
use crate::dag::graph::DagGraph;
use crate::dag::ledger::{HoldReason, RunLedger, RunRecord, RunStatus};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::task_info::ScheduledTask;
use crate::engine::{TaskName, TaskOutcome};
use crate::errors::Result;
use crate::trigger::SlotKey;

/// Scheduler holds the immutable DAG plus the shared run ledger.
///
/// It is responsible for:
/// - evaluating every task's trigger on each tick
/// - claiming due slots so each fires at most once
/// - holding back tasks whose dependencies have not succeeded yet
/// - marking pending slots as skipped once their window closes
/// - recording outcomes reported by the executor
///
/// Apart from the ledger it keeps no state between ticks.
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    tasks: HashMap<TaskName, TaskSpec>,
    ledger: Arc<RunLedger>,
    retention_days: u32,
    /// Calendar day of the last retention pass.
    last_prune: Option<NaiveDate>,
}

impl Scheduler {
    /// Construct a scheduler from a validated [`ConfigFile`] with a fresh
    /// ledger.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Self::with_ledger(cfg, Arc::new(RunLedger::new()))
    }

    /// Construct a scheduler that records into an existing ledger.
    pub fn with_ledger(cfg: &ConfigFile, ledger: Arc<RunLedger>) -> Result<Self> {
        let graph = DagGraph::build(&cfg.task)?;
        let tasks = cfg
            .task
            .iter()
            .map(|(name, spec)| (name.clone(), spec.clone()))
            .collect();

        Ok(Self {
            graph,
            tasks,
            ledger,
            retention_days: cfg.settings.retention_days,
            last_prune: None,
        })
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    pub fn ledger(&self) -> &Arc<RunLedger> {
        &self.ledger
    }

    /// Task names in evaluation (topological) order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.graph.order().iter().map(String::as_str)
    }

    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.get(name)
    }

    /// Whether `task`, due at `slot`, has all dependencies satisfied.
    pub fn can_run(&self, task: &str, slot: SlotKey) -> bool {
        self.graph.can_run(task, slot, &self.ledger)
    }

    pub fn status_of(&self, task: &str, slot: SlotKey) -> Option<RunRecord> {
        self.ledger.status_of(task, slot)
    }

    /// Run one scheduling pass at `now`.
    ///
    /// Order of work:
    /// 1. pending slots whose window has closed become `Skipped`
    /// 2. retention pruning, once per calendar day
    /// 3. every task, dependencies first, is checked for a due slot, which is
    ///    claimed and dispatched when nothing holds it back
    pub fn tick(&mut self, now: NaiveDateTime) -> SchedulerStep {
        let mut step = SchedulerStep {
            newly_skipped: self.ledger.sweep_missed(now),
            ..SchedulerStep::default()
        };

        for missed in step.newly_skipped.iter() {
            warn!(
                task = %missed.task,
                slot = %missed.slot,
                reason = ?missed.reason,
                "slot window closed before the run could be dispatched; skipped"
            );
        }

        self.maybe_prune(now);

        for name in self.graph.order() {
            let Some(spec) = self.tasks.get(name) else {
                continue;
            };
            let Some(slot) = spec.trigger.is_due(now) else {
                continue;
            };

            if !self.ledger.try_claim(name, slot, now) {
                let pending = self
                    .ledger
                    .status_of(name, slot)
                    .is_some_and(|r| r.status == RunStatus::Pending);
                if !pending {
                    continue;
                }
            } else {
                debug!(task = %name, %slot, "trigger due; slot claimed");
            }

            if self.ledger.is_running(name) {
                info!(
                    task = %name,
                    %slot,
                    "previous run still in progress; not dispatching"
                );
                self.ledger.hold(name, slot, HoldReason::PreviousRunActive);
                step.waiting.push((name.clone(), slot));
                continue;
            }

            if !self.graph.can_run(name, slot, &self.ledger) {
                self.ledger.hold(name, slot, HoldReason::DependencyUnmet);
                step.waiting.push((name.clone(), slot));
                continue;
            }

            if self.ledger.begin(name, slot) {
                info!(task = %name, %slot, "dispatching task");
                step.newly_scheduled.push(ScheduledTask::from_spec(spec, slot));
            }
        }

        step
    }

    /// Record the outcome of a dispatched run, returning the status stored.
    ///
    /// Dependents waiting on this slot are re-checked on the next tick.
    pub fn handle_completion(
        &mut self,
        task: &str,
        slot: SlotKey,
        outcome: TaskOutcome,
        now: NaiveDateTime,
    ) -> Option<RunStatus> {
        if !self.tasks.contains_key(task) {
            warn!(task = %task, %slot, "completion for unknown task; ignoring");
            return None;
        }

        let status = match outcome {
            TaskOutcome::Success => {
                info!(task = %task, %slot, "task succeeded");
                RunStatus::Succeeded
            }
            TaskOutcome::Failed(code) => {
                warn!(task = %task, %slot, exit_code = code, "task failed");
                RunStatus::Failed
            }
        };

        self.ledger.record(task, slot, status, now);
        Some(status)
    }

    fn maybe_prune(&mut self, now: NaiveDateTime) {
        let today = now.date();
        if self.last_prune == Some(today) {
            return;
        }
        self.last_prune = Some(today);

        let Some(cutoff) =
            today.checked_sub_signed(TimeDelta::days(i64::from(self.retention_days)))
        else {
            return;
        };
        let graph = &self.graph;
        let removed = self
            .ledger
            .prune_before(cutoff, |task| !graph.dependents_of(task).is_empty());
        if removed > 0 {
            debug!(removed, %cutoff, "pruned old ledger records");
        }
    }
}

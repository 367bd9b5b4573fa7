// src/dag/ledger.rs

//! Run ledger: per (task, slot) run records.
//!
//! The ledger is the only mutable state shared between the scheduling core
//! and the execution side. Every operation takes the single internal lock,
//! which makes [`RunLedger::try_claim`] and [`RunLedger::begin`] atomic
//! check-and-set operations: however many ticks (or threads) observe the
//! same due slot, exactly one of them wins the claim and exactly one
//! dispatches it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use tracing::debug;

use crate::engine::TaskName;
use crate::trigger::SlotKey;

/// Status of one claimed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Claimed but not dispatched (waiting on dependencies or on a previous
    /// run of the same task).
    Pending,
    /// Dispatched to the executor.
    Running,
    Succeeded,
    Failed,
    /// The slot's window closed while the claim was still pending.
    Skipped,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Skipped
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Why a claimed slot was not dispatched yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// A dependency has not succeeded for this cycle.
    DependencyUnmet,
    /// An earlier run of the same task is still running.
    PreviousRunActive,
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldReason::DependencyUnmet => f.write_str("dependency unmet"),
            HoldReason::PreviousRunActive => f.write_str("previous run still active"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub status: RunStatus,
    /// When the trigger was judged due and the slot claimed.
    pub fired_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    /// Last reason the slot was held back while `Pending`.
    pub held_by: Option<HoldReason>,
}

/// A pending claim whose window closed without being dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissedSlot {
    pub task: TaskName,
    pub slot: SlotKey,
    pub reason: Option<HoldReason>,
}

#[derive(Debug, Default)]
pub struct RunLedger {
    records: Mutex<HashMap<TaskName, BTreeMap<SlotKey, RunRecord>>>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `slot` for `task`.
    ///
    /// Returns `true` only for the first claim of that (task, slot) pair; the
    /// new record starts out `Pending`.
    pub fn try_claim(&self, task: &str, slot: SlotKey, now: NaiveDateTime) -> bool {
        let mut records = self.records.lock();
        let slots = records.entry(task.to_string()).or_default();
        if slots.contains_key(&slot) {
            return false;
        }
        slots.insert(
            slot,
            RunRecord {
                status: RunStatus::Pending,
                fired_at: now,
                completed_at: None,
                held_by: None,
            },
        );
        debug!(task = %task, %slot, "slot claimed");
        true
    }

    /// Move a claimed slot from `Pending` to `Running`.
    ///
    /// Returns `false` if the slot is unclaimed or already past `Pending`.
    pub fn begin(&self, task: &str, slot: SlotKey) -> bool {
        let mut records = self.records.lock();
        match records.get_mut(task).and_then(|s| s.get_mut(&slot)) {
            Some(record) if record.status == RunStatus::Pending => {
                record.status = RunStatus::Running;
                true
            }
            _ => false,
        }
    }

    /// Note why a `Pending` slot stays undispatched this tick.
    pub fn hold(&self, task: &str, slot: SlotKey, reason: HoldReason) {
        let mut records = self.records.lock();
        if let Some(record) = records.get_mut(task).and_then(|s| s.get_mut(&slot)) {
            if record.status == RunStatus::Pending {
                record.held_by = Some(reason);
            }
        }
    }

    /// Record the outcome of a slot.
    ///
    /// A record that was pruned in the meantime is recreated so the outcome
    /// is never lost.
    pub fn record(&self, task: &str, slot: SlotKey, status: RunStatus, now: NaiveDateTime) {
        let mut records = self.records.lock();
        let record = records
            .entry(task.to_string())
            .or_default()
            .entry(slot)
            .or_insert_with(|| RunRecord {
                status,
                fired_at: slot.at(),
                completed_at: None,
                held_by: None,
            });
        record.status = status;
        record.completed_at = status.is_terminal().then_some(now);
    }

    pub fn status_of(&self, task: &str, slot: SlotKey) -> Option<RunRecord> {
        let records = self.records.lock();
        records.get(task)?.get(&slot).cloned()
    }

    /// The most recent slot recorded for `task`.
    pub fn latest(&self, task: &str) -> Option<(SlotKey, RunRecord)> {
        let records = self.records.lock();
        records
            .get(task)?
            .iter()
            .next_back()
            .map(|(slot, record)| (*slot, record.clone()))
    }

    /// Whether any slot of `task` is currently `Running`.
    pub fn is_running(&self, task: &str) -> bool {
        let records = self.records.lock();
        records
            .get(task)
            .is_some_and(|slots| slots.values().any(|r| r.status == RunStatus::Running))
    }

    /// Mark every `Pending` record whose window has closed by `now` as
    /// `Skipped`, returning the affected slots.
    pub fn sweep_missed(&self, now: NaiveDateTime) -> Vec<MissedSlot> {
        let mut records = self.records.lock();
        let mut missed = Vec::new();
        for (task, slots) in records.iter_mut() {
            for (slot, record) in slots.iter_mut() {
                if record.status == RunStatus::Pending && slot.window_end() <= now {
                    record.status = RunStatus::Skipped;
                    record.completed_at = Some(now);
                    missed.push(MissedSlot {
                        task: task.clone(),
                        slot: *slot,
                        reason: record.held_by,
                    });
                }
            }
        }
        missed.sort_by(|a, b| (a.slot, &a.task).cmp(&(b.slot, &b.task)));
        missed
    }

    /// Drop terminal records for slots dated before `cutoff`.
    ///
    /// Records still pending or running are kept whatever their age. For
    /// every task where `keep_latest` returns true the newest record is kept
    /// too, since dependents resolve their cycle against it however old it is.
    pub fn prune_before(&self, cutoff: NaiveDate, keep_latest: impl Fn(&str) -> bool) -> usize {
        let mut records = self.records.lock();
        let mut removed = 0;
        for (task, slots) in records.iter_mut() {
            let newest = if keep_latest(task.as_str()) {
                slots.keys().next_back().copied()
            } else {
                None
            };
            let before = slots.len();
            slots.retain(|slot, record| {
                slot.date() >= cutoff || !record.status.is_terminal() || Some(*slot) == newest
            });
            removed += before - slots.len();
        }
        records.retain(|_, slots| !slots.is_empty());
        removed
    }

    /// Total number of records held.
    pub fn len(&self) -> usize {
        self.records.lock().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

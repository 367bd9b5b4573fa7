// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] holds the directed acyclic graph of tasks and answers the
//!   dependency gate question.
//! - [`ledger`] records, per task and trigger slot, whether the slot was
//!   claimed and how the run ended.
//! - [`scheduler`] contains the per-tick decision logic.
//! - [`task_info`] provides the scheduled task type handed to the executor.
//! - [`scheduler_step`] defines the result type for scheduler ticks.

pub mod graph;
pub mod ledger;
pub mod scheduler;
pub mod scheduler_step;
pub mod task_info;

pub use graph::DagGraph;
pub use ledger::{HoldReason, MissedSlot, RunLedger, RunRecord, RunStatus};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::ScheduledTask;

// src/engine/mod.rs

//! Orchestration engine for clockdag.
//!
//! This module ties together:
//! - the DAG scheduler
//! - the main runtime event loop that reacts to:
//!   - clock ticks
//!   - task completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. Wall-clock access goes through [`clock`].

use crate::exec::block::BlockReport;
use crate::trigger::SlotKey;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a task run for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(i32),
}

/// Runtime options used by the core.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// If true, missed slots (dependency never met inside the window) are
    /// reported to the notifier.
    pub notify_on_skip: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            notify_on_skip: true,
        }
    }
}

/// Events flowing into the runtime from the ticker, executors, etc.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Time to evaluate triggers.
    Tick,
    /// A task's block finished running.
    TaskCompleted {
        task: TaskName,
        slot: SlotKey,
        report: BlockReport,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod clock;
pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use clock::{Clock, ManualClock, SystemClock};
pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::{Runtime, RuntimeTiming};

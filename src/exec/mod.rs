// src/exec/mod.rs

//! Execution layer.
//!
//! This module is responsible for actually running the steps defined in the
//! tasks and reporting back to the orchestration runtime via
//! `RuntimeEvent`s.
//!
//! - [`runner`] runs a single shell command (`StepRunner`).
//! - [`block`] expands `while` loops and runs a task's steps in order.
//! - [`dates`] parses the date expressions used by `while` loops.
//! - [`task_runner`] runs one scheduled task and reports its completion.
//! - [`executor_loop`] owns the bounded worker pool and shutdown handling.
//! - [`backend`] provides the `ExecutorBackend` trait and a concrete
//!   `RealExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod block;
pub mod dates;
pub mod executor_loop;
pub mod runner;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use block::{BlockReport, StepReport, StepResult};
pub use executor_loop::spawn_executor;
pub use runner::{ShellStepRunner, StepOutput, StepRunner};

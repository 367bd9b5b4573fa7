// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s together with the current time and produces:
//! - an updated ledger
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading the clock and driving the ticker
//! - reading events from channels
//! - sending `ScheduledTask`s to the executor
//! - delivering notifications
//! - handling Ctrl+C / shutdown
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.

use chrono::NaiveDateTime;

use crate::dag::Scheduler;
use crate::engine::event_handlers::{CoreStep, handle_task_completion, handle_tick};
use crate::engine::{RuntimeEvent, RuntimeOptions};

/// Pure core runtime state.
///
/// This owns the DAG scheduler (and through it the run ledger) plus runtime
/// options. It has **no** channels, no Tokio types, and does not perform any
/// IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self { scheduler, options }
    }

    /// Read-only access to the scheduler (for tests and diagnostics).
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle a single runtime event observed at `now`, updating core state
    /// and returning the resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent, now: NaiveDateTime) -> CoreStep {
        match event {
            RuntimeEvent::Tick => handle_tick(&mut self.scheduler, &self.options, now),
            RuntimeEvent::TaskCompleted { task, slot, report } => {
                handle_task_completion(&mut self.scheduler, task, slot, report, now)
            }
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::time::Duration;

    use super::*;
    use crate::config::model::{ConfigFile, Settings, Step, TaskSpec};
    use crate::dag::RunStatus;
    use crate::exec::block::{BlockReport, StepReport, StepResult};
    use crate::exec::runner::StepOutput;
    use crate::trigger::{DailyTimes, TriggerSpec};
    use crate::types::ClockMode;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn core(notify_on_skip: bool) -> CoreRuntime {
        let task = |name: &str, time: &str, deps: &[&str]| TaskSpec {
            name: name.to_string(),
            trigger: TriggerSpec::TimeOfDay(DailyTimes::parse([time]).unwrap()),
            steps: vec![Step::Run(format!("echo {name}"))],
            depends_on: deps.iter().map(|d| d.to_string()).collect::<BTreeSet<_>>(),
            timeout: None,
        };
        let tasks: BTreeMap<_, _> = [task("Task1", "08:00", &[]), task("Task3", "09:00", &["Task1"])]
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();
        let settings = Settings {
            tick_interval: Duration::from_secs(15),
            max_parallel: 2,
            shutdown_grace: Duration::from_secs(1),
            retention_days: 7,
            clock: ClockMode::Local,
            notify_on_skip,
            notify_command: None,
        };
        let cfg = ConfigFile::new_unchecked(settings, tasks);
        CoreRuntime::new(
            Scheduler::from_config(&cfg).unwrap(),
            RuntimeOptions { notify_on_skip },
        )
    }

    fn report(code: i32) -> BlockReport {
        BlockReport {
            steps: vec![StepReport {
                command: "echo".to_string(),
                result: StepResult::Finished(StepOutput::failure(code)),
            }],
            ..BlockReport::default()
        }
    }

    #[test]
    fn completion_is_recorded_and_notified() {
        let mut core = core(true);
        let step = core.step(RuntimeEvent::Tick, at("2026-10-19 08:00:00"));
        let slot = step.dispatched()[0].slot;

        let step = core.step(
            RuntimeEvent::TaskCompleted {
                task: "Task1".to_string(),
                slot,
                report: report(0),
            },
            at("2026-10-19 08:00:05"),
        );
        let notes = step.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].outcome, RunStatus::Succeeded);
        assert_eq!(
            core.scheduler().status_of("Task1", slot).unwrap().status,
            RunStatus::Succeeded
        );
    }

    #[test]
    fn skip_notification_respects_option() {
        for notify_on_skip in [true, false] {
            let mut core = core(notify_on_skip);
            core.step(RuntimeEvent::Tick, at("2026-10-19 09:00:00"));
            let step = core.step(RuntimeEvent::Tick, at("2026-10-19 09:01:00"));
            assert_eq!(step.notifications().len(), usize::from(notify_on_skip));
        }
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let mut core = core(true);
        let step = core.step(RuntimeEvent::ShutdownRequested, at("2026-10-19 08:00:00"));
        assert!(!step.keep_running);
        assert!(step.commands.is_empty());
    }
}

// src/exec/block.rs

//! Sequential execution of a task's `block`.
//!
//! `while` steps are expanded up front into the flat list of commands they
//! stand for, so a malformed loop fails the run before anything executes.
//! The flat list then runs in order; the first failing command stops the
//! block and the remaining commands are reported as not run.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::config::model::Step;
use crate::engine::TaskOutcome;
use crate::exec::dates::render_command;
use crate::exec::runner::{StepOutput, StepRunner};

/// Upper bound on the number of commands one block may expand into.
pub const MAX_EXPANDED_COMMANDS: usize = 100_000;

/// Expand `steps` into the concrete commands to run, in order.
///
/// Loop bounds resolve against `reference` (the firing slot of the run);
/// nested loops use the same reference. Commands inside a loop are rendered
/// against the loop date; top-level commands are passed through untouched.
pub fn expand_steps(steps: &[Step], reference: NaiveDateTime) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    expand_into(steps, reference, None, &mut out)?;
    Ok(out)
}

fn expand_into(
    steps: &[Step],
    reference: NaiveDateTime,
    loop_date: Option<NaiveDateTime>,
    out: &mut Vec<String>,
) -> Result<(), String> {
    for step in steps {
        match step {
            Step::Run(cmd) => {
                let rendered = match loop_date {
                    Some(at) => render_command(cmd, at)?,
                    None => cmd.clone(),
                };
                out.push(rendered);
                if out.len() > MAX_EXPANDED_COMMANDS {
                    return Err(format!(
                        "block expands to more than {} commands",
                        MAX_EXPANDED_COMMANDS
                    ));
                }
            }
            Step::While {
                from,
                to,
                increment,
                body,
            } => {
                let start = from
                    .resolve(reference)
                    .ok_or_else(|| format!("loop start '{}' is out of range", from))?;
                let end = to
                    .resolve(reference)
                    .ok_or_else(|| format!("loop end '{}' is out of range", to))?;

                let mut current = start;
                while current < end {
                    expand_into(body, reference, Some(current), out)?;
                    current = current
                        .checked_add_signed(increment.delta())
                        .ok_or_else(|| format!("loop date overflow after {}", current))?;
                }
            }
        }
    }
    Ok(())
}

/// What happened to one command of the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Finished(StepOutput),
    /// The command could not be started.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub command: String,
    pub result: StepResult,
}

impl StepReport {
    pub fn is_success(&self) -> bool {
        matches!(&self.result, StepResult::Finished(out) if out.is_success())
    }

    fn describe(&self) -> String {
        match &self.result {
            StepResult::Finished(out) if out.timed_out => format!("`{}` timed out", self.command),
            StepResult::Finished(out) => match out.exit_code {
                Some(0) => format!("`{}` ok", self.command),
                Some(code) => format!("`{}` exited with {}", self.command, code),
                None => format!("`{}` killed by signal", self.command),
            },
            StepResult::Error(err) => format!("`{}` could not start: {}", self.command, err),
        }
    }
}

/// Outcome of a whole block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockReport {
    /// Commands that ran, in order. Only the last one can have failed.
    pub steps: Vec<StepReport>,
    /// Commands that were never started because an earlier one failed.
    pub not_run: usize,
    /// Set when the block stopped for a reason other than a failing step
    /// (bad `while` expansion, runner panic).
    pub error: Option<String>,
}

impl BlockReport {
    pub fn aborted(error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn outcome(&self) -> TaskOutcome {
        if self.error.is_some() {
            return TaskOutcome::Failed(-1);
        }
        match self.steps.iter().find(|s| !s.is_success()) {
            None => TaskOutcome::Success,
            Some(step) => match &step.result {
                StepResult::Finished(StepOutput {
                    exit_code: Some(code),
                    timed_out: false,
                    ..
                }) => TaskOutcome::Failed(*code),
                _ => TaskOutcome::Failed(-1),
            },
        }
    }
}

impl fmt::Display for BlockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.error {
            return write!(f, "block aborted: {}", err);
        }
        let total = self.steps.len() + self.not_run;
        let parts: Vec<String> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| format!("step {}/{} {}", i + 1, total, s.describe()))
            .collect();
        write!(f, "{}", parts.join("; "))?;
        if self.not_run > 0 {
            write!(f, "; {} step(s) not run", self.not_run)?;
        }
        Ok(())
    }
}

/// Run `steps` for the run firing at `slot_time`, stopping at the first
/// failure.
pub async fn run_block(
    task: &str,
    steps: &[Step],
    slot_time: NaiveDateTime,
    runner: &dyn StepRunner,
    timeout: Option<Duration>,
) -> BlockReport {
    let commands = match expand_steps(steps, slot_time) {
        Ok(commands) => commands,
        Err(err) => {
            warn!(task = %task, error = %err, "could not expand task block");
            return BlockReport::aborted(err);
        }
    };

    let total = commands.len();
    let mut report = BlockReport::default();

    for (idx, command) in commands.into_iter().enumerate() {
        debug!(task = %task, step = idx + 1, total, cmd = %command, "running step");

        let result = match runner.execute(&command, timeout).await {
            Ok(out) => StepResult::Finished(out),
            Err(err) => StepResult::Error(err.to_string()),
        };
        let step = StepReport { command, result };
        let ok = step.is_success();
        report.steps.push(step);

        if !ok {
            report.not_run = total - idx - 1;
            info!(
                task = %task,
                step = idx + 1,
                total,
                skipped = report.not_run,
                "step failed; aborting remaining steps"
            );
            break;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::errors::{ClockdagError, Result};
    use crate::exec::dates::{DateExpr, Increment};

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn while_step(from: &str, to: &str, inc: &str, body: Vec<Step>) -> Step {
        Step::While {
            from: DateExpr::parse(from).unwrap(),
            to: DateExpr::parse(to).unwrap(),
            increment: Increment::parse(inc).unwrap(),
            body,
        }
    }

    /// Fails every command containing `fail_on`, records everything it saw.
    struct Recording {
        fail_on: &'static str,
        seen: Mutex<Vec<String>>,
    }

    impl Recording {
        fn failing_on(fail_on: &'static str) -> Self {
            Self {
                fail_on,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl StepRunner for Recording {
        fn execute<'a>(
            &'a self,
            command: &'a str,
            _timeout: Option<Duration>,
        ) -> Pin<Box<dyn Future<Output = Result<StepOutput>> + Send + 'a>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(command.to_string());
                if command.contains("nostart") {
                    return Err(ClockdagError::Other(anyhow::anyhow!("no such shell")));
                }
                if command.contains(self.fail_on) {
                    Ok(StepOutput::failure(2))
                } else {
                    Ok(StepOutput::success())
                }
            })
        }
    }

    #[test]
    fn while_loop_expands_with_rendered_dates() {
        let steps = vec![
            Step::Run("date +%s".to_string()),
            while_step(
                "today-1d",
                "today",
                "12h",
                vec![Step::Run("fetch %Y%m%d%H".to_string())],
            ),
        ];
        let cmds = expand_steps(&steps, at("2026-10-19 08:00")).unwrap();
        assert_eq!(
            cmds,
            vec!["date +%s", "fetch 2026101808", "fetch 2026101820"]
        );
    }

    #[test]
    fn nested_loops_and_empty_ranges() {
        let steps = vec![while_step(
            "20240101",
            "20240103",
            "1d",
            vec![while_step(
                "today",
                "today",
                "1h",
                vec![Step::Run("never".to_string())],
            ), Step::Run("day %d".to_string())],
        )];
        let cmds = expand_steps(&steps, at("2026-10-19 08:00")).unwrap();
        assert_eq!(cmds, vec!["day 01", "day 02"]);
    }

    #[test]
    fn runaway_expansion_is_rejected() {
        let steps = vec![while_step(
            "2000",
            "2026",
            "1s",
            vec![Step::Run("x".to_string())],
        )];
        let err = expand_steps(&steps, at("2026-10-19 08:00")).unwrap_err();
        assert!(err.contains("more than"));
    }

    #[tokio::test]
    async fn failing_step_aborts_the_rest() {
        let runner = Recording::failing_on("fail");
        let steps = vec![
            Step::Run("fail A".to_string()),
            Step::Run("B".to_string()),
        ];
        let report = run_block("T", &steps, at("2026-10-19 08:00"), &runner, None).await;

        assert_eq!(*runner.seen.lock().unwrap(), vec!["fail A"]);
        assert_eq!(report.outcome(), TaskOutcome::Failed(2));
        assert_eq!(report.not_run, 1);
        assert_eq!(
            report.to_string(),
            "step 1/2 `fail A` exited with 2; 1 step(s) not run"
        );
    }

    #[tokio::test]
    async fn failure_inside_loop_propagates() {
        let runner = Recording::failing_on("job 02");
        let steps = vec![
            while_step(
                "20240101",
                "20240104",
                "1d",
                vec![Step::Run("job %d".to_string())],
            ),
            Step::Run("after".to_string()),
        ];
        let report = run_block("T", &steps, at("2026-10-19 08:00"), &runner, None).await;

        assert_eq!(*runner.seen.lock().unwrap(), vec!["job 01", "job 02"]);
        assert_eq!(report.outcome(), TaskOutcome::Failed(2));
        assert_eq!(report.not_run, 2);
    }

    #[tokio::test]
    async fn spawn_error_is_a_failure() {
        let runner = Recording::failing_on("fail");
        let steps = vec![Step::Run("nostart".to_string())];
        let report = run_block("T", &steps, at("2026-10-19 08:00"), &runner, None).await;
        assert_eq!(report.outcome(), TaskOutcome::Failed(-1));
        assert!(report.to_string().contains("could not start"));
    }
}

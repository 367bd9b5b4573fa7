// src/config/validate.rs

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::config::model::{
    ConfigFile, RawConfigFile, Settings, Step, StepConfig, TaskConfig, TaskSpec,
};
use crate::dag::DagGraph;
use crate::errors::{ClockdagError, Result};
use crate::exec::dates::{DateExpr, Increment, check_template};
use crate::trigger::{CronSchedule, DailyTimes, TriggerSpec};
use crate::types::parse_duration;

/// Longest tick interval that still observes every trigger minute.
const MAX_TICK_INTERVAL: Duration = Duration::from_secs(60);

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ClockdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        let settings = validate_global_config(&raw)?;

        let mut tasks = BTreeMap::new();
        for (name, task) in raw.task.iter() {
            tasks.insert(name.clone(), build_task(name, task)?);
        }

        // Unknown / self dependencies and cycles.
        DagGraph::build(&tasks)?;

        Ok(ConfigFile::new_unchecked(settings, tasks))
    }
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(ClockdagError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<Settings> {
    let c = &cfg.config;

    let tick_interval = parse_duration(&c.tick_interval)
        .map_err(|e| ClockdagError::ConfigError(format!("[config].tick_interval: {e}")))?;
    if tick_interval.is_zero() || tick_interval > MAX_TICK_INTERVAL {
        return Err(ClockdagError::ConfigError(format!(
            "[config].tick_interval must be greater than 0 and at most 60s (got {})",
            c.tick_interval
        )));
    }

    if c.max_parallel == 0 {
        return Err(ClockdagError::ConfigError(
            "[config].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }

    if c.retention_days == 0 {
        return Err(ClockdagError::ConfigError(
            "[config].retention_days must be >= 1 (got 0)".to_string(),
        ));
    }

    let shutdown_grace = parse_duration(&c.shutdown_grace)
        .map_err(|e| ClockdagError::ConfigError(format!("[config].shutdown_grace: {e}")))?;

    let notify_command = match cfg.notify.command.as_deref().map(str::trim) {
        Some("") => {
            return Err(ClockdagError::ConfigError(
                "[notify].command must not be empty".to_string(),
            ));
        }
        Some(cmd) => Some(cmd.to_string()),
        None => None,
    };

    Ok(Settings {
        tick_interval,
        max_parallel: c.max_parallel,
        shutdown_grace,
        retention_days: c.retention_days,
        clock: c.clock,
        notify_on_skip: c.notify_on_skip,
        notify_command,
    })
}

fn build_task(name: &str, cfg: &TaskConfig) -> Result<TaskSpec> {
    let trigger = build_trigger(name, cfg)?;

    if cfg.block.is_empty() {
        return Err(ClockdagError::InvalidStep {
            task: name.to_string(),
            reason: "`block` must contain at least one step".to_string(),
        });
    }
    let steps = build_steps(name, &cfg.block, false)?;

    let depends_on: BTreeSet<String> = cfg
        .depend_on
        .as_ref()
        .map(|d| d.to_vec())
        .unwrap_or_default()
        .into_iter()
        .map(|d| d.trim().to_string())
        .collect();

    let timeout = match cfg.timeout.as_deref() {
        None => None,
        Some(raw) => {
            let d = parse_duration(raw).map_err(|e| {
                ClockdagError::ConfigError(format!("task '{}' `timeout`: {}", name, e))
            })?;
            if d.is_zero() {
                return Err(ClockdagError::ConfigError(format!(
                    "task '{}' `timeout` must be greater than 0",
                    name
                )));
            }
            Some(d)
        }
    };

    Ok(TaskSpec {
        name: name.to_string(),
        trigger,
        steps,
        depends_on,
        timeout,
    })
}

fn build_trigger(name: &str, cfg: &TaskConfig) -> Result<TriggerSpec> {
    let invalid = |reason: String| ClockdagError::InvalidTrigger {
        task: name.to_string(),
        reason,
    };

    match (&cfg.time, &cfg.cron_expression) {
        (Some(_), Some(_)) => Err(invalid(
            "set either `time` or `cron_expression`, not both".to_string(),
        )),
        (None, None) => Err(invalid(
            "one of `time` or `cron_expression` is required".to_string(),
        )),
        (Some(times), None) => DailyTimes::parse(times.to_vec())
            .map(TriggerSpec::TimeOfDay)
            .map_err(invalid),
        (None, Some(expr)) => expr
            .parse::<CronSchedule>()
            .map(TriggerSpec::Cron)
            .map_err(invalid),
    }
}

fn build_steps(name: &str, block: &[StepConfig], in_loop: bool) -> Result<Vec<Step>> {
    let invalid = |reason: String| ClockdagError::InvalidStep {
        task: name.to_string(),
        reason,
    };

    block
        .iter()
        .map(|step| match step {
            StepConfig::Run(cmd) => {
                if cmd.trim().is_empty() {
                    return Err(invalid("`run` command must not be empty".to_string()));
                }
                if in_loop {
                    check_template(cmd).map_err(invalid)?;
                }
                Ok(Step::Run(cmd.clone()))
            }
            StepConfig::While(w) => {
                let from = DateExpr::parse(&w.condition.from).map_err(invalid)?;
                let to = DateExpr::parse(&w.condition.to).map_err(invalid)?;
                let increment = Increment::parse(&w.condition.increment).map_err(invalid)?;
                if w.body.is_empty() {
                    return Err(invalid("`while` block needs at least one step in `do`".to_string()));
                }
                let body = build_steps(name, &w.body, true)?;
                Ok(Step::While {
                    from,
                    to,
                    increment,
                    body,
                })
            }
        })
        .collect()
}

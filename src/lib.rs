// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod notify;
pub mod trigger;
pub mod types;

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::{ConfigFile, Step};
use crate::dag::{DagGraph, Scheduler};
use crate::engine::{
    Clock, CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, RuntimeTiming, SystemClock,
};
use crate::exec::{RealExecutorBackend, ShellStepRunner, StepRunner};
use crate::notify::{FanoutNotifier, Notifier};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - scheduler / runtime
/// - executor and notifier
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;
    let clock = Arc::new(SystemClock::new(cfg.settings.clock));

    if args.dry_run {
        print!("{}", dry_run_report(&cfg, clock.now())?);
        debug!("dry-run complete (no execution)");
        return Ok(());
    }

    let scheduler = Scheduler::from_config(&cfg)?;

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    // Shell step runner behind a bounded worker pool.
    let runner: Arc<dyn StepRunner> = Arc::new(ShellStepRunner::new());
    let executor = RealExecutorBackend::new(rt_tx.clone(), runner, cfg.settings.max_parallel);

    let notifier: Arc<dyn Notifier> = Arc::new(FanoutNotifier::from_settings(&cfg.settings));

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; shutting down");
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    info!(
        tasks = cfg.task.len(),
        clock = ?cfg.settings.clock,
        "scheduler loaded"
    );

    let options = RuntimeOptions {
        notify_on_skip: cfg.settings.notify_on_skip,
    };
    let timing = RuntimeTiming {
        tick_interval: cfg.settings.tick_interval,
        shutdown_grace: cfg.settings.shutdown_grace,
    };

    // Construct the pure core runtime (single source of truth for semantics).
    let core = CoreRuntime::new(scheduler, options);

    // Construct the async IO shell around the core.
    let runtime = Runtime::new(core, rt_rx, executor, clock, notifier, timing);
    runtime.run().await?;
    Ok(())
}

/// Dry-run output: tasks in evaluation order with trigger, dependencies,
/// steps and the next minute each task is due at or after `now`.
pub fn dry_run_report(cfg: &ConfigFile, now: NaiveDateTime) -> Result<String> {
    let graph = DagGraph::build(&cfg.task)?;
    let s = &cfg.settings;
    let mut out = String::new();

    writeln!(out, "clockdag dry-run")?;
    writeln!(out, "  config.tick_interval = {:?}", s.tick_interval)?;
    writeln!(out, "  config.max_parallel = {}", s.max_parallel)?;
    writeln!(out, "  config.shutdown_grace = {:?}", s.shutdown_grace)?;
    writeln!(out, "  config.retention_days = {}", s.retention_days)?;
    writeln!(out, "  config.clock = {:?}", s.clock)?;
    if let Some(cmd) = &s.notify_command {
        writeln!(out, "  notify.command = {cmd}")?;
    }
    writeln!(out)?;

    writeln!(out, "tasks ({}):", cfg.task.len())?;
    for name in graph.order() {
        let Some(task) = cfg.task.get(name) else {
            continue;
        };
        writeln!(out, "  - {name}")?;
        writeln!(out, "      trigger: {}", task.trigger)?;
        if !task.depends_on.is_empty() {
            writeln!(out, "      depend_on: {:?}", task.depends_on)?;
        }
        for step in task.steps.iter() {
            write_step(&mut out, step, 6)?;
        }
        if let Some(timeout) = task.timeout {
            writeln!(out, "      timeout: {timeout:?}")?;
        }
        let next = task
            .trigger
            .is_due(now)
            .or_else(|| task.trigger.next_slot_after(now));
        match next {
            Some(slot) => writeln!(out, "      next due: {slot}")?,
            None => writeln!(out, "      next due: never")?,
        }
    }

    Ok(out)
}

fn write_step(out: &mut String, step: &Step, indent: usize) -> std::fmt::Result {
    match step {
        Step::Run(cmd) => writeln!(out, "{:indent$}run: {cmd}", ""),
        Step::While {
            from,
            to,
            increment,
            body,
        } => {
            writeln!(
                out,
                "{:indent$}while: {from} .. {to} every {:?}",
                "",
                increment.delta().to_std().unwrap_or_default()
            )?;
            for inner in body {
                write_step(out, inner, indent + 2)?;
            }
            Ok(())
        }
    }
}

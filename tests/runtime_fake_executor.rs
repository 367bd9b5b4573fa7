// tests/runtime_fake_executor.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};
use crate::common::{at, init_tracing, with_timeout};

use std::error::Error;
use std::sync::{Arc, Mutex};

use chrono::TimeDelta;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};

use clockdag::config::ConfigFile;
use clockdag::dag::{RunStatus, Scheduler};
use clockdag::engine::{CoreRuntime, ManualClock, Runtime, RuntimeEvent, RuntimeOptions, RuntimeTiming};
use clockdag::notify::Notification;
use clockdag::trigger::SlotKey;
use clockdag_test_utils::fake_executor::FakeExecutor;
use clockdag_test_utils::recording_notifier::RecordingNotifier;
use clockdag_test_utils::scripted_runner::ScriptedRunner;

type TestResult = Result<(), Box<dyn Error>>;

/// A -> B, both due at 08:00.
fn same_minute_chain() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task("A", TaskConfigBuilder::at("08:00").run("echo A").build())
        .with_task(
            "B",
            TaskConfigBuilder::at("08:00").run("echo B").depend_on("A").build(),
        )
        .build()
}

struct Harness {
    tx: mpsc::Sender<RuntimeEvent>,
    clock: Arc<ManualClock>,
    executed: Arc<Mutex<Vec<(String, SlotKey)>>>,
    notifier: Arc<RecordingNotifier>,
    handle: tokio::task::JoinHandle<clockdag::errors::Result<()>>,
}

fn start(cfg: &ConfigFile, runner: ScriptedRunner, start_at: &str) -> Harness {
    start_with_notifier(cfg, runner, start_at, RecordingNotifier::new())
}

fn start_with_notifier(
    cfg: &ConfigFile,
    runner: ScriptedRunner,
    start_at: &str,
    notifier: RecordingNotifier,
) -> Harness {
    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let clock = Arc::new(ManualClock::new(at(start_at)));
    let executed = Arc::new(Mutex::new(Vec::new()));
    let notifier = Arc::new(notifier);

    let executor = FakeExecutor::new(tx.clone(), Arc::new(runner), Arc::clone(&executed));
    let core = CoreRuntime::new(
        Scheduler::from_config(cfg).unwrap(),
        RuntimeOptions {
            notify_on_skip: cfg.settings.notify_on_skip,
        },
    );
    let runtime = Runtime::new(
        core,
        rx,
        executor,
        clock.clone(),
        notifier.clone(),
        RuntimeTiming {
            tick_interval: Duration::from_millis(10),
            shutdown_grace: Duration::from_millis(50),
        },
    );

    Harness {
        tx,
        clock,
        executed,
        notifier,
        handle: tokio::spawn(runtime.run()),
    }
}

async fn wait_for<F: Fn() -> bool>(cond: F) {
    with_timeout(async {
        while !cond() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

fn outcomes(received: &[Notification]) -> Vec<(String, RunStatus)> {
    received
        .iter()
        .map(|n| (n.task.clone(), n.outcome))
        .collect()
}

#[tokio::test]
async fn runtime_runs_chain_in_dependency_order() -> TestResult {
    init_tracing();
    let h = start(&same_minute_chain(), ScriptedRunner::new(), "2026-10-19 08:00:00");

    wait_for(|| h.executed.lock().unwrap().len() == 2).await;

    h.tx.send(RuntimeEvent::ShutdownRequested).await?;
    with_timeout(h.handle).await??;

    let executed: Vec<String> = h
        .executed
        .lock()
        .unwrap()
        .iter()
        .map(|(name, _)| name.clone())
        .collect();
    assert_eq!(executed, vec!["A", "B"]);

    assert_eq!(
        outcomes(&h.notifier.received()),
        vec![
            ("A".to_string(), RunStatus::Succeeded),
            ("B".to_string(), RunStatus::Succeeded),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn failed_dependency_is_notified_then_dependent_skipped() -> TestResult {
    init_tracing();
    let runner = ScriptedRunner::new().failing_on("echo A");
    let h = start(&same_minute_chain(), runner, "2026-10-19 08:00:00");

    wait_for(|| !h.notifier.received().is_empty()).await;
    // Let a few more ticks pass inside the window; B must stay gated.
    sleep(Duration::from_millis(50)).await;
    assert_eq!(h.executed.lock().unwrap().len(), 1);

    h.clock.advance(TimeDelta::minutes(1));
    wait_for(|| h.notifier.received().len() == 2).await;

    h.tx.send(RuntimeEvent::ShutdownRequested).await?;
    with_timeout(h.handle).await??;

    assert_eq!(
        outcomes(&h.notifier.received()),
        vec![
            ("A".to_string(), RunStatus::Failed),
            ("B".to_string(), RunStatus::Skipped),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn stuck_notification_does_not_block_shutdown() -> TestResult {
    init_tracing();
    let h = start_with_notifier(
        &same_minute_chain(),
        ScriptedRunner::new(),
        "2026-10-19 08:00:00",
        RecordingNotifier::hanging(),
    );

    wait_for(|| h.notifier.received().len() == 2).await;

    h.tx.send(RuntimeEvent::ShutdownRequested).await?;
    // Grace is 50ms; the stuck deliveries are abandoned after it.
    with_timeout(h.handle).await??;
    Ok(())
}

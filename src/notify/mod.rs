// src/notify/mod.rs

//! Outcome notifications.
//!
//! The runtime hands every finished (or skipped) slot to a [`Notifier`].
//! Notifications are fire-and-forget: the runtime spawns them and only logs
//! a failed delivery, so a broken hook can never stall scheduling.
//!
//! - [`LogNotifier`] writes outcomes to the tracing log.
//! - [`CommandNotifier`] runs the `[notify].command` hook.
//! - [`FanoutNotifier`] forwards to several notifiers.

mod command;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::model::Settings;
use crate::dag::{HoldReason, RunStatus};
use crate::engine::TaskName;
use crate::exec::block::BlockReport;
use crate::trigger::SlotKey;

pub use command::CommandNotifier;

/// One task-level outcome to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub task: TaskName,
    pub slot: SlotKey,
    /// `Succeeded`, `Failed` or `Skipped`.
    pub outcome: RunStatus,
    /// Human-readable step-level detail.
    pub details: String,
}

impl Notification {
    pub fn from_report(task: TaskName, slot: SlotKey, outcome: RunStatus, report: &BlockReport) -> Self {
        Self {
            task,
            slot,
            outcome,
            details: report.to_string(),
        }
    }

    /// A slot whose window closed while it was held back for `reason`.
    pub fn skipped(task: TaskName, slot: SlotKey, reason: Option<HoldReason>) -> Self {
        let details = match reason {
            Some(reason) => format!("{reason} before the slot window closed"),
            None => "slot window closed before the run was dispatched".to_string(),
        };
        Self {
            task,
            slot,
            outcome: RunStatus::Skipped,
            details,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}: {}", self.task, self.slot, self.outcome)
    }
}

/// Trait abstracting where outcome notifications go.
pub trait Notifier: Send + Sync {
    fn notify<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// Logs every notification through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify<'a>(
        &'a self,
        n: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            match n.outcome {
                RunStatus::Succeeded => {
                    info!(task = %n.task, slot = %n.slot, details = %n.details, "task succeeded")
                }
                outcome => {
                    warn!(task = %n.task, slot = %n.slot, %outcome, details = %n.details, "task did not succeed")
                }
            }
            Ok(())
        })
    }
}

/// Forwards each notification to every inner notifier in turn.
///
/// A failing inner notifier is logged and does not stop the others.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    inner: Vec<Arc<dyn Notifier>>,
}

impl fmt::Debug for FanoutNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutNotifier")
            .field("notifiers", &self.inner.len())
            .finish()
    }
}

impl FanoutNotifier {
    pub fn new(inner: Vec<Arc<dyn Notifier>>) -> Self {
        Self { inner }
    }

    /// Log notifier plus the configured command hook, if any.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut inner: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier)];
        if let Some(cmd) = &settings.notify_command {
            inner.push(Arc::new(CommandNotifier::new(cmd.clone())));
        }
        Self { inner }
    }
}

impl Notifier for FanoutNotifier {
    fn notify<'a>(
        &'a self,
        n: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            for notifier in self.inner.iter() {
                if let Err(err) = notifier.notify(n).await {
                    warn!(task = %n.task, slot = %n.slot, error = %err, "notification delivery failed");
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDateTime;

    use super::*;

    struct Failing;

    impl Notifier for Failing {
        fn notify<'a>(
            &'a self,
            _n: &'a Notification,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
            Box::pin(async { anyhow::bail!("hook down") })
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<Notification>>);

    impl Notifier for Collect {
        fn notify<'a>(
            &'a self,
            n: &'a Notification,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
            Box::pin(async move {
                self.0.lock().unwrap().push(n.clone());
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn fanout_survives_a_failing_notifier() {
        let collect = Arc::new(Collect::default());
        let inner: Vec<Arc<dyn Notifier>> = vec![Arc::new(Failing), Arc::new(LogNotifier), collect.clone()];
        let fanout = FanoutNotifier::new(inner);

        let slot = SlotKey::at_minute(
            NaiveDateTime::parse_from_str("2026-10-19 09:00", "%Y-%m-%d %H:%M").unwrap(),
        );
        let n = Notification::skipped("Task3".to_string(), slot, Some(HoldReason::DependencyUnmet));
        fanout.notify(&n).await.unwrap();

        assert_eq!(*collect.0.lock().unwrap(), vec![n.clone()]);
        assert_eq!(n.to_string(), "Task3 @ 2026-10-19 09:00: skipped");
        assert_eq!(n.details, "dependency unmet before the slot window closed");

        let overlap = Notification::skipped("A".to_string(), slot, Some(HoldReason::PreviousRunActive));
        assert_eq!(overlap.details, "previous run still active before the slot window closed");
    }
}

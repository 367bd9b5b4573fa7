// src/notify/command.rs

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::debug;

use crate::exec::runner::shell_command;

use super::{Notification, Notifier};

/// How long a hook may run before it is killed.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs a shell hook for every notification.
///
/// The hook sees `CLOCKDAG_TASK`, `CLOCKDAG_SLOT`, `CLOCKDAG_OUTCOME` and
/// `CLOCKDAG_DETAILS` in its environment. A hook still running after its
/// timeout is killed and reported as a failed delivery.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: String,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(command: String) -> Self {
        Self {
            command,
            timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Notifier for CommandNotifier {
    fn notify<'a>(
        &'a self,
        n: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut cmd = shell_command(&self.command);
            cmd.env("CLOCKDAG_TASK", &n.task)
                .env("CLOCKDAG_SLOT", n.slot.to_string())
                .env("CLOCKDAG_OUTCOME", n.outcome.to_string())
                .env("CLOCKDAG_DETAILS", &n.details)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let Ok(output) = tokio::time::timeout(self.timeout, cmd.output()).await else {
                bail!(
                    "notify command timed out after {:?}; killed",
                    self.timeout
                );
            };
            let output =
                output.with_context(|| format!("running notify command '{}'", self.command))?;

            debug!(
                task = %n.task,
                slot = %n.slot,
                exit_code = ?output.status.code(),
                "notify command finished"
            );

            if !output.status.success() {
                bail!(
                    "notify command exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Ok(())
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use chrono::NaiveDateTime;
    use tempfile::tempdir;

    use super::*;
    use crate::dag::RunStatus;
    use crate::trigger::SlotKey;

    #[tokio::test]
    async fn hook_receives_environment() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("hook.txt");
        let notifier = CommandNotifier::new(format!(
            "printf '%s|%s|%s|%s' \"$CLOCKDAG_TASK\" \"$CLOCKDAG_SLOT\" \"$CLOCKDAG_OUTCOME\" \"$CLOCKDAG_DETAILS\" > {}",
            out.display()
        ));

        let n = Notification {
            task: "Task1".to_string(),
            slot: SlotKey::at_minute(
                NaiveDateTime::parse_from_str("2026-10-19 08:00", "%Y-%m-%d %H:%M").unwrap(),
            ),
            outcome: RunStatus::Failed,
            details: "step 1/1 `false` exited with 1".to_string(),
        };
        notifier.notify(&n).await.unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            written,
            "Task1|2026-10-19 08:00|failed|step 1/1 `false` exited with 1"
        );
    }

    #[tokio::test]
    async fn failing_hook_is_an_error() {
        let notifier = CommandNotifier::new("exit 4".to_string());
        let n = Notification::skipped(
            "Task3".to_string(),
            SlotKey::at_minute(
                NaiveDateTime::parse_from_str("2026-10-19 09:00", "%Y-%m-%d %H:%M").unwrap(),
            ),
            None,
        );
        assert!(notifier.notify(&n).await.is_err());
    }

    #[tokio::test]
    async fn hung_hook_is_killed_after_timeout() {
        let notifier =
            CommandNotifier::new("sleep 30".to_string()).with_timeout(Duration::from_millis(100));
        let n = Notification::skipped(
            "Task3".to_string(),
            SlotKey::at_minute(
                NaiveDateTime::parse_from_str("2026-10-19 09:00", "%Y-%m-%d %H:%M").unwrap(),
            ),
            None,
        );

        let started = std::time::Instant::now();
        let err = notifier.notify(&n).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

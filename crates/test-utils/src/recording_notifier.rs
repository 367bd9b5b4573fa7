use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use clockdag::notify::{Notification, Notifier};

/// Collects every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<Notification>>,
    hang: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records, then never finishes delivering (a stuck hook).
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.received.lock().unwrap().push(notification.clone());
            if self.hang {
                std::future::pending::<()>().await;
            }
            Ok(())
        })
    }
}

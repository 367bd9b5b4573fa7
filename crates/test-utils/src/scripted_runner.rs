use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use clockdag::errors::Result;
use clockdag::exec::{StepOutput, StepRunner};

/// A step runner that never spawns processes:
/// - records every command it was asked to run
/// - fails (exit code 1) any command containing one of the configured
///   markers, succeeds otherwise.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    failing: Vec<String>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.failing.push(marker.to_string());
        self
    }

    /// Commands executed so far, in order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl StepRunner for ScriptedRunner {
    fn execute<'a>(
        &'a self,
        command: &'a str,
        _timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Result<StepOutput>> + Send + 'a>> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(command.to_string());
            if self.failing.iter().any(|m| command.contains(m.as_str())) {
                Ok(StepOutput::failure(1))
            } else {
                Ok(StepOutput::success())
            }
        })
    }
}

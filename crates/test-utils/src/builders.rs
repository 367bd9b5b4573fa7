#![allow(dead_code)]

use std::collections::BTreeMap;

use clockdag::config::model::{
    LoopConditionConfig, NotifySection, OneOrMany, StepConfig, WhileConfig,
};
use clockdag::config::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
use clockdag::errors::Result;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                notify: NotifySection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn tick_interval(mut self, val: &str) -> Self {
        self.config.config.tick_interval = val.to_string();
        self
    }

    pub fn max_parallel(mut self, val: usize) -> Self {
        self.config.config.max_parallel = val;
        self
    }

    pub fn shutdown_grace(mut self, val: &str) -> Self {
        self.config.config.shutdown_grace = val.to_string();
        self
    }

    pub fn retention_days(mut self, val: u32) -> Self {
        self.config.config.retention_days = val;
        self
    }

    pub fn notify_on_skip(mut self, val: bool) -> Self {
        self.config.config.notify_on_skip = val;
        self
    }

    pub fn notify_command(mut self, cmd: &str) -> Self {
        self.config.notify.command = Some(cmd.to_string());
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    fn empty() -> TaskConfig {
        TaskConfig {
            time: None,
            cron_expression: None,
            block: vec![],
            depend_on: None,
            timeout: None,
        }
    }

    /// Task triggered daily at `time` (`HH:MM`).
    pub fn at(time: &str) -> Self {
        let mut task = Self::empty();
        task.time = Some(OneOrMany::Many(vec![time.to_string()]));
        Self { task }
    }

    /// Task triggered by a cron expression.
    pub fn cron(expr: &str) -> Self {
        let mut task = Self::empty();
        task.cron_expression = Some(expr.to_string());
        Self { task }
    }

    /// Add another daily time.
    pub fn time(mut self, time: &str) -> Self {
        let mut times = self.task.time.as_ref().map(OneOrMany::to_vec).unwrap_or_default();
        times.push(time.to_string());
        self.task.time = Some(OneOrMany::Many(times));
        self
    }

    pub fn run(mut self, cmd: &str) -> Self {
        self.task.block.push(StepConfig::Run(cmd.to_string()));
        self
    }

    /// Append a date loop whose body is a list of `run` commands.
    pub fn while_loop(mut self, from: &str, to: &str, increment: &str, body: &[&str]) -> Self {
        self.task.block.push(StepConfig::While(WhileConfig {
            condition: LoopConditionConfig {
                from: from.to_string(),
                to: to.to_string(),
                increment: increment.to_string(),
            },
            body: body.iter().map(|c| StepConfig::Run(c.to_string())).collect(),
        }));
        self
    }

    pub fn depend_on(mut self, dep: &str) -> Self {
        let mut deps = self.task.depend_on.as_ref().map(OneOrMany::to_vec).unwrap_or_default();
        deps.push(dep.to_string());
        self.task.depend_on = Some(OneOrMany::Many(deps));
        self
    }

    pub fn timeout(mut self, val: &str) -> Self {
        self.task.timeout = Some(val.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

// src/config/model.rs

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::Deserialize;

use crate::exec::dates::{DateExpr, Increment};
use crate::trigger::TriggerSpec;
use crate::types::ClockMode;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// tick_interval = "15s"
/// max_parallel = 4
///
/// [notify]
/// command = "notify-send \"$CLOCKDAG_TASK: $CLOCKDAG_OUTCOME\""
///
/// [task.Task1]
/// time = ["08:00"]
/// block = [{ run = "echo one" }]
///
/// [task.Task3]
/// cron_expression = "0 9 * * *"
/// depend_on = "Task1"
/// block = [{ run = "echo three" }]
/// ```
///
/// All sections except `[task.*]` are optional and have reasonable defaults.
/// This is the unvalidated shape; [`ConfigFile`] is built from it via
/// `TryFrom`, which is where triggers, steps and the DAG are checked.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Notification hook from `[notify]`.
    #[serde(default)]
    pub notify: NotifySection,

    /// All tasks from `[task.<name>]`.
    ///
    /// Keys are the *task names* (e.g. `"Task1"`, `"backup"`).
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Polling interval of the scheduler loop. Must be at most one minute so
    /// that no trigger minute is skipped.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: String,

    /// Upper bound on tasks executing at the same time.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// How long in-flight runs may keep going after shutdown is requested.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: String,

    /// Ledger records older than this many calendar days are dropped.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Wall clock used for trigger evaluation.
    #[serde(default)]
    pub clock: ClockMode,

    /// Whether to notify when a slot is missed because a dependency never
    /// succeeded inside the slot's window.
    #[serde(default = "default_notify_on_skip")]
    pub notify_on_skip: bool,
}

fn default_tick_interval() -> String {
    "15s".to_string()
}

fn default_max_parallel() -> usize {
    4
}

fn default_shutdown_grace() -> String {
    "30s".to_string()
}

fn default_retention_days() -> u32 {
    7
}

fn default_notify_on_skip() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            max_parallel: default_max_parallel(),
            shutdown_grace: default_shutdown_grace(),
            retention_days: default_retention_days(),
            clock: ClockMode::default(),
            notify_on_skip: default_notify_on_skip(),
        }
    }
}

/// `[notify]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotifySection {
    /// Shell command run for every task outcome. Receives `CLOCKDAG_TASK`,
    /// `CLOCKDAG_SLOT`, `CLOCKDAG_OUTCOME` and `CLOCKDAG_DETAILS` in its
    /// environment.
    #[serde(default)]
    pub command: Option<String>,
}

/// A value that may be written either as a single string or as a list.
///
/// Lets `time = "08:00"` and `time = ["08:00", "20:00"]` both parse, and the
/// same for `depend_on`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Daily `HH:MM` trigger times. Mutually exclusive with
    /// `cron_expression`.
    #[serde(default)]
    pub time: Option<OneOrMany>,

    /// Five-field cron trigger. Mutually exclusive with `time`.
    #[serde(default)]
    pub cron_expression: Option<String>,

    /// Ordered steps; a failing step aborts the rest.
    #[serde(default)]
    pub block: Vec<StepConfig>,

    /// Task(s) that must have succeeded in the same scheduling cycle.
    #[serde(default)]
    pub depend_on: Option<OneOrMany>,

    /// Optional per-step timeout (e.g. `"10m"`).
    #[serde(default)]
    pub timeout: Option<String>,
}

/// One entry of a task's `block`.
///
/// ```toml
/// block = [
///   { run = "echo start" },
///   { while = { condition = { from = "today-1d", to = "today", increment = "6h" },
///               do = [{ run = "fetch --cycle %Y%m%d%H" }] } },
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepConfig {
    Run(String),
    While(WhileConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WhileConfig {
    pub condition: LoopConditionConfig,
    #[serde(rename = "do")]
    pub body: Vec<StepConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoopConditionConfig {
    pub from: String,
    pub to: String,
    pub increment: String,
}

/// Validated global settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tick_interval: Duration,
    pub max_parallel: usize,
    pub shutdown_grace: Duration,
    pub retention_days: u32,
    pub clock: ClockMode,
    pub notify_on_skip: bool,
    pub notify_command: Option<String>,
}

/// A validated, executable step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A single shell command.
    Run(String),
    /// Repeat `body` for each date from `from` (inclusive) to `to`
    /// (exclusive), advancing by `increment`. Commands inside are rendered
    /// with strftime placeholders against the loop date.
    While {
        from: DateExpr,
        to: DateExpr,
        increment: Increment,
        body: Vec<Step>,
    },
}

/// A validated task definition.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    pub trigger: TriggerSpec,
    pub steps: Vec<Step>,
    pub depends_on: BTreeSet<String>,
    pub timeout: Option<Duration>,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (or the loader), so
/// holding one means every trigger parsed, every dependency resolves and the
/// task graph is acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub settings: Settings,
    pub task: BTreeMap<String, TaskSpec>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(settings: Settings, task: BTreeMap<String, TaskSpec>) -> Self {
        Self { settings, task }
    }
}

// src/dag/graph.rs

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::config::model::TaskSpec;
use crate::dag::ledger::{RunLedger, RunStatus};
use crate::errors::{ClockdagError, Result};
use crate::trigger::{SlotKey, TriggerSpec};

/// Internal node structure: the task's trigger plus immediate deps and
/// dependents.
#[derive(Debug, Clone)]
struct DagNode {
    trigger: TriggerSpec,
    /// Direct dependencies: tasks that must succeed before this one can run.
    deps: Vec<String>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<String>,
}

/// In-memory DAG keyed by task name.
///
/// Construction runs a topological sort, so an instance is always acyclic;
/// the sorted order is kept and used as the evaluation order of every tick.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
    order: Vec<String>,
}

impl DagGraph {
    /// Build the DAG from validated task specs.
    ///
    /// Fails with [`ClockdagError::DagCycle`] if the `depend_on` links form a
    /// cycle, and with [`ClockdagError::ConfigError`] if a link points to an
    /// unknown task or to the task itself.
    pub fn build(tasks: &BTreeMap<String, TaskSpec>) -> Result<Self> {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();

        // First pass: create nodes with their dependency lists.
        for (name, task) in tasks.iter() {
            for dep in task.depends_on.iter() {
                if dep == name {
                    return Err(ClockdagError::ConfigError(format!(
                        "task '{}' cannot depend on itself in `depend_on`",
                        name
                    )));
                }
                if !tasks.contains_key(dep) {
                    return Err(ClockdagError::ConfigError(format!(
                        "task '{}' has unknown dependency '{}' in `depend_on`",
                        name, dep
                    )));
                }
            }
            nodes.insert(
                name.clone(),
                DagNode {
                    trigger: task.trigger.clone(),
                    deps: task.depends_on.iter().cloned().collect(),
                    dependents: Vec::new(),
                },
            );
        }

        // Second pass: populate dependents based on deps.
        for (name, task) in tasks.iter() {
            for dep in task.depends_on.iter() {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(name.clone());
                }
            }
        }

        let order = topological_order(tasks)?;
        Ok(Self { nodes, order })
    }

    /// Return all task names (unordered).
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// Task names with every task listed after all of its dependencies.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Immediate dependencies of a task (the tasks listed in its `depend_on`).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one in their `depend_on`).
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    pub fn trigger_of(&self, name: &str) -> Option<&TriggerSpec> {
        self.nodes.get(name).map(|n| &n.trigger)
    }

    /// The slot of `dep` that a dependent firing at `slot` waits on: the most
    /// recent minute at or before `slot` at which `dep`'s trigger was due.
    pub fn cycle_slot_of(&self, dep: &str, slot: SlotKey) -> Option<SlotKey> {
        self.trigger_of(dep)?.latest_slot_at_or_before(slot.at())
    }

    /// Whether `task`, due at `slot`, has all prerequisites satisfied.
    ///
    /// A dependency is satisfied only if its record for the same scheduling
    /// cycle (see [`cycle_slot_of`](Self::cycle_slot_of)) is `Succeeded`. An
    /// absent, pending, running, failed or skipped record keeps the task
    /// gated for this tick.
    pub fn can_run(&self, task: &str, slot: SlotKey, ledger: &RunLedger) -> bool {
        let Some(node) = self.nodes.get(task) else {
            warn!(task = %task, "can_run called for unknown task");
            return false;
        };

        for dep in node.deps.iter() {
            let Some(cycle) = self.cycle_slot_of(dep, slot) else {
                debug!(task = %task, dep = %dep, %slot, "dependency has no slot at or before this one");
                return false;
            };

            let status = ledger.status_of(dep, cycle).map(|r| r.status);
            if status != Some(RunStatus::Succeeded) {
                debug!(
                    task = %task,
                    dep = %dep,
                    %slot,
                    dep_slot = %cycle,
                    dep_status = ?status,
                    "dependency not satisfied for this cycle"
                );
                return false;
            }
        }

        true
    }
}

fn topological_order(tasks: &BTreeMap<String, TaskSpec>) -> Result<Vec<String>> {
    // Edge direction: dep -> task
    // For:
    //   [task.B]
    //   depend_on = "A"
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in tasks.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in tasks.iter() {
        for dep in task.depends_on.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(ClockdagError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                node
            )))
        }
    }
}

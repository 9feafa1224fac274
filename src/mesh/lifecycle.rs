//! Node lifecycle tracking.
//!
//! The tracker owns the state table of the nodes it knows about, keyed by
//! global index. States follow
//! `Created -> Running -> Stopped -> Running -> ... -> Removed`.
//! The table is process-local and is never rebuilt from runtime queries:
//! a node stopped by another process cannot be restarted through this one.
//! Mutation requires `&mut self`, so concurrent stop/restart requests on the
//! same tracker must be serialised by the caller.

use std::collections::BTreeMap;

use log::info;

use crate::error::MeshError;
use crate::mesh::types::{Environment, NodeState};
use crate::runtime::ContainerRuntime;
use crate::topology::naming;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleTracker {
    node_prefix: String,
    states: BTreeMap<usize, NodeState>,
}

impl LifecycleTracker {
    /// Empty tracker for nodes named `<node_prefix><index>`.
    pub fn new(node_prefix: impl Into<String>) -> Self {
        Self {
            node_prefix: node_prefix.into(),
            states: BTreeMap::new(),
        }
    }

    /// Tracker that knows every node of a freshly built environment as running.
    pub fn from_environment(environment: &Environment) -> Self {
        let mut tracker = Self::new(environment.topology.node_prefix.clone());
        for node in &environment.nodes {
            tracker.track(node.global_index, NodeState::Created);
            tracker.track(node.global_index, NodeState::Running);
        }
        tracker
    }

    /// Record the state of a node created or started by this process.
    pub fn track(&mut self, global_index: usize, state: NodeState) {
        self.states.insert(global_index, state);
    }

    pub fn state(&self, global_index: usize) -> Option<NodeState> {
        self.states.get(&global_index).copied()
    }

    /// Indices of stopped nodes, ascending.
    pub fn stopped_indices(&self) -> Vec<usize> {
        self.states
            .iter()
            .filter(|(_, state)| **state == NodeState::Stopped)
            .map(|(index, _)| *index)
            .collect()
    }

    /// Stop a running node.
    pub fn stop(&mut self, global_index: usize, runtime: &dyn ContainerRuntime) -> Result<(), MeshError> {
        match self.state(global_index) {
            Some(NodeState::Running) => {}
            Some(NodeState::Stopped) => {
                return Err(self.invalid(global_index, "container is already stopped"));
            }
            Some(state) => {
                return Err(self.invalid(global_index, &format!("container is {}, not running", state)));
            }
            None => {
                return Err(self.invalid(global_index, "container is not tracked as running"));
            }
        }

        let name = naming::node_name(&self.node_prefix, global_index);
        let container = runtime
            .find_container(&name)
            .map_err(|e| MeshError::runtime("look up container", name.as_str(), e))?
            .filter(|c| c.running)
            .ok_or_else(|| MeshError::NodeNotFound { name: name.clone() })?;
        runtime
            .stop_container(&container.id)
            .map_err(|e| MeshError::runtime("stop container", name.as_str(), e))?;

        self.track(global_index, NodeState::Stopped);
        info!("Container {} stopped successfully", name);
        Ok(())
    }

    /// Start again a node this tracker stopped.
    pub fn restart(&mut self, global_index: usize, runtime: &dyn ContainerRuntime) -> Result<(), MeshError> {
        if self.state(global_index) != Some(NodeState::Stopped) {
            return Err(self.invalid(global_index, "container is not stopped"));
        }

        let name = naming::node_name(&self.node_prefix, global_index);
        let container = runtime
            .find_container(&name)
            .map_err(|e| MeshError::runtime("look up container", name.as_str(), e))?
            .ok_or_else(|| MeshError::NodeNotFound { name: name.clone() })?;
        runtime
            .start_container(&container.id)
            .map_err(|e| MeshError::runtime("restart container", name.as_str(), e))?;

        self.track(global_index, NodeState::Running);
        info!("Container {} restarted successfully", name);
        Ok(())
    }

    /// Move every tracked node to the terminal `Removed` state after teardown.
    pub fn mark_all_removed(&mut self) {
        for state in self.states.values_mut() {
            *state = NodeState::Removed;
        }
    }

    fn invalid(&self, index: usize, message: &str) -> MeshError {
        MeshError::InvalidTransition {
            index,
            message: message.to_string(),
        }
    }
}

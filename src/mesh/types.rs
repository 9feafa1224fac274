//! Mesh data model.

use std::fmt;

use serde::Serialize;

use crate::topology::{AdjacencyMatrix, Topology};

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeState {
    Created,
    Running,
    Stopped,
    /// Terminal, reached through teardown only.
    Removed,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Created => "created",
            NodeState::Running => "running",
            NodeState::Stopped => "stopped",
            NodeState::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// One container of the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub global_index: usize,
    pub group_index: usize,
    pub local_index: usize,
    pub name: String,
    pub runtime_id: String,
}

/// The isolated network of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub group_index: usize,
    pub name: String,
    pub runtime_id: String,
}

/// Node `node_index` of group `from_group` attached to the network of `to_group`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Link {
    pub from_group: usize,
    pub to_group: usize,
    pub node_index: usize,
}

/// Everything created for one run.
///
/// Not persisted: after a crash the mesh is recovered by name matching
/// against the live runtime, see [`crate::mesh::reaper`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub topology: Topology,
    pub matrix: AdjacencyMatrix,
    pub networks: Vec<Network>,
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl Environment {
    pub fn node(&self, global_index: usize) -> Option<&Node> {
        self.nodes.iter().find(|n| n.global_index == global_index)
    }

    pub fn network(&self, group_index: usize) -> Option<&Network> {
        self.networks.iter().find(|n| n.group_index == group_index)
    }

    pub fn nodes_in_group(&self, group_index: usize) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(move |n| n.group_index == group_index)
    }

    pub fn total_nodes(&self) -> usize {
        self.topology.total_nodes()
    }
}

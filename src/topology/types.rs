//! Topology parameters.
//!
//! A `Topology` fixes the shape of a mesh before anything is created:
//! how many groups, how many nodes per group, how many nodes of a group
//! reach into each linked network, the image the nodes run and the name
//! prefixes every resource is derived from.

use serde::{Deserialize, Serialize};

use crate::error::MeshError;
use crate::topology::naming;

/// Immutable description of the mesh to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub group_count: usize,
    pub nodes_per_group: usize,
    pub links_per_pair: usize,
    pub image: String,
    /// Prefix of node (container) names.
    pub node_prefix: String,
    /// Prefix of network names.
    pub network_prefix: String,
}

impl Topology {
    /// Topology using the default `cont_<image>` node prefix.
    pub fn new(
        group_count: usize,
        nodes_per_group: usize,
        links_per_pair: usize,
        image: impl Into<String>,
        network_prefix: impl Into<String>,
    ) -> Self {
        let image = image.into();
        Self {
            group_count,
            nodes_per_group,
            links_per_pair,
            node_prefix: naming::default_node_prefix(&image),
            image,
            network_prefix: network_prefix.into(),
        }
    }

    /// Check the counts and names before any runtime call is made.
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.group_count < 1 || self.nodes_per_group < 1 || self.links_per_pair < 1 {
            return Err(MeshError::InvalidTopology(
                "the number of containers, networks and links must be greater than 0".to_string(),
            ));
        }
        if self.group_count.checked_mul(self.nodes_per_group).is_none() {
            return Err(MeshError::InvalidTopology(format!(
                "{} networks of {} containers is too many nodes to address",
                self.group_count, self.nodes_per_group
            )));
        }
        if self.links_per_pair > self.nodes_per_group {
            return Err(MeshError::InvalidTopology(format!(
                "links per pair ({}) exceeds containers per network ({})",
                self.links_per_pair, self.nodes_per_group
            )));
        }
        if self.image.trim().is_empty() {
            return Err(MeshError::InvalidTopology("image name cannot be empty".to_string()));
        }
        if self.node_prefix.is_empty() || self.network_prefix.is_empty() {
            return Err(MeshError::InvalidTopology("name prefixes cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Total number of nodes across all groups.
    pub fn total_nodes(&self) -> usize {
        self.group_count * self.nodes_per_group
    }

    pub fn network_name(&self, group_index: usize) -> String {
        naming::network_name(&self.network_prefix, group_index)
    }

    pub fn node_name(&self, global_index: usize) -> String {
        naming::node_name(&self.node_prefix, global_index)
    }

    pub fn global_index(&self, group_index: usize, local_index: usize) -> usize {
        naming::global_index(group_index, local_index, self.nodes_per_group)
    }

    /// True when `global_index` addresses a node of this topology.
    pub fn contains_node(&self, global_index: usize) -> bool {
        global_index < self.total_nodes()
    }
}

//! Read-only status of a running mesh.
//!
//! The snapshot is what an external observer (the menu, an HTTP endpoint, a
//! script) gets to see. Field names are PascalCase like the YAML keys.

use serde::Serialize;

use crate::mesh::{Environment, LifecycleTracker};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusSnapshot {
    pub num_networks: usize,
    pub num_containers: usize,
    pub num_links: usize,
    pub stopped_containers: Vec<usize>,
    pub net_matrix: Vec<Vec<bool>>,
}

impl StatusSnapshot {
    pub fn capture(environment: &Environment, tracker: &LifecycleTracker) -> Self {
        let topology = &environment.topology;
        Self {
            num_networks: topology.group_count,
            num_containers: topology.nodes_per_group,
            num_links: topology.links_per_pair,
            stopped_containers: tracker.stopped_indices(),
            net_matrix: environment.matrix.rows().to_vec(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

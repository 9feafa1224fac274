//! Environment builder.
//!
//! Creates a mesh in three strictly ordered phases: every network, then every
//! node, then every link. The first failure aborts the remaining steps;
//! nothing already created is rolled back, the caller reaps by prefix.

use log::{debug, info};
use rayon::prelude::*;

use crate::error::MeshError;
use crate::mesh::types::{Environment, Link, Network, Node};
use crate::progress::{timed, ProgressSink};
use crate::runtime::{ContainerRuntime, ContainerSpec, NetworkSpec};
use crate::topology::{self, AdjacencyMatrix, Topology};

/// Long-lived no-op process that keeps a node alive for `exec` sessions.
pub const KEEPALIVE_COMMAND: [&str; 3] = ["tail", "-f", "/dev/null"];

/// Knobs of a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Launch nodes privileged so they can reconfigure their own interfaces.
    pub privileged: bool,
    /// Create and start the nodes of one group concurrently.
    pub parallel_groups: bool,
}

/// Drives a [`ContainerRuntime`] to materialise a topology.
pub struct EnvironmentBuilder<'a> {
    runtime: &'a dyn ContainerRuntime,
    sink: &'a dyn ProgressSink,
    options: BuildOptions,
}

impl<'a> EnvironmentBuilder<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, sink: &'a dyn ProgressSink) -> Self {
        Self {
            runtime,
            sink,
            options: BuildOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the mesh. Topology and matrix are validated before the first runtime call.
    pub fn build(&self, topology: &Topology, matrix: &AdjacencyMatrix) -> Result<Environment, MeshError> {
        topology.validate()?;
        topology::validate(matrix, topology.group_count)?;
        if self.options.privileged {
            info!("Nodes will run in privileged mode");
        }

        let networks = self.create_networks(topology)?;
        let nodes = self.create_nodes(topology)?;
        let links = if topology.group_count > 1 {
            self.create_links(topology, matrix)?
        } else {
            Vec::new()
        };

        info!(
            "Mesh ready: {} networks, {} nodes, {} links",
            networks.len(),
            nodes.len(),
            links.len()
        );
        Ok(Environment {
            topology: topology.clone(),
            matrix: matrix.clone(),
            networks,
            nodes,
            links,
        })
    }

    fn create_networks(&self, topology: &Topology) -> Result<Vec<Network>, MeshError> {
        info!("Creating {} networks", topology.group_count);
        (0..topology.group_count)
            .map(|group_index| {
                let name = topology.network_name(group_index);
                let runtime_id = timed(
                    self.sink,
                    || self.runtime.create_network(&NetworkSpec::bridge(name.as_str())),
                    |_| format!("Network {} created successfully", name),
                )
                .map_err(|e| MeshError::runtime("create network", name.as_str(), e))?;
                Ok(Network {
                    group_index,
                    name,
                    runtime_id,
                })
            })
            .collect()
    }

    fn create_nodes(&self, topology: &Topology) -> Result<Vec<Node>, MeshError> {
        info!(
            "Creating {} nodes ({} per network)",
            topology.total_nodes(),
            topology.nodes_per_group
        );
        let mut nodes = Vec::with_capacity(topology.total_nodes());
        for group_index in 0..topology.group_count {
            let group: Vec<Node> = if self.options.parallel_groups {
                (0..topology.nodes_per_group)
                    .into_par_iter()
                    .map(|local_index| self.create_node(topology, group_index, local_index))
                    .collect::<Result<_, _>>()?
            } else {
                (0..topology.nodes_per_group)
                    .map(|local_index| self.create_node(topology, group_index, local_index))
                    .collect::<Result<_, _>>()?
            };
            nodes.extend(group);
        }
        Ok(nodes)
    }

    fn create_node(&self, topology: &Topology, group_index: usize, local_index: usize) -> Result<Node, MeshError> {
        let global_index = topology.global_index(group_index, local_index);
        let name = topology.node_name(global_index);
        let spec = ContainerSpec {
            name: name.clone(),
            image: topology.image.clone(),
            network: topology.network_name(group_index),
            command: KEEPALIVE_COMMAND.iter().map(|s| s.to_string()).collect(),
            privileged: self.options.privileged,
        };

        let runtime_id = timed(
            self.sink,
            || self.runtime.create_container(&spec),
            |_| format!("Container {} created successfully", name),
        )
        .map_err(|e| MeshError::runtime("create container", name.as_str(), e))?;
        timed(
            self.sink,
            || self.runtime.start_container(&runtime_id),
            |_| format!("Container {} started successfully", name),
        )
        .map_err(|e| MeshError::runtime("start container", name.as_str(), e))?;
        debug!("Node {} is {} in {}", global_index, runtime_id, spec.network);

        Ok(Node {
            global_index,
            group_index,
            local_index,
            name,
            runtime_id,
        })
    }

    fn create_links(&self, topology: &Topology, matrix: &AdjacencyMatrix) -> Result<Vec<Link>, MeshError> {
        let mut links = Vec::new();
        for (from_group, to_group) in matrix.links() {
            let target = topology.network_name(to_group);
            for local_index in 0..topology.links_per_pair {
                let node_index = topology.global_index(from_group, local_index);
                let node = topology.node_name(node_index);
                timed(
                    self.sink,
                    || self.runtime.connect_network(&target, &node),
                    |_| format!("Container {} linked to network {}", node, target),
                )
                .map_err(|e| MeshError::runtime("connect container to network", format!("{} -> {}", node, target), e))?;
                links.push(Link {
                    from_group,
                    to_group,
                    node_index,
                });
            }
            debug!("Network {} linked to network {}", from_group, to_group);
        }
        Ok(links)
    }
}

/// Build with default options: sequential creation, unprivileged nodes.
pub fn build(
    topology: &Topology,
    matrix: &AdjacencyMatrix,
    runtime: &dyn ContainerRuntime,
    sink: &dyn ProgressSink,
) -> Result<Environment, MeshError> {
    EnvironmentBuilder::new(runtime, sink).build(topology, matrix)
}

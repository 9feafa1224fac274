//! Mesh topology module.
//!
//! This module contains the topology parameters, the adjacency model that
//! describes directed links between groups, and the naming scheme that maps
//! (group, node) coordinates to runtime resource names.

pub mod adjacency;
pub mod naming;
pub mod types;

// Re-export key types and functions for easier access
pub use adjacency::{acquire, validate, AdjacencyMatrix};
pub use naming::{global_index, network_name, node_name, NodeNamePattern};
pub use types::Topology;

//! Container runtime capability.
//!
//! The mesh core talks to the container engine only through the
//! [`ContainerRuntime`] trait: blocking calls that return an opaque ID or an
//! error. Two implementations are provided:
//!
//! - `docker.rs`: the Docker Engine API through bollard
//! - `memory.rs`: an in-process runtime used for dry runs and tests

pub mod docker;
pub mod memory;

pub use docker::DockerApi;
pub use memory::InMemoryRuntime;

use std::path::Path;

use crate::error::RuntimeError;

/// Parameters of a network to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    pub name: String,
    pub driver: String,
}

impl NetworkSpec {
    /// Isolated bridge network.
    pub fn bridge(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: "bridge".to_string(),
        }
    }
}

/// Parameters of a container to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Network the container joins at creation.
    pub network: String,
    pub command: Vec<String>,
    /// Run with full host capabilities. Security sensitive, opt-in only.
    pub privileged: bool,
}

/// A container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub running: bool,
}

impl ContainerSummary {
    /// Exact name comparison, ignoring the leading `/` the Docker API adds.
    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.trim_start_matches('/') == name)
    }
}

/// A network as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSummary {
    pub id: String,
    pub name: String,
    pub driver: String,
}

/// Blocking container/network operations the mesh core depends on.
///
/// Resources may be referenced either by the ID returned at creation or by name.
pub trait ContainerRuntime: Send + Sync {
    fn create_network(&self, spec: &NetworkSpec) -> Result<String, RuntimeError>;

    fn remove_network(&self, network: &str) -> Result<(), RuntimeError>;

    /// Attach an existing container to an additional network.
    fn connect_network(&self, network: &str, container: &str) -> Result<(), RuntimeError>;

    fn list_networks(&self) -> Result<Vec<NetworkSummary>, RuntimeError>;

    fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    fn start_container(&self, container: &str) -> Result<(), RuntimeError>;

    fn stop_container(&self, container: &str) -> Result<(), RuntimeError>;

    fn remove_container(&self, container: &str, force: bool) -> Result<(), RuntimeError>;

    /// All containers, running or not.
    fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;

    /// Build `tag` from the Dockerfile found in `context_dir`.
    fn build_image(&self, context_dir: &Path, tag: &str) -> Result<(), RuntimeError>;

    fn pull_image(&self, reference: &str) -> Result<(), RuntimeError>;

    /// Container whose name is exactly `name`.
    fn find_container(&self, name: &str) -> Result<Option<ContainerSummary>, RuntimeError> {
        Ok(self.list_containers()?.into_iter().find(|c| c.has_name(name)))
    }
}

//! In-process container runtime.
//!
//! Keeps containers and networks in memory behind a mutex. It mirrors the
//! Docker behaviours the mesh relies on: names are unique, a network with
//! attached containers cannot be removed, a running container cannot be
//! removed without force. Every call is recorded, and failures can be
//! injected per operation and resource name.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::debug;

use crate::error::RuntimeError;
use crate::runtime::{ContainerRuntime, ContainerSpec, ContainerSummary, NetworkSpec, NetworkSummary};

#[derive(Debug, Clone)]
struct MemContainer {
    name: String,
    image: String,
    privileged: bool,
    running: bool,
    /// Network IDs the container is attached to.
    networks: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct MemNetwork {
    name: String,
    driver: String,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    containers: BTreeMap<String, MemContainer>,
    networks: BTreeMap<String, MemNetwork>,
    images: BTreeSet<String>,
    calls: Vec<String>,
    failures: BTreeSet<(String, String)>,
}

impl State {
    fn allocate_id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{}{:012x}", kind, self.next_id)
    }

    fn container_id(&self, reference: &str) -> Result<String, RuntimeError> {
        if self.containers.contains_key(reference) {
            return Ok(reference.to_string());
        }
        self.containers
            .iter()
            .find(|(_, c)| c.name == reference)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| RuntimeError::Missing {
                kind: "container",
                name: reference.to_string(),
            })
    }

    fn network_id(&self, reference: &str) -> Result<String, RuntimeError> {
        if self.networks.contains_key(reference) {
            return Ok(reference.to_string());
        }
        self.networks
            .iter()
            .find(|(_, n)| n.name == reference)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| RuntimeError::Missing {
                kind: "network",
                name: reference.to_string(),
            })
    }

    fn container_name(&self, reference: &str) -> String {
        self.container_id(reference)
            .ok()
            .and_then(|id| self.containers.get(&id).map(|c| c.name.clone()))
            .unwrap_or_else(|| reference.to_string())
    }

    fn network_name(&self, reference: &str) -> String {
        self.network_id(reference)
            .ok()
            .and_then(|id| self.networks.get(&id).map(|n| n.name.clone()))
            .unwrap_or_else(|| reference.to_string())
    }

    /// Log the call and fail if a failure was injected for it.
    fn record(&mut self, operation: &str, target: &str) -> Result<(), RuntimeError> {
        self.calls.push(format!("{} {}", operation, target));
        if self.failures.contains(&(operation.to_string(), target.to_string())) {
            return Err(RuntimeError::Rejected(format!("injected failure: {} {}", operation, target)));
        }
        Ok(())
    }
}

/// Runtime that keeps all resources in memory.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    state: Mutex<State>,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `operation` fail when it targets the resource named `target`.
    ///
    /// Operation names match the call log: `create_network`, `remove_network`,
    /// `connect_network`, `create_container`, `start_container`,
    /// `stop_container`, `remove_container`, `build_image`, `pull_image`.
    /// For `connect_network` the target is `<network> <container>`.
    pub fn fail_on(&self, operation: &str, target: &str) {
        self.lock().failures.insert((operation.to_string(), target.to_string()));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Calls made so far, as `<operation> <resource name>`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn container_names(&self) -> Vec<String> {
        self.lock().containers.values().map(|c| c.name.clone()).collect()
    }

    pub fn network_names(&self) -> Vec<String> {
        self.lock().networks.values().map(|n| n.name.clone()).collect()
    }

    pub fn images(&self) -> Vec<String> {
        self.lock().images.iter().cloned().collect()
    }

    /// Names of the networks the named container is attached to.
    pub fn networks_of(&self, container_name: &str) -> Vec<String> {
        let state = self.lock();
        let mut names: Vec<String> = state
            .containers
            .values()
            .filter(|c| c.name == container_name)
            .flat_map(|c| c.networks.iter())
            .filter_map(|id| state.networks.get(id).map(|n| n.name.clone()))
            .collect();
        names.sort();
        names
    }

    pub fn is_running(&self, container_name: &str) -> bool {
        self.lock()
            .containers
            .values()
            .any(|c| c.name == container_name && c.running)
    }

    pub fn is_privileged(&self, container_name: &str) -> bool {
        self.lock()
            .containers
            .values()
            .any(|c| c.name == container_name && c.privileged)
    }

    pub fn image_of(&self, container_name: &str) -> Option<String> {
        self.lock()
            .containers
            .values()
            .find(|c| c.name == container_name)
            .map(|c| c.image.clone())
    }

    pub fn driver_of(&self, network_name: &str) -> Option<String> {
        self.lock()
            .networks
            .values()
            .find(|n| n.name == network_name)
            .map(|n| n.driver.clone())
    }
}

impl ContainerRuntime for InMemoryRuntime {
    fn create_network(&self, spec: &NetworkSpec) -> Result<String, RuntimeError> {
        let mut state = self.lock();
        state.record("create_network", &spec.name)?;
        if state.networks.values().any(|n| n.name == spec.name) {
            return Err(RuntimeError::Conflict {
                kind: "network",
                name: spec.name.clone(),
            });
        }
        let id = state.allocate_id("n");
        state.networks.insert(
            id.clone(),
            MemNetwork {
                name: spec.name.clone(),
                driver: spec.driver.clone(),
            },
        );
        debug!("in-memory network {} created as {}", spec.name, id);
        Ok(id)
    }

    fn remove_network(&self, network: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        let name = state.network_name(network);
        state.record("remove_network", &name)?;
        let id = state.network_id(network)?;
        if state.containers.values().any(|c| c.networks.contains(&id)) {
            return Err(RuntimeError::Rejected(format!("network {} has active endpoints", name)));
        }
        state.networks.remove(&id);
        Ok(())
    }

    fn connect_network(&self, network: &str, container: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        let target = format!("{} {}", state.network_name(network), state.container_name(container));
        state.record("connect_network", &target)?;
        let network_id = state.network_id(network)?;
        let container_id = state.container_id(container)?;
        if let Some(c) = state.containers.get_mut(&container_id) {
            if !c.networks.insert(network_id) {
                return Err(RuntimeError::Rejected(format!("endpoint {} already exists", target)));
            }
        }
        Ok(())
    }

    fn list_networks(&self) -> Result<Vec<NetworkSummary>, RuntimeError> {
        let state = self.lock();
        Ok(state
            .networks
            .iter()
            .map(|(id, n)| NetworkSummary {
                id: id.clone(),
                name: n.name.clone(),
                driver: n.driver.clone(),
            })
            .collect())
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut state = self.lock();
        state.record("create_container", &spec.name)?;
        if state.containers.values().any(|c| c.name == spec.name) {
            return Err(RuntimeError::Conflict {
                kind: "container",
                name: spec.name.clone(),
            });
        }
        let network_id = state.network_id(&spec.network)?;
        let id = state.allocate_id("c");
        state.containers.insert(
            id.clone(),
            MemContainer {
                name: spec.name.clone(),
                image: spec.image.clone(),
                privileged: spec.privileged,
                running: false,
                networks: BTreeSet::from([network_id]),
            },
        );
        Ok(id)
    }

    fn start_container(&self, container: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        let name = state.container_name(container);
        state.record("start_container", &name)?;
        let id = state.container_id(container)?;
        if let Some(c) = state.containers.get_mut(&id) {
            c.running = true;
        }
        Ok(())
    }

    fn stop_container(&self, container: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        let name = state.container_name(container);
        state.record("stop_container", &name)?;
        let id = state.container_id(container)?;
        if let Some(c) = state.containers.get_mut(&id) {
            c.running = false;
        }
        Ok(())
    }

    fn remove_container(&self, container: &str, force: bool) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        let name = state.container_name(container);
        state.record("remove_container", &name)?;
        let id = state.container_id(container)?;
        let running = state.containers.get(&id).map(|c| c.running).unwrap_or(false);
        if running && !force {
            return Err(RuntimeError::Rejected(format!("container {} is running", name)));
        }
        state.containers.remove(&id);
        Ok(())
    }

    fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let state = self.lock();
        Ok(state
            .containers
            .iter()
            .map(|(id, c)| ContainerSummary {
                id: id.clone(),
                names: vec![format!("/{}", c.name)],
                running: c.running,
            })
            .collect())
    }

    fn build_image(&self, _context_dir: &Path, tag: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.record("build_image", tag)?;
        state.images.insert(tag.to_string());
        Ok(())
    }

    fn pull_image(&self, reference: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.record("pull_image", reference)?;
        state.images.insert(reference.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, network: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: "img".to_string(),
            network: network.to_string(),
            command: Vec::new(),
            privileged: false,
        }
    }

    #[test]
    fn test_container_joins_network_at_creation() {
        let runtime = InMemoryRuntime::new();
        runtime.create_network(&NetworkSpec::bridge("net0")).unwrap();
        let id = runtime.create_container(&spec("cont_img0", "net0")).unwrap();
        assert!(!runtime.is_running("cont_img0"));
        runtime.start_container(&id).unwrap();
        assert!(runtime.is_running("cont_img0"));
        assert_eq!(runtime.networks_of("cont_img0"), vec!["net0".to_string()]);
        assert_eq!(runtime.driver_of("net0").as_deref(), Some("bridge"));
    }

    #[test]
    fn test_names_are_unique() {
        let runtime = InMemoryRuntime::new();
        runtime.create_network(&NetworkSpec::bridge("net0")).unwrap();
        assert!(matches!(
            runtime.create_network(&NetworkSpec::bridge("net0")),
            Err(RuntimeError::Conflict { .. })
        ));
        runtime.create_container(&spec("a", "net0")).unwrap();
        assert!(runtime.create_container(&spec("a", "net0")).is_err());
    }

    #[test]
    fn test_container_needs_existing_network() {
        let runtime = InMemoryRuntime::new();
        assert!(matches!(
            runtime.create_container(&spec("a", "missing")),
            Err(RuntimeError::Missing { kind: "network", .. })
        ));
    }

    #[test]
    fn test_network_with_endpoints_cannot_be_removed() {
        let runtime = InMemoryRuntime::new();
        runtime.create_network(&NetworkSpec::bridge("net0")).unwrap();
        runtime.create_container(&spec("a", "net0")).unwrap();
        assert!(runtime.remove_network("net0").is_err());
        runtime.remove_container("a", true).unwrap();
        runtime.remove_network("net0").unwrap();
        assert!(runtime.network_names().is_empty());
    }

    #[test]
    fn test_running_container_requires_force() {
        let runtime = InMemoryRuntime::new();
        runtime.create_network(&NetworkSpec::bridge("net0")).unwrap();
        runtime.create_container(&spec("a", "net0")).unwrap();
        runtime.start_container("a").unwrap();
        assert!(runtime.remove_container("a", false).is_err());
        runtime.remove_container("a", true).unwrap();
    }

    #[test]
    fn test_injected_failure_and_call_log() {
        let runtime = InMemoryRuntime::new();
        runtime.fail_on("create_network", "net1");
        runtime.create_network(&NetworkSpec::bridge("net0")).unwrap();
        assert!(matches!(
            runtime.create_network(&NetworkSpec::bridge("net1")),
            Err(RuntimeError::Rejected(_))
        ));
        assert_eq!(runtime.calls(), vec!["create_network net0", "create_network net1"]);
        assert_eq!(runtime.network_names(), vec!["net0".to_string()]);
    }

    #[test]
    fn test_find_container_by_exact_name() {
        let runtime = InMemoryRuntime::new();
        runtime.create_network(&NetworkSpec::bridge("net0")).unwrap();
        runtime.create_container(&spec("cont_img1", "net0")).unwrap();
        runtime.create_container(&spec("cont_img10", "net0")).unwrap();
        let found = runtime.find_container("cont_img1").unwrap().unwrap();
        assert!(found.has_name("cont_img1"));
        assert!(runtime.find_container("cont_img").unwrap().is_none());
    }
}

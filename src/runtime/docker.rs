//! Docker Engine API backend.
//!
//! Talks to the local daemon through bollard. The mesh core is synchronous,
//! so `DockerApi` owns a small tokio runtime and blocks on each request.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::{BuildImageOptions, CreateImageOptions};
use bollard::models::{ContainerSummary as ApiContainer, HostConfig, Network as ApiNetwork};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, ListNetworksOptions};
use bollard::Docker;
use futures::StreamExt;
use log::{debug, info};
use tokio::runtime::Runtime;

use crate::error::RuntimeError;
use crate::runtime::{ContainerRuntime, ContainerSpec, ContainerSummary, NetworkSpec, NetworkSummary};

/// Runtime backed by the Docker Engine API on the local socket.
pub struct DockerApi {
    docker: Docker,
    rt: Runtime,
    stop_timeout: Option<Duration>,
}

impl DockerApi {
    /// Connect with the local defaults (`DOCKER_HOST` or the unix socket).
    pub fn connect() -> Result<Self, RuntimeError> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("docker-api")
            .enable_all()
            .build()
            .map_err(|e| RuntimeError::Rejected(format!("failed to start the Docker client runtime: {}", e)))?;
        let docker = {
            let _guard = rt.enter();
            Docker::connect_with_local_defaults()?
        };
        Ok(Self {
            docker,
            rt,
            stop_timeout: None,
        })
    }

    /// Grace period given to a container before it is killed on stop.
    pub fn with_stop_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stop_timeout = timeout;
        self
    }
}

/// Map daemon status codes onto the runtime error taxonomy.
fn api_error(kind: &'static str, name: &str, err: BollardError) -> RuntimeError {
    match err {
        BollardError::DockerResponseServerError { status_code: 404, .. } => RuntimeError::Missing {
            kind,
            name: name.to_string(),
        },
        BollardError::DockerResponseServerError { status_code: 409, message } if message.contains("already") => {
            RuntimeError::Conflict {
                kind,
                name: name.to_string(),
            }
        }
        BollardError::DockerResponseServerError { status_code: 409, message } => RuntimeError::Rejected(message),
        other => RuntimeError::Api(other),
    }
}

fn container_config(spec: &ContainerSpec) -> Config<String> {
    Config {
        image: Some(spec.image.clone()),
        cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
        host_config: Some(HostConfig {
            network_mode: Some(spec.network.clone()),
            privileged: Some(spec.privileged),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn container_summary(container: ApiContainer) -> ContainerSummary {
    ContainerSummary {
        id: container.id.unwrap_or_default(),
        names: container.names.unwrap_or_default(),
        running: container
            .state
            .as_deref()
            .is_some_and(|state| state.eq_ignore_ascii_case("running")),
    }
}

fn network_summary(network: ApiNetwork) -> NetworkSummary {
    NetworkSummary {
        id: network.id.unwrap_or_default(),
        name: network.name.unwrap_or_default(),
        driver: network.driver.unwrap_or_default(),
    }
}

/// Tar the files directly under `context_dir` as a build context.
fn build_context(context_dir: &Path) -> Result<Vec<u8>, RuntimeError> {
    let io_error = |e: std::io::Error| RuntimeError::Rejected(format!("build context {}: {}", context_dir.display(), e));
    if !context_dir.join("Dockerfile").is_file() {
        return Err(RuntimeError::Missing {
            kind: "Dockerfile in",
            name: context_dir.display().to_string(),
        });
    }
    let mut archive = tar::Builder::new(Vec::new());
    archive.append_dir_all(".", context_dir).map_err(io_error)?;
    archive.into_inner().map_err(io_error)
}

impl ContainerRuntime for DockerApi {
    fn create_network(&self, spec: &NetworkSpec) -> Result<String, RuntimeError> {
        let options = CreateNetworkOptions {
            name: spec.name.as_str(),
            driver: spec.driver.as_str(),
            ..Default::default()
        };
        let response = self
            .rt
            .block_on(self.docker.create_network(options))
            .map_err(|e| api_error("network", &spec.name, e))?;
        if response.id.is_empty() {
            return Err(RuntimeError::Parse(format!("no ID returned for network {}", spec.name)));
        }
        Ok(response.id)
    }

    fn remove_network(&self, network: &str) -> Result<(), RuntimeError> {
        self.rt
            .block_on(self.docker.remove_network(network))
            .map_err(|e| api_error("network", network, e))
    }

    fn connect_network(&self, network: &str, container: &str) -> Result<(), RuntimeError> {
        let options = ConnectNetworkOptions {
            container,
            ..Default::default()
        };
        self.rt
            .block_on(self.docker.connect_network(network, options))
            .map_err(|e| api_error("network", network, e))
    }

    fn list_networks(&self) -> Result<Vec<NetworkSummary>, RuntimeError> {
        let options = ListNetworksOptions::<String> {
            filters: HashMap::new(),
        };
        let networks = self.rt.block_on(self.docker.list_networks(Some(options)))?;
        Ok(networks.into_iter().map(network_summary).collect())
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };
        let response = self
            .rt
            .block_on(self.docker.create_container(Some(options), container_config(spec)))
            .map_err(|e| api_error("container", &spec.name, e))?;
        Ok(response.id)
    }

    fn start_container(&self, container: &str) -> Result<(), RuntimeError> {
        self.rt
            .block_on(self.docker.start_container(container, None::<StartContainerOptions<String>>))
            .map_err(|e| api_error("container", container, e))
    }

    fn stop_container(&self, container: &str) -> Result<(), RuntimeError> {
        let options = self.stop_timeout.map(|timeout| StopContainerOptions {
            t: timeout.as_secs() as i64,
        });
        self.rt
            .block_on(self.docker.stop_container(container, options))
            .map_err(|e| api_error("container", container, e))
    }

    fn remove_container(&self, container: &str, force: bool) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.rt
            .block_on(self.docker.remove_container(container, Some(options)))
            .map_err(|e| api_error("container", container, e))
    }

    fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let containers = self.rt.block_on(self.docker.list_containers(Some(options)))?;
        Ok(containers.into_iter().map(container_summary).collect())
    }

    fn build_image(&self, context_dir: &Path, tag: &str) -> Result<(), RuntimeError> {
        let context = build_context(context_dir)?;
        let options = BuildImageOptions {
            dockerfile: "Dockerfile",
            t: tag,
            rm: true,
            ..Default::default()
        };
        self.rt.block_on(async {
            let mut stream = self.docker.build_image(options, None, Some(context.into()));
            while let Some(result) = stream.next().await {
                let chunk = result.map_err(|e| api_error("image", tag, e))?;
                if let Some(error) = chunk.error {
                    return Err(RuntimeError::Rejected(format!("build of {} failed: {}", tag, error)));
                }
                if let Some(line) = chunk.stream {
                    let line = line.trim_end();
                    if !line.is_empty() {
                        debug!("{}", line);
                    }
                }
            }
            info!("Image {} built from {}", tag, context_dir.display());
            Ok(())
        })
    }

    fn pull_image(&self, reference: &str) -> Result<(), RuntimeError> {
        let options = CreateImageOptions {
            from_image: reference,
            ..Default::default()
        };
        self.rt.block_on(async {
            let mut stream = self.docker.create_image(Some(options), None, None);
            while let Some(result) = stream.next().await {
                let chunk = result.map_err(|e| api_error("image", reference, e))?;
                if let Some(status) = chunk.status {
                    debug!("Pull progress: {}", status);
                }
            }
            Ok(())
        })
    }
}

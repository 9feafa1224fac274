//! Mesh configuration.
//!
//! `FileConfig` is the YAML schema (PascalCase keys, every field optional).
//! `MeshConfig` is the resolved configuration: command-line values with the
//! YAML values that are present laid on top.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MeshError;
use crate::mesh::BuildOptions;
use crate::topology::{self, AdjacencyMatrix, Topology};

static RESOURCE_NAME: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("resource name pattern is valid")
);

/// YAML configuration file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileConfig {
    #[serde(default)]
    pub image_settings: ImageSettings,
    #[serde(default)]
    pub network_settings: NetworkSettings,
    #[serde(default)]
    pub runtime_settings: RuntimeSettings,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_file_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_build: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_image: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_links: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_containers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_networks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_matrix: Option<Vec<Vec<bool>>>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuntimeSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_creation: Option<bool>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub stop_timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_binary: Option<PathBuf>,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid network name '{0}': use letters, digits, '_', '.' or '-'")]
    InvalidNetworkName(String),
    #[error("Invalid node name prefix '{0}' derived from the image name")]
    InvalidNodePrefix(String),
    #[error(transparent)]
    Topology(#[from] MeshError),
}

/// Resolved configuration of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshConfig {
    pub image_name: String,
    pub dockerfile_path: PathBuf,
    pub build_image: bool,
    pub pull_image: bool,
    pub network_name: String,
    pub num_containers: usize,
    pub num_networks: usize,
    pub num_links: usize,
    pub net_matrix: Option<Vec<Vec<bool>>>,
    pub privileged: bool,
    pub parallel_creation: bool,
    pub stop_timeout: Option<Duration>,
    /// Binary the generated connect script runs `exec` with.
    pub docker_binary: PathBuf,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            image_name: "test_name".to_string(),
            dockerfile_path: PathBuf::from("./"),
            build_image: false,
            pull_image: false,
            network_name: "test_network".to_string(),
            num_containers: 5,
            num_networks: 1,
            num_links: 1,
            net_matrix: None,
            privileged: false,
            parallel_creation: false,
            stop_timeout: None,
            docker_binary: PathBuf::from("docker"),
        }
    }
}

impl MeshConfig {
    /// Overlay the values present in a YAML file.
    pub fn apply(&mut self, file: FileConfig) {
        let FileConfig {
            image_settings,
            network_settings,
            runtime_settings,
        } = file;

        if let Some(path) = image_settings.docker_file_path {
            self.dockerfile_path = path;
        }
        if let Some(name) = image_settings.image_name.filter(|n| !n.is_empty()) {
            self.image_name = name;
        }
        if let Some(ignore) = image_settings.ignore_build {
            self.build_image = !ignore;
        }
        if let Some(pull) = image_settings.pull_image {
            self.pull_image = pull;
        }

        if let Some(name) = network_settings.network_name.filter(|n| !n.is_empty()) {
            self.network_name = name;
        }
        if let Some(links) = network_settings.num_links {
            self.num_links = links;
        }
        if let Some(containers) = network_settings.num_containers {
            self.num_containers = containers;
        }
        if let Some(networks) = network_settings.num_networks {
            self.num_networks = networks;
        }
        if network_settings.net_matrix.is_some() {
            self.net_matrix = network_settings.net_matrix;
        }

        if let Some(privileged) = runtime_settings.privileged {
            self.privileged = privileged;
        }
        if let Some(parallel) = runtime_settings.parallel_creation {
            self.parallel_creation = parallel;
        }
        if runtime_settings.stop_timeout.is_some() {
            self.stop_timeout = runtime_settings.stop_timeout;
        }
        if let Some(binary) = runtime_settings.docker_binary {
            self.docker_binary = binary;
        }
    }

    pub fn topology(&self) -> Topology {
        Topology::new(
            self.num_networks,
            self.num_containers,
            self.num_links,
            self.image_name.clone(),
            self.network_name.clone(),
        )
    }

    /// Adjacency matrix given in the configuration, if any.
    pub fn supplied_matrix(&self) -> Option<AdjacencyMatrix> {
        self.net_matrix.clone().map(AdjacencyMatrix::from_rows)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            privileged: self.privileged,
            parallel_groups: self.parallel_creation,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let topology = self.topology();
        topology.validate()?;
        if !RESOURCE_NAME.is_match(&topology.network_prefix) {
            return Err(ValidationError::InvalidNetworkName(topology.network_prefix));
        }
        if !RESOURCE_NAME.is_match(&topology.node_prefix) {
            return Err(ValidationError::InvalidNodePrefix(topology.node_prefix));
        }
        if let Some(matrix) = self.supplied_matrix() {
            topology::validate(&matrix, topology.group_count)?;
        }
        Ok(())
    }
}

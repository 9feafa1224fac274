use crate::config::{FileConfig, MeshConfig};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<FileConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration file '{}'", config_path.display()))?;

    let config: FileConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration file '{}'", config_path.display()))?;

    Ok(config)
}

/// Merge the optional YAML file over the command-line configuration and validate the result
pub fn resolve_config(mut config: MeshConfig, yaml_path: Option<&Path>) -> Result<MeshConfig> {
    if let Some(path) = yaml_path {
        config.apply(load_config(path)?);
    }

    config.validate().wrap_err("Invalid mesh configuration")?;

    info!(
        "Mesh: {} networks x {} containers, {} links per linked pair, image '{}'",
        config.num_networks, config.num_containers, config.num_links, config.image_name
    );
    if config.privileged {
        info!("Privileged containers requested");
    }

    Ok(config)
}

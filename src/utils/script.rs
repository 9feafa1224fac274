//! Connect helper script generation.
//!
//! The helper lets a user open a shell in a node by its global index:
//! `./connect_to_host.sh 3` runs `docker container exec -it <prefix>3 /bin/sh`.

use std::path::Path;

use crate::topology::Topology;

/// Default file name of the helper script.
pub const CONNECT_SCRIPT_NAME: &str = "connect_to_host.sh";

/// Render the helper for `total_nodes` nodes named `<node_prefix><index>`,
/// the same scheme as [`crate::topology::node_name`].
pub fn render_connect_script(total_nodes: usize, node_prefix: &str, docker_binary: &str) -> String {
    let usage = r#"echo "This script is used to enter a container by its number
	Usage:
	$0 <container_number>
	""#;
    format!(
        r#"#!/bin/bash
if [ -z "$1" ]; then
    {usage}
    exit 1
fi

case $1 in
    ''|*[!0-9]*) {usage}
    exit 1 ;;
    *) ;;
esac

if [ "$1" -ge "{total}" ]; then
    echo "the container number must be less than {total}"
    exit 1
else
    sudo {docker} container exec -it {target}$1 /bin/sh
fi
"#,
        usage = usage,
        total = total_nodes,
        docker = docker_binary,
        target = node_prefix,
    )
}

/// Write the helper for `topology` to `script_path` and make it executable.
pub fn write_connect_script(
    script_path: &Path,
    topology: &Topology,
    docker_binary: &str,
) -> color_eyre::eyre::Result<()> {
    let content = render_connect_script(topology.total_nodes(), &topology.node_prefix, docker_binary);
    std::fs::write(script_path, content)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to write script {:?}: {}", script_path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(script_path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(script_path, perms)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_script_bounds_and_target() {
        let script = render_connect_script(6, "cont_img", "docker");
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains(r#"if [ "$1" -ge "6" ]; then"#));
        assert!(script.contains("the container number must be less than 6"));
        assert!(script.contains("sudo docker container exec -it cont_img$1 /bin/sh"));
    }

    #[test]
    fn test_write_script_is_executable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONNECT_SCRIPT_NAME);
        let topology = Topology::new(2, 3, 1, "img", "net");
        write_connect_script(&path, &topology, "docker").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(r#""6""#));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }
}

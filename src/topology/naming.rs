//! Naming and indexing scheme.
//!
//! Every runtime resource of a mesh is addressed by a name computed from a
//! prefix and an index. Build-time creation, lifecycle lookups and teardown
//! all recompute names through these functions instead of storing them, so
//! they always agree on identity.

use regex::Regex;

/// Prefix used for node names when none is configured: `cont_<image>`.
///
/// Characters Docker does not accept in container names (`/`, `:`, `@`, ...)
/// are replaced by `_`.
pub fn default_node_prefix(image: &str) -> String {
    let image: String = image
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') { c } else { '_' })
        .collect();
    format!("cont_{}", image)
}

/// Name of the network owned by group `group_index`.
pub fn network_name(prefix: &str, group_index: usize) -> String {
    format!("{}{}", prefix, group_index)
}

/// Name of the node with the given global index.
pub fn node_name(prefix: &str, global_index: usize) -> String {
    format!("{}{}", prefix, global_index)
}

/// Global index of the `local_index`-th node of group `group_index`.
pub fn global_index(group_index: usize, local_index: usize, nodes_per_group: usize) -> usize {
    group_index * nodes_per_group + local_index
}

/// Inverse of [`global_index`]: `(group_index, local_index)`.
///
/// `nodes_per_group` must be at least 1.
pub fn split_global_index(global_index: usize, nodes_per_group: usize) -> (usize, usize) {
    (global_index / nodes_per_group, global_index % nodes_per_group)
}

/// Matches runtime names of the form `<prefix><index>` exactly.
#[derive(Debug, Clone)]
pub struct NodeNamePattern {
    regex: Regex,
}

impl NodeNamePattern {
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(r"^/?{}(\d+)$", regex::escape(prefix)))?;
        Ok(Self { regex })
    }

    /// Global index encoded in `name`, if it follows the pattern.
    ///
    /// A leading `/` (as reported by the Docker API) is accepted.
    pub fn parse(&self, name: &str) -> Option<usize> {
        self.regex
            .captures(name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

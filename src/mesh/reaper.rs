//! Teardown by naming convention.
//!
//! The reaper lists live containers and networks and force-removes every one
//! whose name matches, containers first so that networks have no endpoints
//! left. It never looks at an in-memory [`crate::mesh::Environment`], so it
//! also cleans up after a crash or a build that stopped halfway.
//!
//! Hazard: the default matcher is a substring test. Any unrelated container
//! or network whose name contains the prefix is removed as well, so prefixes
//! must be chosen to be distinctive.

use log::{info, warn};

use crate::error::MeshError;
use crate::progress::{timed, ProgressSink};
use crate::runtime::ContainerRuntime;

/// Decides whether a runtime resource belongs to the mesh.
pub trait NameMatcher: Send + Sync {
    fn matches(&self, name: &str) -> bool;
}

impl<F> NameMatcher for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, name: &str) -> bool {
        self(name)
    }
}

/// Matches names containing a fixed needle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstringMatcher {
    needle: String,
}

impl SubstringMatcher {
    pub fn new(needle: impl Into<String>) -> Self {
        Self { needle: needle.into() }
    }
}

impl NameMatcher for SubstringMatcher {
    fn matches(&self, name: &str) -> bool {
        !self.needle.is_empty() && name.contains(&self.needle)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapOptions {
    /// Continue past a failed removal and collect the error in the report.
    pub keep_going: bool,
}

/// What a teardown removed.
#[derive(Debug, Default)]
pub struct ReapReport {
    pub removed_containers: Vec<String>,
    pub removed_networks: Vec<String>,
    /// Removal failures skipped with [`ReapOptions::keep_going`].
    pub failures: Vec<MeshError>,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.removed_containers.is_empty() && self.removed_networks.is_empty()
    }
}

/// Remove every container and network whose name matches.
///
/// Matchers see bare container names: Docker's leading `/` is stripped first.
pub fn reap(
    containers: &dyn NameMatcher,
    networks: &dyn NameMatcher,
    runtime: &dyn ContainerRuntime,
    sink: &dyn ProgressSink,
    options: ReapOptions,
) -> Result<ReapReport, MeshError> {
    let mut report = ReapReport::default();

    let doomed: Vec<(String, String)> = runtime
        .list_containers()
        .map_err(|e| MeshError::runtime("list containers", "*", e))?
        .into_iter()
        .filter_map(|c| {
            let name = c
                .names
                .iter()
                .map(|n| n.trim_start_matches('/'))
                .find(|n| containers.matches(n))?;
            Some((c.id.clone(), name.to_string()))
        })
        .collect();
    for (id, name) in doomed {
        let removed = timed(
            sink,
            || runtime.remove_container(&id, true),
            |_| format!("Container {} removed successfully", name),
        )
        .map_err(|e| MeshError::runtime("remove container", name.as_str(), e));
        match removed {
            Ok(()) => report.removed_containers.push(name),
            Err(err) if options.keep_going => {
                warn!("{}", err);
                report.failures.push(err);
            }
            Err(err) => return Err(err),
        }
    }

    let doomed: Vec<(String, String)> = runtime
        .list_networks()
        .map_err(|e| MeshError::runtime("list networks", "*", e))?
        .into_iter()
        .filter(|n| networks.matches(&n.name))
        .map(|n| (n.id, n.name))
        .collect();
    for (id, name) in doomed {
        let removed = timed(
            sink,
            || runtime.remove_network(&id),
            |_| format!("Network {} removed successfully", name),
        )
        .map_err(|e| MeshError::runtime("remove network", name.as_str(), e));
        match removed {
            Ok(()) => report.removed_networks.push(name),
            Err(err) if options.keep_going => {
                warn!("{}", err);
                report.failures.push(err);
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        "Teardown removed {} containers and {} networks",
        report.removed_containers.len(),
        report.removed_networks.len()
    );
    Ok(report)
}

/// Teardown using substring matching on the node and network prefixes.
pub fn reap_by_prefix(
    node_prefix: &str,
    network_prefix: &str,
    runtime: &dyn ContainerRuntime,
    sink: &dyn ProgressSink,
) -> Result<ReapReport, MeshError> {
    reap(
        &SubstringMatcher::new(node_prefix),
        &SubstringMatcher::new(network_prefix),
        runtime,
        sink,
        ReapOptions::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NullSink, RecordingSink};
    use crate::runtime::{ContainerSpec, InMemoryRuntime, NetworkSpec};

    fn seed(runtime: &InMemoryRuntime, network: &str, containers: &[&str]) {
        runtime.create_network(&NetworkSpec::bridge(network)).unwrap();
        for name in containers {
            runtime
                .create_container(&ContainerSpec {
                    name: name.to_string(),
                    image: "img".to_string(),
                    network: network.to_string(),
                    command: Vec::new(),
                    privileged: false,
                })
                .unwrap();
            runtime.start_container(name).unwrap();
        }
    }

    #[test]
    fn test_substring_matcher() {
        let matcher = SubstringMatcher::new("cont_img");
        assert!(matcher.matches("cont_img0"));
        assert!(matcher.matches("cont_img12"));
        assert!(matcher.matches("old_cont_img_backup"));
        assert!(!matcher.matches("cont_other"));
        assert!(!SubstringMatcher::new("").matches("anything"));
    }

    #[test]
    fn test_removes_containers_before_networks() {
        let runtime = InMemoryRuntime::new();
        seed(&runtime, "net0", &["cont_img0", "cont_img1"]);
        runtime.clear_calls();

        let sink = RecordingSink::new();
        let report = reap_by_prefix("cont_img", "net", &runtime, &sink).unwrap();
        assert_eq!(report.removed_containers, vec!["cont_img0", "cont_img1"]);
        assert_eq!(report.removed_networks, vec!["net0"]);
        assert_eq!(
            runtime.calls(),
            vec!["remove_container cont_img0", "remove_container cont_img1", "remove_network net0"]
        );
        assert_eq!(sink.messages().len(), 3);
    }

    #[test]
    fn test_leaves_unrelated_resources() {
        let runtime = InMemoryRuntime::new();
        seed(&runtime, "net0", &["cont_img0"]);
        seed(&runtime, "db_net", &["postgres"]);
        reap_by_prefix("cont_img", "net0", &runtime, &NullSink).unwrap();
        assert_eq!(runtime.container_names(), vec!["postgres".to_string()]);
        assert_eq!(runtime.network_names(), vec!["db_net".to_string()]);
    }

    #[test]
    fn test_second_reap_is_a_noop() {
        let runtime = InMemoryRuntime::new();
        seed(&runtime, "net0", &["cont_img0"]);
        reap_by_prefix("cont_img", "net", &runtime, &NullSink).unwrap();
        let report = reap_by_prefix("cont_img", "net", &runtime, &NullSink).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_aborts_on_first_failure_by_default() {
        let runtime = InMemoryRuntime::new();
        seed(&runtime, "net0", &["cont_img0", "cont_img1"]);
        runtime.fail_on("remove_container", "cont_img0");
        let err = reap_by_prefix("cont_img", "net", &runtime, &NullSink).unwrap_err();
        assert_eq!(err.resource(), Some("cont_img0"));
        assert_eq!(runtime.container_names().len(), 2);
    }

    #[test]
    fn test_keep_going_collects_failures() {
        let runtime = InMemoryRuntime::new();
        seed(&runtime, "net0", &["cont_img0", "cont_img1"]);
        runtime.fail_on("remove_container", "cont_img0");
        let report = reap(
            &SubstringMatcher::new("cont_img"),
            &SubstringMatcher::new("net"),
            &runtime,
            &NullSink,
            ReapOptions { keep_going: true },
        )
        .unwrap();
        assert_eq!(report.removed_containers, vec!["cont_img1"]);
        // net0 still has cont_img0 attached
        assert!(report.removed_networks.is_empty());
        assert_eq!(report.failures.len(), 2);
    }

    #[test]
    fn test_custom_matcher_closure() {
        let runtime = InMemoryRuntime::new();
        seed(&runtime, "net0", &["cont_img0", "cont_img1"]);
        let only_first = |name: &str| name == "cont_img0";
        let no_networks = |_: &str| false;
        let report = reap(&only_first, &no_networks, &runtime, &NullSink, ReapOptions::default()).unwrap();
        assert_eq!(report.removed_containers, vec!["cont_img0"]);
        assert_eq!(runtime.network_names(), vec!["net0".to_string()]);
    }

    #[test]
    fn test_matchers_see_bare_names() {
        let runtime = InMemoryRuntime::new();
        seed(&runtime, "net0", &["cont_img0"]);
        let seen = std::sync::Mutex::new(Vec::new());
        let prefix = |name: &str| {
            seen.lock().unwrap().push(name.to_string());
            name.starts_with("cont_img")
        };
        let report = reap(&prefix, &|name: &str| name.starts_with("net"), &runtime, &NullSink, ReapOptions::default())
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["cont_img0"]);
        assert_eq!(report.removed_containers, vec!["cont_img0"]);
        assert_eq!(report.removed_networks, vec!["net0"]);
        assert!(runtime.container_names().is_empty());
    }
}

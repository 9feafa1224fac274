//! Session orchestration.
//!
//! This module coordinates a whole run: picking the runtime, preparing the
//! image, building the mesh on a worker thread while progress is presented on
//! the calling thread, and holding the built mesh for stop/restart/status
//! requests until it is torn down.

use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::thread;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{debug, info, warn};

use crate::api::StatusFeed;
use crate::config::MeshConfig;
use crate::error::MeshError;
use crate::mesh::{self, BuildOptions, Environment, EnvironmentBuilder, LifecycleTracker, ReapOptions, ReapReport, SubstringMatcher};
use crate::progress::{self, timed, ProgressEvent, ProgressSink};
use crate::runtime::{ContainerRuntime, DockerApi, InMemoryRuntime};
use crate::status::StatusSnapshot;
use crate::topology::{AdjacencyMatrix, NodeNamePattern, Topology};

/// Registry images are pulled from when `pull_image` is set.
pub const PULL_REGISTRY: &str = "docker.io/library";

/// Runtime selected by the configuration: the local Docker daemon, or the
/// in-memory runtime for dry runs.
pub fn runtime_for(config: &MeshConfig, dry_run: bool) -> Result<Box<dyn ContainerRuntime>> {
    if dry_run {
        info!("Dry run: using the in-memory runtime");
        return Ok(Box::new(InMemoryRuntime::new()));
    }
    let docker = DockerApi::connect().wrap_err("Failed to connect to the Docker daemon")?;
    Ok(Box::new(docker.with_stop_timeout(config.stop_timeout)))
}

pub fn pull_reference(image: &str) -> String {
    format!("{}/{}", PULL_REGISTRY, image)
}

/// Build and/or pull the node image as the configuration asks.
pub fn prepare_image(runtime: &dyn ContainerRuntime, config: &MeshConfig, sink: &dyn ProgressSink) -> Result<()> {
    if config.build_image {
        info!("Building image '{}' from {:?}", config.image_name, config.dockerfile_path);
        timed(
            sink,
            || runtime.build_image(&config.dockerfile_path, &config.image_name),
            |_| format!("Image {} built successfully", config.image_name),
        )
        .map_err(|e| MeshError::runtime("build image", config.image_name.as_str(), e))
        .wrap_err_with(|| format!("Failed to build image from {:?}", config.dockerfile_path))?;
    }

    if config.pull_image {
        let reference = pull_reference(&config.image_name);
        info!("Pulling image '{}'", reference);
        timed(
            sink,
            || runtime.pull_image(&reference),
            |_| format!("Image {} pulled successfully", reference),
        )
        .map_err(|e| MeshError::runtime("pull image", reference.as_str(), e))
        .wrap_err_with(|| format!("Failed to pull image '{}'", reference))?;
    }

    Ok(())
}

/// Run `work` on a scoped worker thread with a channel sink and hand every
/// event to `observer` on the calling thread as it arrives.
///
/// Returns once the worker has finished and every event has been observed.
fn run_on_worker<T, W, O>(work: W, mut observer: O) -> T
where
    T: Send,
    W: FnOnce(&dyn ProgressSink) -> T + Send,
    O: FnMut(ProgressEvent),
{
    let (sink, events): (_, Receiver<ProgressEvent>) = progress::channel();
    thread::scope(|scope| {
        let worker = scope.spawn(move || {
            let sink = sink;
            work(&sink)
        });
        // Ends when the worker drops the sink.
        for event in events {
            observer(event);
        }
        worker
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })
}

/// Build the mesh on a worker thread, reporting progress to `observer`.
pub fn run_build<O>(
    runtime: &dyn ContainerRuntime,
    topology: &Topology,
    matrix: &AdjacencyMatrix,
    options: BuildOptions,
    observer: O,
) -> Result<Environment>
where
    O: FnMut(ProgressEvent),
{
    info!(
        "Setting up the environment: {} networks, {} nodes",
        topology.group_count,
        topology.total_nodes()
    );
    run_on_worker(
        |sink| EnvironmentBuilder::new(runtime, sink).with_options(options).build(topology, matrix),
        observer,
    )
    .wrap_err("Failed to build the mesh")
}

/// Remove every container and network matching the prefixes of `topology`.
///
/// Matching is by substring, so resources of other meshes whose names contain
/// these prefixes are removed too.
pub fn run_teardown<O>(
    runtime: &dyn ContainerRuntime,
    topology: &Topology,
    options: ReapOptions,
    observer: O,
) -> Result<ReapReport>
where
    O: FnMut(ProgressEvent),
{
    info!(
        "Deleting the environment: containers matching '{}', networks matching '{}'",
        topology.node_prefix, topology.network_prefix
    );
    let containers = SubstringMatcher::new(topology.node_prefix.clone());
    let networks = SubstringMatcher::new(topology.network_prefix.clone());
    let report = run_on_worker(
        |sink| mesh::reap(&containers, &networks, runtime, sink, options),
        observer,
    )
    .wrap_err("Failed to delete the environment")?;

    for failure in &report.failures {
        warn!("Left behind: {}", failure);
    }
    Ok(report)
}

/// Nodes of the `node_prefix` naming scheme the runtime currently knows,
/// mapped to whether they are running.
pub fn discover_live_nodes(runtime: &dyn ContainerRuntime, node_prefix: &str) -> Result<BTreeMap<usize, bool>> {
    let pattern = NodeNamePattern::new(node_prefix)
        .wrap_err_with(|| format!("Invalid node name prefix '{}'", node_prefix))?;
    let containers = runtime
        .list_containers()
        .map_err(|e| MeshError::runtime("list containers", "*", e))?;

    let mut live = BTreeMap::new();
    for container in containers {
        if let Some(index) = container.names.iter().find_map(|name| pattern.parse(name)) {
            live.insert(index, container.running);
        }
    }
    debug!("Discovered {} live nodes with prefix '{}'", live.len(), node_prefix);
    Ok(live)
}

/// A built mesh and the lifecycle state this process tracks for it.
pub struct Session<'a> {
    runtime: &'a dyn ContainerRuntime,
    environment: Environment,
    tracker: LifecycleTracker,
    feed: Option<StatusFeed>,
}

impl<'a> Session<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, environment: Environment) -> Self {
        let tracker = LifecycleTracker::from_environment(&environment);
        Self {
            runtime,
            environment,
            tracker,
            feed: None,
        }
    }

    /// Publish the status into `feed` now and after every lifecycle change.
    pub fn with_status_feed(mut self, feed: StatusFeed) -> Self {
        feed.publish(self.status());
        self.feed = Some(feed);
        self
    }

    fn publish(&self) {
        if let Some(feed) = &self.feed {
            feed.publish(self.status());
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn tracker(&self) -> &LifecycleTracker {
        &self.tracker
    }

    pub fn total_nodes(&self) -> usize {
        self.environment.total_nodes()
    }

    pub fn stop_node(&mut self, global_index: usize) -> Result<(), MeshError> {
        self.tracker.stop(global_index, self.runtime)?;
        self.publish();
        Ok(())
    }

    pub fn restart_node(&mut self, global_index: usize) -> Result<(), MeshError> {
        self.tracker.restart(global_index, self.runtime)?;
        self.publish();
        Ok(())
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot::capture(&self.environment, &self.tracker)
    }

    pub fn live_nodes(&self) -> Result<BTreeMap<usize, bool>> {
        discover_live_nodes(self.runtime, &self.environment.topology.node_prefix)
    }

    /// Tear the mesh down. Every tracked node is considered removed afterwards.
    pub fn teardown<O>(&mut self, options: ReapOptions, observer: O) -> Result<ReapReport>
    where
        O: FnMut(ProgressEvent),
    {
        let report = run_teardown(self.runtime, &self.environment.topology, options, observer)?;
        self.tracker.mark_all_removed();
        Ok(report)
    }
}

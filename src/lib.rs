//! # ContainMesh - Container mesh orchestration
//!
//! This library builds a mesh of isolated container groups on a local
//! container runtime, links groups together according to an adjacency
//! matrix, lets the user stop and restart individual nodes, and tears the
//! whole environment down again.
//!
//! ## Overview
//!
//! A mesh is described by a handful of numbers: how many groups (networks),
//! how many nodes per group, and how many nodes of a group join each linked
//! peer network. Every node runs the same image with a keepalive command so
//! it can be entered and manipulated afterwards.
//!
//! ## Key Features
//!
//! - **Deterministic naming**: nodes are `cont_<image><n>`, networks `<name><g>`
//! - **Directed links**: `matrix[i][j]` attaches nodes of group `i` to network `j`
//! - **Lifecycle tracking**: stop/restart with explicit state transitions
//! - **Crash recovery**: leftovers of earlier runs are reaped by name prefix
//! - **Pluggable runtime**: the Docker Engine API, or an in-memory runtime for tests and dry runs
//! - **Status endpoint**: optional read-only `GET /api/graph` while the menu runs
//!
//! ## Architecture
//!
//! - `error`: `MeshError` and `RuntimeError` taxonomy
//! - `topology`: mesh parameters, adjacency matrix, naming scheme
//! - `runtime`: the `ContainerRuntime` capability and its implementations
//! - `mesh`: environment builder, lifecycle tracker, reaper
//! - `progress`: progress events and sinks
//! - `status`: read-only status snapshot
//! - `api`: HTTP endpoint serving the status snapshot
//! - `config`, `config_loader`: YAML schema, merge with the command line, validation
//! - `utils`: connect helper script
//! - `orchestrator`: threaded build/teardown and the session around a built mesh
//! - `console`: progress rendering and the interactive menu
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use containmesh::config::MeshConfig;
//! use containmesh::orchestrator::{run_build, Session};
//! use containmesh::runtime::InMemoryRuntime;
//! use containmesh::topology::AdjacencyMatrix;
//!
//! let config = MeshConfig { num_networks: 2, num_containers: 3, ..MeshConfig::default() };
//! let matrix = AdjacencyMatrix::from_rows(vec![vec![false, true], vec![false, false]]);
//! let runtime = InMemoryRuntime::new();
//!
//! let environment = run_build(&runtime, &config.topology(), &matrix, config.build_options(), |event| {
//!     println!("{} {:?}", event.message, event.elapsed);
//! })?;
//! let mut session = Session::new(&runtime, environment);
//! session.stop_node(4)?;
//! println!("{}", session.status().to_json()?);
//! # Ok::<(), color_eyre::eyre::Report>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! ImageSettings:
//!   DockerFilePath: "./"
//!   ImageName: "alpine"
//!   IgnoreBuild: true
//!   PullImage: true
//! NetworkSettings:
//!   NetworkName: "test_network"
//!   NumNetworks: 2
//!   NumContainers: 3
//!   NumLinks: 1
//!   NetMatrix:
//!     - [false, true]
//!     - [false, false]
//! RuntimeSettings:
//!   Privileged: false
//!   StopTimeout: "10s"
//! ```
//!
//! ## Error Handling
//!
//! The mesh core returns typed errors (`MeshError`). The outer layers
//! (`config_loader`, `orchestrator`, the binary) use `color_eyre` to attach
//! context.

pub mod error;
pub mod topology;
pub mod runtime;
pub mod mesh;
pub mod progress;
pub mod status;
pub mod api;
pub mod config;
pub mod config_loader;
pub mod utils;
pub mod orchestrator;
pub mod console;

//! Mesh orchestration core.
//!
//! - `types.rs`: nodes, networks, links and the environment aggregate
//! - `builder.rs`: ordered creation of networks, nodes and links
//! - `lifecycle.rs`: stop/restart state tracking
//! - `reaper.rs`: teardown of everything matching the naming convention

pub mod builder;
pub mod lifecycle;
pub mod reaper;
pub mod types;

pub use builder::{build, BuildOptions, EnvironmentBuilder};
pub use lifecycle::LifecycleTracker;
pub use reaper::{reap, reap_by_prefix, NameMatcher, ReapOptions, ReapReport, SubstringMatcher};
pub use types::{Environment, Link, Network, Node, NodeState};

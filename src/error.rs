//! Error types shared by the mesh core.
//!
//! `RuntimeError` describes a failure reported by the container runtime
//! capability. `MeshError` is the taxonomy surfaced by topology validation,
//! the environment builder, the lifecycle tracker and the reaper.

use std::io;

/// Failures reported by a [`crate::runtime::ContainerRuntime`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Docker API error: {0}")]
    Api(#[from] bollard::errors::Error),

    #[error("unexpected runtime output: {0}")]
    Parse(String),

    #[error("{kind} {name} already exists")]
    Conflict { kind: &'static str, name: String },

    #[error("no such {kind}: {name}")]
    Missing { kind: &'static str, name: String },

    #[error("{0}")]
    Rejected(String),
}

/// Errors raised while building, operating or tearing down a mesh.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("{operation} failed for {resource}: {source}")]
    RuntimeOperationFailed {
        operation: &'static str,
        resource: String,
        #[source]
        source: RuntimeError,
    },

    #[error("container {name} not found")]
    NodeNotFound { name: String },

    #[error("invalid transition for node {index}: {message}")]
    InvalidTransition { index: usize, message: String },

    #[error("failed to read topology input: {0}")]
    Prompt(#[from] io::Error),
}

impl MeshError {
    /// Wrap a runtime failure with the operation and resource it concerned.
    pub fn runtime(operation: &'static str, resource: impl Into<String>, source: RuntimeError) -> Self {
        MeshError::RuntimeOperationFailed {
            operation,
            resource: resource.into(),
            source,
        }
    }

    /// Name of the resource involved, when the error concerns one.
    pub fn resource(&self) -> Option<&str> {
        match self {
            MeshError::RuntimeOperationFailed { resource, .. } => Some(resource),
            MeshError::NodeNotFound { name } => Some(name),
            _ => None,
        }
    }
}

//! Spatial-subsystem error type.

use thiserror::Error;

use crowd_core::NodeId;

/// Errors produced by `crowd-spatial`.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("no route from {from} to {to}")]
    NoRoute { from: NodeId, to: NodeId },

    #[error("road network has no nodes")]
    EmptyNetwork,

    #[error("node {0} not found in network")]
    NodeNotFound(NodeId),

    #[error("route has {0} point(s); at least 2 are required")]
    DegenerateRoute(usize),

    #[error("network cache format error: {0}")]
    CacheFormat(String),

    #[error("network cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SpatialResult<T> = Result<T, SpatialError>;

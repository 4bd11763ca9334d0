use thiserror::Error;

use crowd_core::CoreError;
use crowd_mobility::MobilityError;
use crowd_spatial::SpatialError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    /// No usable route between the requested points.
    #[error("failed to compute route: {0}")]
    NoRoute(#[source] SpatialError),

    #[error("road network error: {0}")]
    Spatial(#[from] SpatialError),

    #[error("mobility error: {0}")]
    Mobility(#[from] MobilityError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// The movement scheduler is no longer running.
    #[error("simulation is shut down")]
    ShutDown,

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type SimResult<T> = Result<T, SimError>;

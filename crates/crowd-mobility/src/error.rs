use thiserror::Error;

#[derive(Debug, Error)]
pub enum MobilityError {
    /// The in-flight ceiling is reached; retry on a later tick.
    #[error("route request deferred ({in_flight}/{ceiling} in flight)")]
    Deferred { in_flight: usize, ceiling: usize },

    #[error("route cursor {cursor} is past the end of a {len}-point route")]
    CursorOutOfRange { cursor: usize, len: usize },

    #[error("resolver pool could not start: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

pub type MobilityResult<T> = Result<T, MobilityError>;

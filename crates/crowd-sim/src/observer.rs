//! Broadcast observer trait, driven by the runtime's broadcast task.

use async_trait::async_trait;

use crowd_agent::AgentSnapshot;

/// Receives a population snapshot every broadcast tick.
///
/// All methods have defaults except [`on_frame`](Self::on_frame).
///
/// # Example: frame counter
///
/// ```rust,ignore
/// struct Counter(u64);
///
/// #[async_trait]
/// impl SimObserver for Counter {
///     async fn on_frame(&mut self, _frame: Vec<AgentSnapshot>) {
///         self.0 += 1;
///     }
/// }
/// ```
#[async_trait]
pub trait SimObserver: Send + 'static {
    /// `false` skips taking the snapshot this tick (e.g. no subscribers).
    fn wants_frame(&self) -> bool {
        true
    }

    /// One point-in-time snapshot of the population, ordered by agent id.
    async fn on_frame(&mut self, frame: Vec<AgentSnapshot>);

    /// Called once when the runtime shuts down.
    async fn on_shutdown(&mut self) {}
}

/// A [`SimObserver`] that never asks for frames.
pub struct NoopObserver;

#[async_trait]
impl SimObserver for NoopObserver {
    fn wants_frame(&self) -> bool {
        false
    }

    async fn on_frame(&mut self, _frame: Vec<AgentSnapshot>) {}
}

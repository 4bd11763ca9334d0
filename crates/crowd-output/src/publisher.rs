//! Fan-out of population snapshots to subscribers.
//!
//! # One publish
//!
//! ```text
//! no subscribers → skip (nothing serialized)
//! snapshot → Frame::encode (JSON once)
//!          → deliver to every subscriber concurrently, each under a timeout
//!          → subscribers that failed or timed out are dropped
//! ```
//!
//! Subscribers are registered through a cloneable [`PublisherHandle`] while
//! the publisher itself is owned by the runtime's broadcast task.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crowd_agent::AgentSnapshot;
use crowd_sim::SimObserver;

use crate::{Frame, OutputError, Subscriber};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

struct Entry {
    id:  SubscriberId,
    sub: Box<dyn Subscriber>,
}

#[derive(Default)]
struct Registry {
    entries:   Vec<Entry>,
    next_id:   u64,
    /// Unsubscribed while their entry was out for delivery.
    cancelled: Vec<SubscriberId>,
}

/// Counters for one [`Publisher::publish`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub agents:    usize,
    pub delivered: usize,
    pub dropped:   usize,
    /// `true` when there was nobody to publish to.
    pub skipped:   bool,
}

/// Registers and removes subscribers from any task.
#[derive(Clone)]
pub struct PublisherHandle {
    registry: Arc<Mutex<Registry>>,
}

impl PublisherHandle {
    pub fn subscribe(&self, sub: impl Subscriber + 'static) -> SubscriberId {
        let mut reg = lock(&self.registry);
        let id = SubscriberId(reg.next_id);
        reg.next_id += 1;
        reg.entries.push(Entry { id, sub: Box::new(sub) });
        debug!(subscriber = id.0, "subscribed");
        id
    }

    /// Returns `false` if `id` is not currently registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut reg = lock(&self.registry);
        let before = reg.entries.len();
        reg.entries.retain(|e| e.id != id);
        if reg.entries.len() < before {
            return true;
        }
        if id.0 < reg.next_id {
            reg.cancelled.push(id);
        }
        false
    }

    /// Subscribers registered and not mid-delivery.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).entries.len()
    }
}

pub struct Publisher {
    registry: Arc<Mutex<Registry>>,
    timeout:  Duration,
    seq:      u64,
}

impl Publisher {
    /// `timeout` bounds each single delivery.
    pub fn new(timeout: Duration) -> Self {
        Self { registry: Arc::default(), timeout, seq: 0 }
    }

    pub fn handle(&self) -> PublisherHandle {
        PublisherHandle { registry: Arc::clone(&self.registry) }
    }

    /// Frames published so far.
    pub fn frames(&self) -> u64 {
        self.seq
    }

    /// Encode `agents` once and deliver to every subscriber concurrently.
    pub async fn publish(&mut self, agents: Vec<AgentSnapshot>) -> PublishStats {
        let mut entries = std::mem::take(&mut lock(&self.registry).entries);
        if entries.is_empty() {
            return PublishStats { skipped: true, ..PublishStats::default() };
        }

        let frame = match Frame::encode(self.seq, agents) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "frame encoding failed; frame skipped");
                self.restore(entries);
                return PublishStats::default();
            }
        };
        self.seq += 1;

        let timeout = self.timeout;
        let results = join_all(entries.iter_mut().map(|e| {
            let frame = &frame;
            async move {
                match tokio::time::timeout(timeout, e.sub.deliver(frame)).await {
                    Ok(result) => result,
                    Err(_) => Err(OutputError::Timeout(timeout)),
                }
            }
        }))
        .await;

        let mut stats = PublishStats { agents: frame.len(), ..PublishStats::default() };
        let mut kept = Vec::with_capacity(entries.len());
        for (entry, result) in entries.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    stats.delivered += 1;
                    kept.push(entry);
                }
                Err(e) => {
                    stats.dropped += 1;
                    info!(subscriber = entry.id.0, error = %e, "subscriber dropped");
                }
            }
        }
        self.restore(kept);
        stats
    }

    /// Put delivered-to entries back ahead of any registered meanwhile.
    fn restore(&self, mut kept: Vec<Entry>) {
        let mut reg = lock(&self.registry);
        let cancelled = std::mem::take(&mut reg.cancelled);
        kept.retain(|e| !cancelled.contains(&e.id));
        kept.append(&mut reg.entries);
        reg.entries = kept;
    }

    /// Close every attached subscriber.  Close errors are logged only.
    pub async fn close(&mut self) {
        let mut entries = std::mem::take(&mut lock(&self.registry).entries);
        for entry in entries.iter_mut() {
            if let Err(e) = entry.sub.close().await {
                warn!(subscriber = entry.id.0, error = %e, "subscriber close failed");
            }
        }
    }
}

#[async_trait]
impl SimObserver for Publisher {
    fn wants_frame(&self) -> bool {
        !lock(&self.registry).entries.is_empty()
    }

    async fn on_frame(&mut self, frame: Vec<AgentSnapshot>) {
        let stats = self.publish(frame).await;
        if stats.dropped > 0 {
            debug!(delivered = stats.delivered, dropped = stats.dropped, "publish");
        }
    }

    async fn on_shutdown(&mut self) {
        self.close().await;
    }
}

fn lock(m: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

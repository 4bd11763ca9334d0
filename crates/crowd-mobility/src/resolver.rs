//! Bounded asynchronous route resolution.
//!
//! # Flow
//!
//! ```text
//! scheduler ── request() ──► in-flight ceiling ──► rayon pool job
//!     ▲                          │ (full: Deferred)        │
//!     └──── completion channel ◄─┴─────────────────────────┘
//!           (AgentId, Result<Route>)
//! ```
//!
//! A request either starts immediately or is refused with
//! [`MobilityError::Deferred`]; nothing queues beyond the ceiling.  Each job
//! delivers exactly one `(agent, result)` pair.  Jobs are never cancelled; a
//! result for an agent that no longer exists is dropped by the consumer.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use crowd_core::{AgentId, GeoPoint, SimRng};
use crowd_spatial::{RoadNetwork, Route, SpatialResult};

use crate::{MobilityError, MobilityResult};

/// What to compute.  No destination means exploratory: walk to a random
/// reachable node.
#[derive(Copy, Clone, Debug)]
pub struct RouteRequest {
    pub agent:       AgentId,
    pub origin:      GeoPoint,
    pub destination: Option<GeoPoint>,
}

impl RouteRequest {
    pub fn towards(agent: AgentId, origin: GeoPoint, destination: GeoPoint) -> Self {
        Self { agent, origin, destination: Some(destination) }
    }

    pub fn exploratory(agent: AgentId, origin: GeoPoint) -> Self {
        Self { agent, origin, destination: None }
    }
}

/// One delivered result.
#[derive(Debug)]
pub struct Resolution {
    pub agent:  AgentId,
    pub result: SpatialResult<Route>,
}

#[derive(Copy, Clone, Debug)]
pub struct ResolverConfig {
    pub threads: usize,
    pub ceiling: usize,
    pub seed:    u64,
}

// ── In-flight limit ───────────────────────────────────────────────────────────

/// Counting limit; a [`Permit`] holds one slot until dropped.
#[derive(Debug)]
pub struct InFlightLimit {
    count:   Arc<AtomicUsize>,
    ceiling: usize,
}

#[derive(Debug)]
pub struct Permit {
    count: Arc<AtomicUsize>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}

impl InFlightLimit {
    pub fn new(ceiling: usize) -> Self {
        Self { count: Arc::new(AtomicUsize::new(0)), ceiling }
    }

    pub fn try_acquire(&self) -> Option<Permit> {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < self.ceiling).then_some(n + 1))
            .ok()
            .map(|_| Permit { count: Arc::clone(&self.count) })
    }

    pub fn in_flight(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}

// ── RouteResolver ─────────────────────────────────────────────────────────────

pub struct RouteResolver {
    network: Arc<RoadNetwork>,
    pool:    rayon::ThreadPool,
    limit:   InFlightLimit,
    seed:    u64,
    tickets: AtomicU64,
    tx:      mpsc::UnboundedSender<Resolution>,
}

impl RouteResolver {
    /// Start the worker pool.  The returned receiver is the completion
    /// channel; its single consumer is the movement scheduler.
    pub fn new(
        network: Arc<RoadNetwork>,
        config:  ResolverConfig,
    ) -> MobilityResult<(Self, mpsc::UnboundedReceiver<Resolution>)> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads.max(1))
            .thread_name(|i| format!("route-resolver-{i}"))
            .build()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let resolver = Self {
            network,
            pool,
            limit: InFlightLimit::new(config.ceiling),
            seed: config.seed,
            tickets: AtomicU64::new(0),
            tx,
        };
        Ok((resolver, rx))
    }

    /// Start computing `req` off the caller's thread.
    ///
    /// # Errors
    ///
    /// [`MobilityError::Deferred`] when the in-flight ceiling is reached.
    pub fn request(&self, req: RouteRequest) -> MobilityResult<()> {
        let permit = self.limit.try_acquire().ok_or(MobilityError::Deferred {
            in_flight: self.limit.in_flight(),
            ceiling:   self.limit.ceiling(),
        })?;

        let ticket  = self.tickets.fetch_add(1, Ordering::Relaxed);
        let seed    = self.seed;
        let network = Arc::clone(&self.network);
        let tx      = self.tx.clone();

        self.pool.spawn(move || {
            let mut rng = SimRng::stream(seed, ticket);
            let result = match req.destination {
                Some(dst) => network.route_between(req.origin, dst, &mut rng),
                None      => network.route_from(req.origin, &mut rng),
            };
            // Free the slot before delivery so the consumer never observes a
            // result whose slot is still taken.
            drop(permit);
            if tx.send(Resolution { agent: req.agent, result }).is_err() {
                trace!(agent = %req.agent, "completion channel closed; result dropped");
            }
        });
        Ok(())
    }

    pub fn in_flight(&self) -> usize {
        self.limit.in_flight()
    }

    pub fn ceiling(&self) -> usize {
        self.limit.ceiling()
    }

    pub fn network(&self) -> &Arc<RoadNetwork> {
        &self.network
    }
}

//! Fluent builder for constructing a [`Sim`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::info;

use crowd_core::{SimConfig, SimRng};
use crowd_mobility::{ResolverConfig, RouteResolver};
use crowd_spatial::RoadNetwork;

use crate::campaign::poll_event;
use crate::traffic::poll_random_traffic;
use crate::{Scheduler, SimContext, SimHandle, SimResult, TickStats};

/// Child-stream offsets of the root RNG, one per independently scheduled task.
mod streams {
    pub const SCHEDULER: u64 = 1;
    pub const CONTROL:   u64 = 2;
    pub const EVENT:     u64 = 3;
    pub const TRAFFIC:   u64 = 4;
    pub const BANK:      u64 = 5;
    pub const RESOLVER:  u64 = 6;
}

/// Fluent builder for [`Sim`].
///
/// # Optional inputs (have defaults)
///
/// | Method         | Default                                           |
/// |----------------|---------------------------------------------------|
/// | `.network(n)`  | [`RoadNetwork::from_config`]: cache or synthetic grid |
///
/// # Example
///
/// ```rust,ignore
/// let sim = SimBuilder::new(SimConfig::default()).build()?;
/// let handle = sim.handle();
/// let runtime = SimRuntime::start(sim, NoopObserver);
/// ```
pub struct SimBuilder {
    config:  SimConfig,
    network: Option<Arc<RoadNetwork>>,
}

impl SimBuilder {
    pub fn new(config: SimConfig) -> Self {
        Self { config, network: None }
    }

    /// Use an already loaded road network instead of loading one from the
    /// config.
    pub fn network(mut self, network: Arc<RoadNetwork>) -> Self {
        self.network = Some(network);
        self
    }

    /// Validate the config, load the network if needed, start the resolver
    /// pool and return a ready-to-run [`Sim`].
    pub fn build(self) -> SimResult<Sim> {
        self.config.validate()?;

        let network = match self.network {
            Some(n) => n,
            None => Arc::new(RoadNetwork::from_config(&self.config)?),
        };

        let mut root = SimRng::new(self.config.seed);
        let resolver_seed: u64 = root.child(streams::RESOLVER).random();
        let (resolver, completions) = RouteResolver::new(
            Arc::clone(&network),
            ResolverConfig {
                threads: self.config.resolver_thread_count(),
                ceiling: self.config.resolver_in_flight,
                seed:    resolver_seed,
            },
        )?;

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(SimContext::new(
            self.config,
            network,
            resolver,
            control_tx,
            root.child(streams::CONTROL),
        ));
        info!(
            source = %ctx.network.source(),
            nodes = ctx.network.graph().node_count(),
            edges = ctx.network.graph().edge_count(),
            resolver_threads = ctx.config.resolver_thread_count(),
            refresh = ?ctx.config.route_refresh,
            "simulation built"
        );

        let scheduler = Scheduler::new(Arc::clone(&ctx), completions, control_rx, root.child(streams::SCHEDULER));
        Ok(Sim {
            ctx,
            scheduler,
            event_rng:   root.child(streams::EVENT),
            traffic_rng: root.child(streams::TRAFFIC),
            bank_rng:    root.child(streams::BANK),
        })
    }
}

// ── Sim ───────────────────────────────────────────────────────────────────────

/// A built simulation: shared context, movement scheduler and one RNG stream
/// per periodic task.
///
/// Drive it by hand with the `step`/`poll_*` methods (tests, batch runs) or
/// hand it to [`SimRuntime::start`](crate::SimRuntime::start), which runs the
/// periodic tasks.
pub struct Sim {
    pub(crate) ctx:         Arc<SimContext>,
    pub(crate) scheduler:   Scheduler,
    pub(crate) event_rng:   SimRng,
    pub(crate) traffic_rng: SimRng,
    pub(crate) bank_rng:    SimRng,
}

impl Sim {
    pub fn handle(&self) -> SimHandle {
        SimHandle::new(Arc::clone(&self.ctx))
    }

    pub fn context(&self) -> &Arc<SimContext> {
        &self.ctx
    }

    /// One movement tick.
    pub fn step(&mut self, now: Instant) -> TickStats {
        self.scheduler.step(now)
    }

    /// One event-campaign poll; returns agents spawned.
    pub fn poll_event(&mut self, now: Instant) -> usize {
        poll_event(&self.ctx, now, &mut self.event_rng)
    }

    /// One random-traffic poll; returns agents spawned.
    pub fn poll_random_traffic(&mut self, now: Instant) -> usize {
        poll_random_traffic(&self.ctx, now, &mut self.traffic_rng)
    }

    /// Fill the route bank synchronously up to the configured target.
    pub fn warm_route_bank(&mut self) -> usize {
        self.ctx.network.precompute_route_bank(self.ctx.config.route_bank_target, &mut self.bank_rng)
    }
}

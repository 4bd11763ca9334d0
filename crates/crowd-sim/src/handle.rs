//! The control surface: a cloneable handle over the shared context.
//!
//! Route-computing calls run on tokio's blocking pool so they never stall
//! the periodic tasks.  Removal goes through the movement scheduler as a
//! [`Control`] command.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::info;

use crowd_agent::{AgentFilter, AgentSnapshot};
use crowd_core::{CampaignId, GeoPoint};
use crowd_spatial::Route;

use crate::campaign::{self, EventCampaignConfig, EventStatus};
use crate::generators::{self, CrowdOutcome, CrowdRouteRequest};
use crate::traffic::{self, RandomTrafficConfig, RandomTrafficStatus};
use crate::{Control, SimContext, SimError, SimResult};

/// Cache and pool sizes for diagnostics.
#[derive(Clone, Debug, Serialize)]
pub struct PerfStatus {
    pub agents:                usize,
    pub route_bank_size:       usize,
    pub routes_by_start_nodes: usize,
    pub variant_cache_keys:    usize,
    pub nearest_cache_entries: usize,
    pub in_flight:             usize,
    pub pending_agents:        usize,
    pub speed_multiplier:      f64,
    pub network_source:        String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub agents: usize,
}

#[derive(Clone)]
pub struct SimHandle {
    ctx: Arc<SimContext>,
}

impl SimHandle {
    pub(crate) fn new(ctx: Arc<SimContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<SimContext> {
        &self.ctx
    }

    // ── Generators ────────────────────────────────────────────────────────

    /// Spawn `n` wandering agents.  Returns how many got a route.
    pub async fn add_agents(&self, n: usize) -> SimResult<usize> {
        let ctx = Arc::clone(&self.ctx);
        let added = tokio::task::spawn_blocking(move || {
            let mut rng = ctx.fork_rng();
            generators::add_agents(&ctx, n, &mut rng)
        })
        .await?;
        Ok(added)
    }

    pub async fn add_routed_crowd(&self, req: CrowdRouteRequest) -> SimResult<CrowdOutcome> {
        let ctx = Arc::clone(&self.ctx);
        tokio::task::spawn_blocking(move || {
            let mut rng = ctx.fork_rng();
            generators::add_routed_crowd(&ctx, &req, &mut rng)
        })
        .await?
    }

    // ── Campaigns ─────────────────────────────────────────────────────────

    /// Start (or replace) the event campaign; the first wave launches on the
    /// next poll.
    pub fn start_event(&self, config: EventCampaignConfig) -> SimResult<CampaignId> {
        campaign::start(&self.ctx, config, Instant::now())
    }

    /// Returns whether a campaign was running.
    pub fn stop_event(&self) -> bool {
        campaign::stop(&self.ctx)
    }

    pub fn event_status(&self) -> EventStatus {
        campaign::status(&self.ctx, Instant::now())
    }

    pub fn start_random_traffic(&self, config: RandomTrafficConfig) -> SimResult<()> {
        traffic::start(&self.ctx, config, Instant::now())
    }

    pub fn stop_random_traffic(&self) -> bool {
        traffic::stop(&self.ctx)
    }

    pub fn random_traffic_status(&self) -> RandomTrafficStatus {
        traffic::status(&self.ctx, Instant::now())
    }

    // ── Speed ─────────────────────────────────────────────────────────────

    /// Store `value` clamped to `[0.01, 10]` and return the stored value.
    pub fn set_speed_multiplier(&self, value: f64) -> f64 {
        let stored = self.ctx.speed.set(value);
        info!(requested = value, stored, "speed multiplier set");
        stored
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.ctx.speed.get()
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Vec<AgentSnapshot> {
        self.ctx.store.snapshot()
    }

    /// Live agents within `radius` degrees of `point`, boundary inclusive.
    pub fn count_within(&self, point: GeoPoint, radius: f64) -> usize {
        self.ctx.store.count_within(point, radius)
    }

    /// Shortest route between two points, without spawning anything.
    pub async fn route_preview(&self, source: GeoPoint, destination: GeoPoint) -> SimResult<Route> {
        let ctx = Arc::clone(&self.ctx);
        tokio::task::spawn_blocking(move || {
            let mut rng = ctx.fork_rng();
            ctx.network
                .route_between(source, destination, &mut rng)
                .map_err(SimError::NoRoute)
        })
        .await?
    }

    pub fn perf_status(&self) -> PerfStatus {
        let net = &self.ctx.network;
        PerfStatus {
            agents:                self.ctx.store.len(),
            route_bank_size:       net.bank_len(),
            routes_by_start_nodes: net.bank_origins(),
            variant_cache_keys:    net.variant_cache_len(),
            nearest_cache_entries: net.nearest_cache_len(),
            in_flight:             self.ctx.resolver.in_flight(),
            pending_agents:        self.ctx.store.pending_count(),
            speed_multiplier:      self.ctx.speed.get(),
            network_source:        net.source().to_string(),
        }
    }

    pub fn health(&self) -> Health {
        Health { status: "ok", agents: self.ctx.store.len() }
    }

    // ── Removal ───────────────────────────────────────────────────────────

    /// Queue a clear for the movement scheduler and wait for its reply.
    /// Returns `(removed, remaining)`.
    ///
    /// # Errors
    ///
    /// [`SimError::ShutDown`] if the scheduler is no longer running.
    pub async fn clear_agents(&self, filter: AgentFilter) -> SimResult<(usize, usize)> {
        let (reply, rx) = oneshot::channel();
        self.ctx
            .control
            .send(Control::Clear { filter, reply })
            .map_err(|_| SimError::ShutDown)?;
        let (removed, remaining) = rx.await.map_err(|_| SimError::ShutDown)?;
        info!(?filter, removed, remaining, "clear applied");
        Ok((removed, remaining))
    }
}

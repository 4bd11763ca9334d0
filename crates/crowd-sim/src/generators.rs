//! One-shot population generators and the shared route-variation helper.

use serde::{Deserialize, Serialize};
use tracing::info;

use crowd_agent::{Agent, AgentBuilder, AgentKind};
use crowd_core::{GeoPoint, SimRng};
use crowd_spatial::{RoadNetwork, Route};

use crate::{SimContext, SimError, SimResult};

/// Per-tick step range (degrees) for spawned agents.
pub const SPEED_RANGE: (f64, f64) = (0.0003, 0.0008);

/// Alternates computed for a routed crowd.
pub const CROWD_VARIANTS: usize = 5;

/// Jitter added to immediate-spawn seed points so repeated spawns do not all
/// hit the same nearest-node cache cell.
const SEED_JITTER: f64 = 1e-5;

/// Random bend spliced into a route near its middle.
#[derive(Copy, Clone, Debug)]
pub struct Detour {
    pub probability: f64,
    /// Maximum waypoint offset on each axis, degrees.
    pub spread:      f64,
}

pub const CROWD_DETOUR: Detour = Detour { probability: 0.25, spread: 0.003 };

/// With `detour.probability`, bend `route` through a waypoint perturbed from
/// a point in its first half, then rejoin the original destination.  Any
/// routing failure keeps the original route.
pub fn vary_route(network: &RoadNetwork, route: &Route, detour: Detour, rng: &mut SimRng) -> Route {
    if !rng.gen_bool(detour.probability) {
        return route.clone();
    }
    let mid = rng.gen_range(1..=(route.len() / 2).max(1));
    let mid_pt = route[mid];
    let waypoint = mid_pt.offset(
        rng.uniform(-detour.spread, detour.spread),
        rng.uniform(-detour.spread, detour.spread),
    );

    let Ok(out) = network.route_between(mid_pt, waypoint, rng) else {
        return route.clone();
    };
    let Ok(back) = network.route_between(waypoint, route.end(), rng) else {
        return route.clone();
    };
    route.splice_detour(mid, &out, &back).unwrap_or_else(|_| route.clone())
}

pub(crate) fn random_speed(rng: &mut SimRng, lo: f64, hi: f64) -> f64 {
    rng.uniform(lo, hi)
}

// ── Immediate spawn ───────────────────────────────────────────────────────────

/// Spawn `n` wandering agents at random snapped points, each with an
/// exploratory route.  Agents whose route cannot be computed are skipped.
/// Returns the number added.
pub fn add_agents(ctx: &SimContext, n: usize, rng: &mut SimRng) -> usize {
    let bbox = ctx.config.bbox;
    let mut batch: Vec<Agent> = Vec::with_capacity(n);
    for _ in 0..n {
        let seed = bbox
            .sample(rng)
            .offset(rng.uniform(-SEED_JITTER, SEED_JITTER), rng.uniform(-SEED_JITTER, SEED_JITTER));
        let Ok(route) = ctx.network.route_from(seed, rng) else { continue };
        batch.push(
            AgentBuilder::new(ctx.ids.next_agent())
                .route(route)
                .speed(random_speed(rng, SPEED_RANGE.0, SPEED_RANGE.1))
                .build(),
        );
    }
    let added = ctx.store.insert_many(batch);
    info!(added, total = ctx.store.len(), "added agents");
    added
}

// ── Routed crowd ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrowdRouteRequest {
    #[serde(default = "one")]
    pub number:      usize,
    pub source:      GeoPoint,
    pub destination: GeoPoint,
}

fn one() -> usize {
    1
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrowdOutcome {
    pub added:         usize,
    pub variants_used: usize,
    pub total:         usize,
}

/// Spawn `req.number` stop-at-destination agents spread over up to
/// [`CROWD_VARIANTS`] alternates between source and destination.
///
/// # Errors
///
/// [`SimError::NoRoute`] if no variant can be computed.
pub fn add_routed_crowd(ctx: &SimContext, req: &CrowdRouteRequest, rng: &mut SimRng) -> SimResult<CrowdOutcome> {
    if req.number < 1 {
        return Ok(CrowdOutcome { added: 0, variants_used: 0, total: ctx.store.len() });
    }
    let variants = ctx
        .network
        .variants_between(req.source, req.destination, CROWD_VARIANTS, rng)
        .map_err(SimError::NoRoute)?;

    let mut batch: Vec<Agent> = Vec::with_capacity(req.number);
    for _ in 0..req.number {
        let Some(base) = rng.choose(&variants[..]) else { break };
        let route = vary_route(&ctx.network, base, CROWD_DETOUR, rng);
        batch.push(
            AgentBuilder::new(ctx.ids.next_agent())
                .route(route)
                .speed(random_speed(rng, SPEED_RANGE.0, SPEED_RANGE.1))
                .kind(AgentKind::Routed)
                .stop_at_end(true)
                .build(),
        );
    }
    let added = ctx.store.insert_many(batch);
    let total = ctx.store.len();
    info!(added, variants = variants.len(), total, "added routed crowd");
    Ok(CrowdOutcome { added, variants_used: variants.len(), total })
}

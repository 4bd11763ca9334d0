//! Steady-state background traffic with admission control.
//!
//! Each due interval the controller compares the random-kind population with
//! its target and the total population with its ceiling:
//!
//! ```text
//! total >= max            → skip this cycle
//! random < target         → spawn uniform[batch_min, batch_max], clamped to max - total
//! otherwise               → nothing to do
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crowd_agent::{Agent, AgentBuilder, AgentFilter, AgentKind, Pending};
use crowd_core::SimRng;
use crowd_mobility::RouteRequest;

use crate::campaign::MAX_CAMPAIGN_SECONDS;
use crate::context::lock;
use crate::generators::random_speed;
use crate::{SimContext, SimError, SimResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomTrafficConfig {
    pub target_agents:    usize,
    pub max_agents:       usize,
    pub interval_seconds: f64,
    pub batch_min:        usize,
    pub batch_max:        usize,
    pub min_speed:        f64,
    pub max_speed:        f64,
}

impl Default for RandomTrafficConfig {
    fn default() -> Self {
        Self {
            target_agents:    200,
            max_agents:       400,
            interval_seconds: 2.0,
            batch_min:        5,
            batch_max:        15,
            min_speed:        0.0003,
            max_speed:        0.0008,
        }
    }
}

impl RandomTrafficConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.batch_min > self.batch_max {
            return Err(SimError::Config(format!(
                "batch_min ({}) exceeds batch_max ({})",
                self.batch_min, self.batch_max
            )));
        }
        if !(self.min_speed.is_finite() && self.max_speed.is_finite())
            || self.min_speed < 0.0
            || self.min_speed > self.max_speed
        {
            return Err(SimError::Config(format!(
                "invalid speed bounds [{}, {}]",
                self.min_speed, self.max_speed
            )));
        }
        if self.target_agents > self.max_agents {
            return Err(SimError::Config(format!(
                "target_agents ({}) exceeds max_agents ({})",
                self.target_agents, self.max_agents
            )));
        }
        if !(self.interval_seconds > 0.0 && self.interval_seconds <= MAX_CAMPAIGN_SECONDS) {
            return Err(SimError::Config(format!(
                "interval_seconds must be in (0, {MAX_CAMPAIGN_SECONDS}], got {}",
                self.interval_seconds
            )));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_seconds).unwrap_or(Duration::ZERO)
    }
}

// ── Runtime state ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RandomTraffic {
    config:     Option<RandomTrafficConfig>,
    active:     bool,
    next_spawn: Option<Instant>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RandomTrafficStatus {
    pub active:                bool,
    pub random_agent_count:    usize,
    pub total_agents:          usize,
    pub next_spawn_in_seconds: Option<f64>,
    pub config:                Option<RandomTrafficConfig>,
}

impl RandomTraffic {
    /// Replace any running controller.  The first cycle is due immediately.
    pub fn start(&mut self, config: RandomTrafficConfig, now: Instant) {
        self.config = Some(config);
        self.active = true;
        self.next_spawn = Some(now);
    }

    pub fn stop(&mut self) -> bool {
        let was_active = self.active;
        self.active = false;
        self.next_spawn = None;
        was_active
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// If a cycle is due at `now`, re-arm the deadline and return the config.
    fn take_due(&mut self, now: Instant) -> Option<RandomTrafficConfig> {
        if !self.active || !self.next_spawn.is_some_and(|t| t <= now) {
            return None;
        }
        let config = self.config.clone()?;
        self.next_spawn = now.checked_add(config.interval());
        Some(config)
    }

    pub fn status(&self, now: Instant, random_agent_count: usize, total_agents: usize) -> RandomTrafficStatus {
        RandomTrafficStatus {
            active: self.active,
            random_agent_count,
            total_agents,
            next_spawn_in_seconds: self
                .next_spawn
                .filter(|_| self.active)
                .map(|t| t.saturating_duration_since(now).as_secs_f64()),
            config: self.config.clone(),
        }
    }
}

// ── Poll ──────────────────────────────────────────────────────────────────────

/// Run one admission-control cycle if due at `now`.  Returns the number of
/// agents spawned.
pub fn poll_random_traffic(ctx: &SimContext, now: Instant, rng: &mut SimRng) -> usize {
    let Some(config) = lock(&ctx.traffic).take_due(now) else {
        return 0;
    };

    let (random, total) = ctx.store.count_matching(AgentFilter::Random);
    if total >= config.max_agents {
        debug!(total, max = config.max_agents, "random traffic: population at ceiling, skipping");
        return 0;
    }
    if random >= config.target_agents {
        return 0;
    }

    let headroom = config.max_agents - total;
    let batch = rng.gen_range(config.batch_min..=config.batch_max).min(headroom);
    if batch == 0 {
        return 0;
    }

    let added = if ctx.network.bank_len() > 0 {
        spawn_from_bank(ctx, &config, batch, rng)
    } else {
        spawn_resolving(ctx, &config, batch, rng)
    };
    info!(added, random = random + added, total = total + added, "random traffic spawned");
    added
}

/// Instant spawn with routes drawn from the bank.
fn spawn_from_bank(ctx: &SimContext, config: &RandomTrafficConfig, batch: usize, rng: &mut SimRng) -> usize {
    let mut agents: Vec<Agent> = Vec::with_capacity(batch);
    for _ in 0..batch {
        let Ok(route) = ctx.network.draw_from_bank(rng) else { continue };
        agents.push(
            AgentBuilder::new(ctx.ids.next_agent())
                .route(route)
                .speed(random_speed(rng, config.min_speed, config.max_speed))
                .kind(AgentKind::Random)
                .build(),
        );
    }
    ctx.store.insert_many(agents)
}

/// Insert agents at random points and let the resolver find their routes.
/// A deferred request leaves the agent route-less; the scheduler retries it.
fn spawn_resolving(ctx: &SimContext, config: &RandomTrafficConfig, batch: usize, rng: &mut SimRng) -> usize {
    let mut deferred = 0usize;
    for _ in 0..batch {
        let id = ctx.ids.next_agent();
        let origin = ctx.config.bbox.sample(rng);
        ctx.store.insert(
            AgentBuilder::new(id)
                .position(origin)
                .speed(random_speed(rng, config.min_speed, config.max_speed))
                .kind(AgentKind::Random)
                .in_flight()
                .build(),
        );
        if ctx.resolver.request(RouteRequest::exploratory(id, origin)).is_err() {
            deferred += 1;
            ctx.store.with_agent_mut(id, |a| {
                if matches!(a.motion.pending, Some(Pending::InFlight)) {
                    a.motion.pending = None;
                }
            });
        }
    }
    if deferred > 0 {
        debug!(deferred, "random traffic: resolver at capacity");
    }
    batch
}

// ── Control ───────────────────────────────────────────────────────────────────

pub(crate) fn start(ctx: &SimContext, config: RandomTrafficConfig, now: Instant) -> SimResult<()> {
    config.validate()?;
    info!(
        target_agents = config.target_agents,
        max_agents = config.max_agents,
        interval_s = config.interval_seconds,
        "random traffic started"
    );
    lock(&ctx.traffic).start(config, now);
    Ok(())
}

pub(crate) fn stop(ctx: &SimContext) -> bool {
    let was_active = lock(&ctx.traffic).stop();
    if was_active {
        info!("random traffic stopped");
    }
    was_active
}

pub(crate) fn status(ctx: &SimContext, now: Instant) -> RandomTrafficStatus {
    let (random, total) = ctx.store.count_matching(AgentFilter::Random);
    lock(&ctx.traffic).status(now, random, total)
}

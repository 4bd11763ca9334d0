//! The movement scheduler: the only mutator of existing agents.
//!
//! # One step
//!
//! ```text
//! ① Control     : apply queued clear commands (the only bulk removal path)
//! ② Completions : drain resolver results into each agent's pending slot
//! ③ Agents      : for each id in a point-in-time snapshot:
//!                    resolved result  → install route (or clear a failure)
//!                    still in flight  → skip
//!                    no route         → event state machine / idle / refresh
//!                    route            → bounded step at speed × multiplier
//! ```
//!
//! The store is locked per agent, never across the step.  Work that may be
//! slow (bank draws, resolver submissions) happens between two short lock
//! sections; the second section re-checks that the agent still wants it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

use crowd_agent::{Agent, EventPhase, EventState, Pending};
use crowd_core::{AgentId, GeoPoint, RouteRefresh, SimRng};
use crowd_mobility::{advance, Advance, MobilityError, Resolution, RouteRequest};

use crate::{Control, SimContext};

/// Distance outside the bounding box of an event agent's exit target, degrees.
pub const EXIT_MARGIN: f64 = 0.02;

/// Counters for one [`Scheduler::step`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    pub processed:  usize,
    pub moved:      usize,
    /// Exiting event agents that left the population.
    pub removed:    usize,
    /// Agents removed by clear commands.
    pub cleared:    usize,
    pub requests:   usize,
    pub deferred:   usize,
    /// Resolver results installed as routes.
    pub applied:    usize,
    /// Resolver results that carried no route, and failed bank draws.
    pub failed:     usize,
    pub faults:     usize,
    /// Results for agents that no longer exist.
    pub discarded:  usize,
    pub bank_draws: usize,
}

/// What an agent needs after its locked section.
enum Outcome {
    Done,
    Moved,
    Failed,
    Fault(MobilityError),
    /// Finished its exit route; remove.
    Exited,
    /// Needs a bank route starting near this position.
    Refresh(GeoPoint),
    /// Needs a resolver request.
    Request(RouteRequest),
}

pub struct Scheduler {
    ctx:         Arc<SimContext>,
    completions: mpsc::UnboundedReceiver<Resolution>,
    control:     mpsc::UnboundedReceiver<Control>,
    rng:         SimRng,
}

impl Scheduler {
    pub(crate) fn new(
        ctx:         Arc<SimContext>,
        completions: mpsc::UnboundedReceiver<Resolution>,
        control:     mpsc::UnboundedReceiver<Control>,
        rng:         SimRng,
    ) -> Self {
        Self { ctx, completions, control, rng }
    }

    /// Run one movement tick at wall time `now`.
    pub fn step(&mut self, now: Instant) -> TickStats {
        let mut stats = TickStats::default();

        // ── ① Control commands ────────────────────────────────────────────
        while let Ok(cmd) = self.control.try_recv() {
            match cmd {
                Control::Clear { filter, reply } => {
                    let (removed, remaining) = self.ctx.store.remove_matching(filter);
                    stats.cleared += removed;
                    debug!(?filter, removed, remaining, "agents cleared");
                    // The caller may have given up waiting.
                    let _ = reply.send((removed, remaining));
                }
            }
        }

        // ── ② Resolver completions ────────────────────────────────────────
        while let Ok(Resolution { agent, result }) = self.completions.try_recv() {
            let route = match result {
                Ok(route) => Some(route),
                Err(e) => {
                    trace!(%agent, error = %e, "route resolution failed");
                    None
                }
            };
            let delivered = self.ctx.store.with_agent_mut(agent, |a| {
                a.motion.pending = Some(Pending::Resolved(route));
            });
            if delivered.is_none() {
                trace!(%agent, "result for a removed agent discarded");
                stats.discarded += 1;
            }
        }

        // ── ③ Agents ──────────────────────────────────────────────────────
        let multiplier = self.ctx.speed.get();
        let refresh = self.ctx.config.route_refresh;
        for id in self.ctx.store.ids() {
            let ctx = &self.ctx;
            let rng = &mut self.rng;
            let Some(outcome) = ctx
                .store
                .with_agent_mut(id, |a| step_agent(a, ctx, now, multiplier, refresh, rng, &mut stats))
            else {
                continue;
            };
            stats.processed += 1;
            self.finish(id, outcome, &mut stats);
        }

        debug!(
            processed = stats.processed,
            moved = stats.moved,
            removed = stats.removed,
            requests = stats.requests,
            deferred = stats.deferred,
            applied = stats.applied,
            faults = stats.faults,
            "movement tick"
        );
        stats
    }

    /// Act on an agent's outcome outside its lock section.
    fn finish(&mut self, id: AgentId, outcome: Outcome, stats: &mut TickStats) {
        match outcome {
            Outcome::Done => {}
            Outcome::Moved => stats.moved += 1,
            Outcome::Failed => stats.failed += 1,
            Outcome::Fault(e) => {
                debug!(agent = %id, error = %e, "agent fault; route cleared");
                stats.faults += 1;
            }
            Outcome::Exited => {
                stats.moved += 1;
                if self.ctx.store.remove(id).is_some() {
                    stats.removed += 1;
                }
            }
            Outcome::Refresh(pos) => match self.ctx.network.draw_from_bank_near(pos, &mut self.rng) {
                Ok(route) => {
                    let installed = self.ctx.store.with_agent_mut(id, |a| {
                        if a.motion.has_route() || a.motion.is_pending() {
                            return false;
                        }
                        a.motion.install_route(route);
                        true
                    });
                    if installed == Some(true) {
                        stats.bank_draws += 1;
                    }
                }
                Err(e) => {
                    trace!(agent = %id, error = %e, "bank draw failed");
                    stats.failed += 1;
                }
            },
            Outcome::Request(req) => match self.ctx.resolver.request(req) {
                Ok(()) => {
                    stats.requests += 1;
                    // This scheduler is the only consumer of completions, so
                    // the result cannot have been applied yet.
                    self.ctx.store.with_agent_mut(id, |a| a.motion.pending = Some(Pending::InFlight));
                }
                Err(MobilityError::Deferred { .. }) => stats.deferred += 1,
                Err(e) => {
                    debug!(agent = %id, error = %e, "route request rejected");
                    stats.faults += 1;
                }
            },
        }
    }
}

/// The locked part of one agent's step.
fn step_agent(
    agent:      &mut Agent,
    ctx:        &SimContext,
    now:        Instant,
    multiplier: f64,
    refresh:    RouteRefresh,
    rng:        &mut SimRng,
    stats:      &mut TickStats,
) -> Outcome {
    // ── Pending result ────────────────────────────────────────────────────
    match agent.motion.pending.take() {
        Some(Pending::Resolved(Some(route))) => {
            agent.motion.install_route(route);
            stats.applied += 1;
        }
        Some(Pending::Resolved(None)) => return Outcome::Failed,
        Some(Pending::InFlight) => {
            agent.motion.pending = Some(Pending::InFlight);
            return Outcome::Done;
        }
        None => {}
    }

    // ── No route: lifecycle or refresh ────────────────────────────────────
    if !agent.motion.has_route() {
        let (id, position) = (agent.id, agent.motion.position);
        if let Some(ev) = agent.event_mut() {
            return match ev.phase {
                EventPhase::ToDest => {
                    arrive(ev, now, rng);
                    Outcome::Done
                }
                EventPhase::Dwelling if ev.dwell_until.is_some_and(|t| now >= t) => {
                    if ev.exit_after_dwell {
                        ev.phase = EventPhase::Exiting;
                        exit_request(id, position, ctx, rng)
                    } else {
                        ev.phase = EventPhase::Settled;
                        Outcome::Done
                    }
                }
                // The exit route never arrived: ask again.
                EventPhase::Exiting => exit_request(id, position, ctx, rng),
                EventPhase::Dwelling | EventPhase::Settled => Outcome::Done,
            };
        }
        if agent.stop_at_end {
            return Outcome::Done;
        }
        return match refresh {
            RouteRefresh::Bank     => Outcome::Refresh(position),
            RouteRefresh::Resolver => Outcome::Request(RouteRequest::exploratory(id, position)),
        };
    }

    // ── Movement ──────────────────────────────────────────────────────────
    let step = agent.motion.speed * multiplier;
    match advance(&mut agent.motion, step) {
        Ok(Advance::Idle) => Outcome::Done,
        Ok(Advance::Moved | Advance::Waypoint) => Outcome::Moved,
        Ok(Advance::Finished) => {
            agent.motion.clear_route();
            match agent.event_mut() {
                Some(ev) if ev.phase == EventPhase::Exiting => Outcome::Exited,
                Some(ev) if ev.phase == EventPhase::ToDest => {
                    arrive(ev, now, rng);
                    Outcome::Moved
                }
                _ => Outcome::Moved,
            }
        }
        Err(e) => {
            agent.motion.clear_route();
            Outcome::Fault(e)
        }
    }
}

/// `to_dest → dwelling` with a deadline drawn from the dwell bounds.  A
/// deadline past the clock's range leaves the agent dwelling.
fn arrive(ev: &mut EventState, now: Instant, rng: &mut SimRng) {
    let secs = rng.uniform(ev.dwell_min.as_secs_f64(), ev.dwell_max.as_secs_f64());
    let dwell = Duration::try_from_secs_f64(secs).unwrap_or(ev.dwell_min);
    ev.phase = EventPhase::Dwelling;
    ev.dwell_until = now.checked_add(dwell);
}

fn exit_request(agent: AgentId, position: GeoPoint, ctx: &SimContext, rng: &mut SimRng) -> Outcome {
    let target = ctx.config.bbox.exit_point(EXIT_MARGIN, rng);
    Outcome::Request(RouteRequest::towards(agent, position, target))
}

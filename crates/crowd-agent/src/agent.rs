//! Agent model: a shared motion core plus a tagged kind.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crowd_core::{AgentId, CampaignId, GeoPoint};
use crowd_spatial::Route;

// ── RouteProgress ─────────────────────────────────────────────────────────────

/// A route plus the index of the waypoint the agent is walking toward.
///
/// Installing a route places the agent on `route[0]`, so the cursor starts
/// at 1.  Invariant: `1 <= next <= route.len()`; `next == route.len()` means
/// the route is finished.
#[derive(Clone, Debug)]
pub struct RouteProgress {
    route: Route,
    next:  usize,
}

impl RouteProgress {
    pub fn new(route: Route) -> Self {
        Self { route, next: 1 }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Index of the current target waypoint.
    pub fn cursor(&self) -> usize {
        self.next
    }

    /// Current target, `None` once finished.
    pub fn target(&self) -> Option<GeoPoint> {
        self.route.get(self.next).copied()
    }

    /// Move the cursor past the current target.  Returns `true` when that
    /// was the last waypoint.
    pub fn advance(&mut self) -> bool {
        self.next = (self.next + 1).min(self.route.len());
        self.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.route.len()
    }

    pub fn remaining(&self) -> usize {
        self.route.len() - self.next
    }
}

// ── Pending resolution ────────────────────────────────────────────────────────

/// State of the single outstanding route request an agent may hold.
#[derive(Clone, Debug)]
pub enum Pending {
    /// Submitted to the resolver, no result yet.
    InFlight,
    /// Result delivered; applied at the start of the agent's next step.
    /// `None` means the computation failed.
    Resolved(Option<Route>),
}

// ── Motion ────────────────────────────────────────────────────────────────────

/// Movement state common to every agent kind.
#[derive(Clone, Debug)]
pub struct Motion {
    pub position: GeoPoint,
    pub route:    Option<RouteProgress>,
    /// Degrees per tick before the global multiplier.
    pub speed:    f64,
    pub pending:  Option<Pending>,
}

impl Motion {
    pub fn new(position: GeoPoint, speed: f64) -> Self {
        Self { position, route: None, speed, pending: None }
    }

    /// Snap onto the route's first point and start walking toward the second.
    pub fn install_route(&mut self, route: Route) {
        self.position = route.start();
        self.route = Some(RouteProgress::new(route));
    }

    pub fn clear_route(&mut self) {
        self.route = None;
    }

    pub fn has_route(&self) -> bool {
        self.route.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

// ── Kinds ─────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    ToDest,
    Dwelling,
    Exiting,
    Settled,
}

/// Per-agent state of an event-campaign participant.
#[derive(Clone, Debug)]
pub struct EventState {
    pub phase:            EventPhase,
    pub dwell_min:        Duration,
    pub dwell_max:        Duration,
    /// Set on arrival; meaningful only in `Dwelling`.
    pub dwell_until:      Option<Instant>,
    pub exit_after_dwell: bool,
    pub campaign:         CampaignId,
}

impl EventState {
    pub fn new(campaign: CampaignId, dwell_min: Duration, dwell_max: Duration, exit_after_dwell: bool) -> Self {
        Self {
            phase: EventPhase::ToDest,
            dwell_min,
            dwell_max,
            dwell_until: None,
            exit_after_dwell,
            campaign,
        }
    }
}

#[derive(Clone, Debug)]
pub enum AgentKind {
    /// Spawned by the immediate-spawn generator; wanders indefinitely.
    Generic,
    /// Background traffic; counted by the random-traffic controller.
    Random,
    /// Follows a fixed source → destination route, then idles.
    Routed,
    Event(EventState),
}

/// Wire tag for [`AgentKind`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindTag {
    Generic,
    Random,
    Routed,
    Event,
}

impl AgentKind {
    pub fn tag(&self) -> KindTag {
        match self {
            AgentKind::Generic  => KindTag::Generic,
            AgentKind::Random   => KindTag::Random,
            AgentKind::Routed   => KindTag::Routed,
            AgentKind::Event(_) => KindTag::Event,
        }
    }

    pub fn phase(&self) -> Option<EventPhase> {
        match self {
            AgentKind::Event(ev) => Some(ev.phase),
            _ => None,
        }
    }
}

// ── Agent ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Agent {
    pub id:          AgentId,
    pub motion:      Motion,
    pub kind:        AgentKind,
    /// Idle permanently once the current route is finished.
    pub stop_at_end: bool,
}

impl Agent {
    pub fn is_event(&self) -> bool {
        matches!(self.kind, AgentKind::Event(_))
    }

    pub fn event_mut(&mut self) -> Option<&mut EventState> {
        match &mut self.kind {
            AgentKind::Event(ev) => Some(ev),
            _ => None,
        }
    }
}

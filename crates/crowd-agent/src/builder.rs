//! Fluent construction of [`Agent`]s.
//!
//! # Usage
//!
//! ```rust
//! use crowd_agent::{AgentBuilder, AgentKind};
//! use crowd_core::{AgentId, GeoPoint};
//! use crowd_spatial::Route;
//!
//! let route = Route::new(vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.001, 0.0)]).unwrap();
//! let agent = AgentBuilder::new(AgentId(1))
//!     .route(route)
//!     .speed(0.0005)
//!     .kind(AgentKind::Routed)
//!     .stop_at_end(true)
//!     .build();
//!
//! assert_eq!(agent.motion.position, GeoPoint::new(0.0, 0.0));
//! assert_eq!(agent.motion.route.as_ref().unwrap().cursor(), 1);
//! ```

use crowd_core::{AgentId, GeoPoint};
use crowd_spatial::Route;

use crate::agent::{Agent, AgentKind, Motion, Pending};

/// Default per-tick step in degrees.
pub const DEFAULT_SPEED: f64 = 0.0005;

pub struct AgentBuilder {
    id:          AgentId,
    position:    GeoPoint,
    route:       Option<Route>,
    speed:       f64,
    kind:        AgentKind,
    stop_at_end: bool,
    pending:     bool,
}

impl AgentBuilder {
    pub fn new(id: AgentId) -> Self {
        Self {
            id,
            position:    GeoPoint::new(0.0, 0.0),
            route:       None,
            speed:       DEFAULT_SPEED,
            kind:        AgentKind::Generic,
            stop_at_end: false,
            pending:     false,
        }
    }

    /// Initial position.  Overridden by [`route`](Self::route), which snaps
    /// the agent onto the route's first point.
    pub fn position(mut self, p: GeoPoint) -> Self {
        self.position = p;
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn kind(mut self, kind: AgentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn stop_at_end(mut self, stop: bool) -> Self {
        self.stop_at_end = stop;
        self
    }

    /// Mark a route request as already submitted for this agent.
    pub fn in_flight(mut self) -> Self {
        self.pending = true;
        self
    }

    pub fn build(self) -> Agent {
        let mut motion = Motion::new(self.position, self.speed);
        if let Some(route) = self.route {
            motion.install_route(route);
        }
        if self.pending {
            motion.pending = Some(Pending::InFlight);
        }
        Agent {
            id: self.id,
            motion,
            kind: self.kind,
            stop_at_end: self.stop_at_end,
        }
    }
}

//! Precomputed route pool for instant assignment.

use rustc_hash::FxHashMap;

use crowd_core::{NodeId, SimRng};

use crate::route::Route;

/// Immutable-once-stored pool of valid routes, with a secondary index from
/// origin node to the routes starting there.
#[derive(Default)]
pub struct RouteBank {
    routes:    Vec<Route>,
    by_origin: FxHashMap<NodeId, Vec<usize>>,
}

impl RouteBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            routes:    Vec::with_capacity(n),
            by_origin: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, origin: NodeId, route: Route) {
        self.by_origin.entry(origin).or_default().push(self.routes.len());
        self.routes.push(route);
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Number of distinct origin nodes in the index.
    pub fn origin_count(&self) -> usize {
        self.by_origin.len()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Uniform draw over the whole bank.
    pub fn draw(&self, rng: &mut SimRng) -> Option<Route> {
        rng.choose(&self.routes).cloned()
    }

    /// Uniform draw over routes starting at `origin`.
    pub fn draw_from(&self, origin: NodeId, rng: &mut SimRng) -> Option<Route> {
        let idx = self.by_origin.get(&origin)?;
        rng.choose(idx).map(|&i| self.routes[i].clone())
    }
}

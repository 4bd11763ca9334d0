//! `RoadNetwork`: the routing and caching facade shared by every task.
//!
//! Wraps a [`RoadGraph`] and a [`Router`] with three caches:
//!
//! - **nearest-node cache**: quantized coordinate → snapped node;
//! - **route bank**: precomputed routes for O(1) assignment;
//! - **variant cache**: quantized (origin, destination, k) → alternates.
//!
//! All methods take `&self`; caches use interior locking and are never held
//! across a path search.  Randomized operations take the caller's `SimRng`
//! so each task keeps its own deterministic stream.

use std::path::{Path as FsPath, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use crowd_core::{BoundingBox, GeoPoint, NodeId, SimConfig, SimRng};

use crate::bank::RouteBank;
use crate::graph::RoadGraph;
use crate::loader::{load_cache, save_cache, synthetic_grid};
use crate::route::Route;
use crate::router::{Router, YenRouter};
use crate::variants::{VariantCache, VariantKey};
use crate::{SpatialError, SpatialResult};

/// Tries at picking a destination node different from the origin.
const DISTINCT_NODE_TRIES: usize = 10;

/// Route-bank warm-up attempt budget, as a multiple of the target.
const BANK_ATTEMPT_FACTOR: usize = 5;

/// Progress log interval during warm-up.
const BANK_PROGRESS_EVERY: usize = 100;

/// Where the graph came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkSource {
    Cached(PathBuf),
    Synthetic,
}

impl std::fmt::Display for NetworkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkSource::Cached(p) => write!(f, "cache:{}", p.display()),
            NetworkSource::Synthetic => f.write_str("synthetic"),
        }
    }
}

pub struct RoadNetwork {
    graph:    RoadGraph,
    router:   Box<dyn Router>,
    source:   NetworkSource,
    /// Midpoint of the node extent; origin of the on-demand fallback route.
    center:   GeoPoint,
    nearest:  Mutex<FxHashMap<(i64, i64), NodeId>>,
    bank:     RwLock<RouteBank>,
    variants: VariantCache,
}

impl RoadNetwork {
    /// Wrap a built graph.  Refuses an empty graph: nothing could be snapped.
    pub fn new(graph: RoadGraph, source: NetworkSource) -> SpatialResult<Self> {
        if graph.is_empty() {
            return Err(SpatialError::EmptyNetwork);
        }
        let center = extent_center(&graph.node_pos);
        Ok(Self {
            graph,
            router: Box::new(YenRouter),
            source,
            center,
            nearest:  Mutex::new(FxHashMap::default()),
            bank:     RwLock::new(RouteBank::new()),
            variants: VariantCache::new(),
        })
    }

    /// Replace the path-finding engine.
    pub fn with_router(mut self, router: impl Router + 'static) -> Self {
        self.router = Box::new(router);
        self
    }

    /// Load from `cache` when given and readable, else build the synthetic
    /// grid over `bbox`.  A cache failure is logged, never returned.
    pub fn load(cache: Option<&FsPath>, bbox: &BoundingBox, grid_steps: usize) -> SpatialResult<Self> {
        if let Some(path) = cache {
            match load_cache(path) {
                Ok(graph) => {
                    info!(
                        path = %path.display(),
                        nodes = graph.node_count(),
                        edges = graph.edge_count(),
                        "loaded cached road network"
                    );
                    return Self::new(graph, NetworkSource::Cached(path.to_path_buf()));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "network cache unusable; using synthetic grid");
                }
            }
        }
        let graph = synthetic_grid(bbox, grid_steps);
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "synthetic grid built"
        );
        Self::new(graph, NetworkSource::Synthetic)
    }

    pub fn from_config(config: &SimConfig) -> SpatialResult<Self> {
        Self::load(config.network_cache.as_deref(), &config.bbox, config.grid_steps)
    }

    pub fn graph(&self) -> &RoadGraph {
        &self.graph
    }

    pub fn source(&self) -> &NetworkSource {
        &self.source
    }

    pub fn save_cache(&self, path: &FsPath) -> SpatialResult<()> {
        save_cache(&self.graph, path)
    }

    // ── Snapping ──────────────────────────────────────────────────────────

    /// Nearest graph node to `p`, memoized per 1e-5° cell.
    pub fn nearest_node(&self, p: GeoPoint) -> SpatialResult<NodeId> {
        let key = p.quantized();
        if let Some(&n) = lock(&self.nearest).get(&key) {
            return Ok(n);
        }
        let n = self.graph.nearest(p).ok_or(SpatialError::EmptyNetwork)?;
        lock(&self.nearest).insert(key, n);
        Ok(n)
    }

    pub fn nearest_cache_len(&self) -> usize {
        lock(&self.nearest).len()
    }

    pub fn random_node(&self, rng: &mut SimRng) -> NodeId {
        NodeId(rng.gen_range(0..self.graph.node_count()) as u32)
    }

    /// A random node other than `origin`, or `None` after a bounded number
    /// of unlucky draws (or on a single-node graph).
    fn random_other_node(&self, origin: NodeId, rng: &mut SimRng) -> Option<NodeId> {
        if self.graph.node_count() < 2 {
            return None;
        }
        (0..DISTINCT_NODE_TRIES)
            .map(|_| self.random_node(rng))
            .find(|&n| n != origin)
    }

    // ── Paths ─────────────────────────────────────────────────────────────

    /// Shortest route between two nodes, expanded to coordinates.
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> SpatialResult<Route> {
        let path = self.router.shortest(&self.graph, from, to)?;
        Route::from_path(&self.graph, &path)
    }

    /// Up to `k` distinct alternates.  Degrades to the single shortest path
    /// when `k <= 1` or the router fails to produce alternates.
    pub fn k_shortest_variants(&self, from: NodeId, to: NodeId, k: usize) -> SpatialResult<Vec<Route>> {
        if k <= 1 {
            return Ok(vec![self.shortest_path(from, to)?]);
        }
        let paths = match self.router.k_shortest(&self.graph, from, to, k) {
            Ok(paths) => paths,
            Err(e) => {
                debug!(%from, %to, error = %e, "k-shortest failed; degrading to single path");
                Vec::new()
            }
        };

        let mut seen: FxHashSet<Vec<NodeId>> = FxHashSet::default();
        let mut out = Vec::with_capacity(paths.len().min(k));
        for path in paths {
            if out.len() == k {
                break;
            }
            if !seen.insert(path.nodes.clone()) {
                continue;
            }
            if let Ok(route) = Route::from_path(&self.graph, &path) {
                out.push(route);
            }
        }
        if out.is_empty() {
            out.push(self.shortest_path(from, to)?);
        }
        Ok(out)
    }

    // ── Coordinate-level helpers ──────────────────────────────────────────

    /// Exploratory route: snap `origin`, walk to a random other node.
    pub fn route_from(&self, origin: GeoPoint, rng: &mut SimRng) -> SpatialResult<Route> {
        let s = self.nearest_node(origin)?;
        let e = self.random_other_node(s, rng).ok_or(SpatialError::NoRoute { from: s, to: s })?;
        self.shortest_path(s, e)
    }

    /// Route between two coordinates.  When both snap to the same node a
    /// random other destination is substituted.
    pub fn route_between(&self, src: GeoPoint, dst: GeoPoint, rng: &mut SimRng) -> SpatialResult<Route> {
        let s = self.nearest_node(src)?;
        let mut e = self.nearest_node(dst)?;
        if s == e {
            e = self.random_other_node(s, rng).ok_or(SpatialError::NoRoute { from: s, to: s })?;
        }
        self.shortest_path(s, e)
    }

    /// Alternates between two coordinates through the variant cache.
    pub fn variants_between(
        &self,
        src: GeoPoint,
        dst: GeoPoint,
        k:   usize,
        rng: &mut SimRng,
    ) -> SpatialResult<Arc<[Route]>> {
        let key = VariantKey::new(src, dst, k);
        if let Some(hit) = self.variants.get(&key) {
            return Ok(hit);
        }

        let s = self.nearest_node(src)?;
        let e = self.nearest_node(dst)?;
        let variants = if k <= 1 || s == e {
            vec![self.route_between(src, dst, rng)?]
        } else {
            self.k_shortest_variants(s, e, k)?
        };
        Ok(self.variants.insert(key, variants))
    }

    pub fn variant_cache_len(&self) -> usize {
        self.variants.len()
    }

    // ── Route bank ────────────────────────────────────────────────────────

    /// Fill the route bank with up to `target` random shortest paths.
    ///
    /// No-op when the bank is already populated.  Paths are computed without
    /// holding the bank lock and installed only if the bank is still empty,
    /// so concurrent callers never double it.  Returns the bank size.
    pub fn precompute_route_bank(&self, target: usize, rng: &mut SimRng) -> usize {
        {
            let bank = read(&self.bank);
            if !bank.is_empty() {
                return bank.len();
            }
        }
        if self.graph.node_count() < 2 || target == 0 {
            return 0;
        }

        let max_attempts = target.saturating_mul(BANK_ATTEMPT_FACTOR);
        let mut fresh = RouteBank::with_capacity(target);
        let mut attempts = 0;
        while fresh.len() < target && attempts < max_attempts {
            attempts += 1;
            let a = self.random_node(rng);
            let Some(b) = self.random_other_node(a, rng) else { continue };
            let Ok(route) = self.shortest_path(a, b) else { continue };
            fresh.insert(a, route);
            if fresh.len() % BANK_PROGRESS_EVERY == 0 {
                info!(routes = fresh.len(), target, "route bank progress");
            }
        }

        let mut bank = write(&self.bank);
        if bank.is_empty() {
            *bank = fresh;
            info!(
                routes = bank.len(),
                origins = bank.origin_count(),
                attempts,
                "route bank ready"
            );
        }
        bank.len()
    }

    /// Random bank route, or an on-demand exploratory route when the bank is
    /// empty.
    pub fn draw_from_bank(&self, rng: &mut SimRng) -> SpatialResult<Route> {
        if let Some(route) = read(&self.bank).draw(rng) {
            return Ok(route);
        }
        self.route_from(self.center, rng)
    }

    /// Random bank route starting at the node nearest `p`; falls back to
    /// [`draw_from_bank`](Self::draw_from_bank).
    pub fn draw_from_bank_near(&self, p: GeoPoint, rng: &mut SimRng) -> SpatialResult<Route> {
        let origin = self.nearest_node(p)?;
        if let Some(route) = read(&self.bank).draw_from(origin, rng) {
            return Ok(route);
        }
        self.draw_from_bank(rng)
    }

    pub fn bank_len(&self) -> usize {
        read(&self.bank).len()
    }

    pub fn bank_origins(&self) -> usize {
        read(&self.bank).origin_count()
    }

    /// Run `f` over the bank contents (tests and diagnostics).
    pub fn with_bank<R>(&self, f: impl FnOnce(&RouteBank) -> R) -> R {
        f(&read(&self.bank))
    }
}

fn extent_center(points: &[GeoPoint]) -> GeoPoint {
    let (mut min_lon, mut max_lon) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_lon = min_lon.min(p.lon);
        max_lon = max_lon.max(p.lon);
        min_lat = min_lat.min(p.lat);
        max_lat = max_lat.max(p.lat);
    }
    BoundingBox::new(min_lon, max_lon, min_lat, max_lat).center()
}

// Poisoned locks still guard consistent data: every critical section here is
// a single insert or a whole-value swap.

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn read<T>(l: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(l: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|e| e.into_inner())
}

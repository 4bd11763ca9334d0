//! Route and path value types.

use std::ops::Deref;
use std::sync::Arc;

use crowd_core::{EdgeId, GeoPoint, NodeId};

use crate::graph::RoadGraph;
use crate::{SpatialError, SpatialResult};

/// A node/edge path through the road graph, as produced by a [`Router`].
///
/// [`Router`]: crate::Router
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    /// Visited nodes, origin first.  `nodes.len() == edges.len() + 1`.
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    /// Sum of edge lengths in metres.
    pub length_m: f64,
}

impl Path {
    /// A zero-length path that stays on `node`.
    pub fn trivial(node: NodeId) -> Self {
        Self { nodes: vec![node], edges: Vec::new(), length_m: 0.0 }
    }

    pub fn origin(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn destination(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }
}

/// An immutable coordinate sequence an agent walks along.
///
/// Always holds at least two points.  Cloning is an `Arc` bump, so the same
/// route can be handed to many agents (route bank draws, event variants)
/// without copying coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Route(Arc<[GeoPoint]>);

impl Route {
    pub fn new(points: Vec<GeoPoint>) -> SpatialResult<Self> {
        if points.len() < 2 {
            return Err(SpatialError::DegenerateRoute(points.len()));
        }
        Ok(Route(points.into()))
    }

    /// Expand a graph path into coordinates.
    ///
    /// Edges with a polyline contribute every polyline point; plain edges
    /// contribute their two endpoint coordinates.  Consecutive duplicates are
    /// dropped, so a trivial path (no edges) is a degenerate route.
    pub fn from_path(graph: &RoadGraph, path: &Path) -> SpatialResult<Self> {
        let mut points: Vec<GeoPoint> = Vec::with_capacity(path.nodes.len());
        for &edge in &path.edges {
            let geometry = &graph.edge_geometry[edge.index()];
            if geometry.is_empty() {
                push_distinct(&mut points, graph.pos(graph.edge_from[edge.index()]));
                push_distinct(&mut points, graph.pos(graph.edge_to[edge.index()]));
            } else {
                for &p in geometry {
                    push_distinct(&mut points, p);
                }
            }
        }
        Route::new(points)
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.0
    }

    pub fn start(&self) -> GeoPoint {
        self.0[0]
    }

    pub fn end(&self) -> GeoPoint {
        self.0[self.0.len() - 1]
    }

    /// Replace everything after `route[mid - 1]` with `detour` (whose first
    /// point is dropped, it duplicates the splice point) followed by `back`
    /// (first point dropped likewise).
    ///
    /// Used to bend a shortest path through a random waypoint:
    /// `route[..mid] ++ detour[1..] ++ back[1..]`.
    pub fn splice_detour(&self, mid: usize, detour: &Route, back: &Route) -> SpatialResult<Route> {
        let mid = mid.clamp(1, self.0.len());
        let mut points = Vec::with_capacity(mid + detour.len() + back.len());
        points.extend_from_slice(&self.0[..mid]);
        points.extend_from_slice(&detour.0[1..]);
        points.extend_from_slice(&back.0[1..]);
        Route::new(points)
    }
}

impl Deref for Route {
    type Target = [GeoPoint];
    fn deref(&self) -> &[GeoPoint] {
        &self.0
    }
}

fn push_distinct(points: &mut Vec<GeoPoint>, p: GeoPoint) {
    if points.last() != Some(&p) {
        points.push(p);
    }
}

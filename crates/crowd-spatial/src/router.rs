//! Routing trait, Dijkstra, and Yen's k-shortest simple paths.
//!
//! # Pluggability
//!
//! [`RoadNetwork`](crate::RoadNetwork) calls routing via the [`Router`] trait,
//! so a contraction hierarchy or A* can be dropped in without touching the
//! caching layer.  [`YenRouter`] is the default.
//!
//! # Cost units
//!
//! Edge cost is `edge_length_m` (metres, `f64`).  Heap ordering uses
//! `f64::total_cmp`; lengths are never NaN because the builder computes them
//! from finite coordinates.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashSet;

use crowd_core::{EdgeId, NodeId};

use crate::graph::RoadGraph;
use crate::route::Path;
use crate::{SpatialError, SpatialResult};

// ── Router trait ──────────────────────────────────────────────────────────────

/// Pluggable path-finding engine.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync`: the route resolver runs them on
/// rayon worker threads while generators call them from tokio tasks.
pub trait Router: Send + Sync {
    /// Shortest path by edge length.  `from == to` yields a trivial path.
    fn shortest(&self, graph: &RoadGraph, from: NodeId, to: NodeId) -> SpatialResult<Path>;

    /// Up to `k` distinct simple paths in non-decreasing length order.
    ///
    /// The default degrades to the single shortest path.
    fn k_shortest(
        &self,
        graph: &RoadGraph,
        from:  NodeId,
        to:    NodeId,
        k:     usize,
    ) -> SpatialResult<Vec<Path>> {
        let _ = k;
        Ok(vec![self.shortest(graph, from, to)?])
    }
}

// ── DijkstraRouter ────────────────────────────────────────────────────────────

/// Plain Dijkstra; `k_shortest` uses the single-path default.
pub struct DijkstraRouter;

impl Router for DijkstraRouter {
    fn shortest(&self, graph: &RoadGraph, from: NodeId, to: NodeId) -> SpatialResult<Path> {
        check_nodes(graph, from, to)?;
        dijkstra(graph, from, to, &Bans::default()).ok_or(SpatialError::NoRoute { from, to })
    }
}

// ── YenRouter ─────────────────────────────────────────────────────────────────

/// Dijkstra for single paths plus Yen's algorithm for alternates.
///
/// Each iteration takes every prefix ("root") of the last accepted path,
/// bans the root's interior nodes and the next edge of every accepted path
/// sharing that root, and searches a "spur" path from the root's end.  The
/// cheapest unseen candidate becomes the next accepted path.
pub struct YenRouter;

impl Router for YenRouter {
    fn shortest(&self, graph: &RoadGraph, from: NodeId, to: NodeId) -> SpatialResult<Path> {
        DijkstraRouter.shortest(graph, from, to)
    }

    fn k_shortest(
        &self,
        graph: &RoadGraph,
        from:  NodeId,
        to:    NodeId,
        k:     usize,
    ) -> SpatialResult<Vec<Path>> {
        let first = self.shortest(graph, from, to)?;
        if k <= 1 || from == to {
            return Ok(vec![first]);
        }
        Ok(yen(graph, first, to, k))
    }
}

fn check_nodes(graph: &RoadGraph, from: NodeId, to: NodeId) -> SpatialResult<()> {
    for n in [from, to] {
        if !graph.contains(n) {
            return Err(SpatialError::NodeNotFound(n));
        }
    }
    Ok(())
}

// ── Yen internals ─────────────────────────────────────────────────────────────

fn yen(graph: &RoadGraph, first: Path, to: NodeId, k: usize) -> Vec<Path> {
    let mut seen: FxHashSet<Vec<NodeId>> = FxHashSet::default();
    seen.insert(first.nodes.clone());

    let mut accepted   = vec![first];
    let mut candidates: Vec<Path> = Vec::new();

    while accepted.len() < k {
        let last = accepted[accepted.len() - 1].clone();

        for i in 0..last.edges.len() {
            let spur_node  = last.nodes[i];
            let root_nodes = &last.nodes[..=i];
            let root_edges = &last.edges[..i];

            let mut bans = Bans::default();
            for p in &accepted {
                if p.edges.len() > i && p.nodes[..=i] == *root_nodes {
                    bans.edges.insert(p.edges[i]);
                }
            }
            bans.nodes.extend(root_nodes[..i].iter().copied());

            let Some(spur) = dijkstra(graph, spur_node, to, &bans) else {
                continue;
            };

            let mut nodes = root_nodes[..i].to_vec();
            nodes.extend_from_slice(&spur.nodes);
            if !seen.insert(nodes.clone()) {
                continue;
            }
            let mut edges = root_edges.to_vec();
            edges.extend_from_slice(&spur.edges);
            let root_len: f64 = root_edges.iter().map(|e| graph.edge_length_m[e.index()]).sum();

            candidates.push(Path { nodes, edges, length_m: root_len + spur.length_m });
        }

        let best = candidates
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.length_m.total_cmp(&b.1.length_m))
            .map(|(i, _)| i);
        match best {
            Some(i) => accepted.push(candidates.swap_remove(i)),
            None => break,
        }
    }

    accepted
}

// ── Dijkstra internals ────────────────────────────────────────────────────────

/// Nodes and edges a search may not use.
#[derive(Default)]
struct Bans {
    nodes: FxHashSet<NodeId>,
    edges: FxHashSet<EdgeId>,
}

/// Min-heap entry: lower cost pops first, ties broken by node id.
#[derive(PartialEq)]
struct HeapEntry {
    cost: f64,
    node: NodeId,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn dijkstra(graph: &RoadGraph, from: NodeId, to: NodeId, bans: &Bans) -> Option<Path> {
    if from == to {
        return Some(Path::trivial(from));
    }
    if bans.nodes.contains(&from) {
        return None;
    }

    let n = graph.node_count();
    let mut dist      = vec![f64::INFINITY; n];
    // prev_edge[v] = EdgeId that reached v; EdgeId::INVALID for unreached nodes.
    let mut prev_edge = vec![EdgeId::INVALID; n];

    dist[from.index()] = 0.0;
    let mut heap = BinaryHeap::new();
    heap.push(HeapEntry { cost: 0.0, node: from });

    while let Some(HeapEntry { cost, node }) = heap.pop() {
        if node == to {
            return Some(reconstruct(graph, &prev_edge, from, to, cost));
        }

        // Skip stale heap entries.
        if cost > dist[node.index()] {
            continue;
        }

        for edge in graph.out_edges(node) {
            if bans.edges.contains(&edge) {
                continue;
            }
            let neighbor = graph.edge_to[edge.index()];
            if bans.nodes.contains(&neighbor) {
                continue;
            }
            let new_cost = cost + graph.edge_length_m[edge.index()];
            if new_cost < dist[neighbor.index()] {
                dist[neighbor.index()] = new_cost;
                prev_edge[neighbor.index()] = edge;
                heap.push(HeapEntry { cost: new_cost, node: neighbor });
            }
        }
    }

    None
}

fn reconstruct(
    graph:     &RoadGraph,
    prev_edge: &[EdgeId],
    from:      NodeId,
    to:        NodeId,
    length_m:  f64,
) -> Path {
    let mut edges = Vec::new();
    let mut nodes = vec![to];
    let mut cur = to;
    while cur != from {
        let e = prev_edge[cur.index()];
        if e == EdgeId::INVALID {
            break;
        }
        edges.push(e);
        cur = graph.edge_from[e.index()];
        nodes.push(cur);
    }
    edges.reverse();
    nodes.reverse();
    Path { nodes, edges, length_m }
}

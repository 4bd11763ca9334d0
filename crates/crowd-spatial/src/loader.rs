//! Network sources: the persistent JSON cache and the synthetic grid.
//!
//! # Cache format
//!
//! ```json
//! {
//!   "version": 1,
//!   "nodes": [{"lon": 75.77, "lat": 23.18}, ...],
//!   "edges": [{"from": 0, "to": 1, "length_m": 112.4, "geometry": [...]}, ...]
//! }
//! ```
//!
//! Edges are directed.  `geometry` is omitted for straight segments.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};

use crowd_core::{BoundingBox, GeoPoint, NodeId};

use crate::graph::{RoadGraph, RoadGraphBuilder};
use crate::{SpatialError, SpatialResult};

/// Current on-disk format version.
pub const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CachedNetwork {
    version: u32,
    nodes:   Vec<GeoPoint>,
    edges:   Vec<CachedEdge>,
}

#[derive(Serialize, Deserialize)]
struct CachedEdge {
    from:     NodeId,
    to:       NodeId,
    length_m: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    geometry: Vec<GeoPoint>,
}

/// Read a cached network.
///
/// # Errors
///
/// I/O and JSON failures, a version mismatch, an edge referencing a missing
/// node, a non-finite length, or a cache with no nodes.
pub fn load_cache(path: &FsPath) -> SpatialResult<RoadGraph> {
    let reader = BufReader::new(File::open(path)?);
    let cached: CachedNetwork = serde_json::from_reader(reader)?;

    if cached.version != CACHE_VERSION {
        return Err(SpatialError::CacheFormat(format!(
            "version {} (expected {CACHE_VERSION})",
            cached.version
        )));
    }
    if cached.nodes.is_empty() {
        return Err(SpatialError::EmptyNetwork);
    }

    let node_count = cached.nodes.len();
    let mut b = RoadGraphBuilder::with_capacity(node_count, cached.edges.len());
    for pos in cached.nodes {
        b.add_node(pos);
    }
    for e in cached.edges {
        if e.from.index() >= node_count || e.to.index() >= node_count {
            return Err(SpatialError::CacheFormat(format!(
                "edge {} -> {} references a node outside 0..{node_count}",
                e.from, e.to
            )));
        }
        if !e.length_m.is_finite() || e.length_m < 0.0 {
            return Err(SpatialError::CacheFormat(format!(
                "edge {} -> {} has invalid length {}",
                e.from, e.to, e.length_m
            )));
        }
        b.add_directed_edge(e.from, e.to, e.length_m, e.geometry);
    }
    Ok(b.build())
}

/// Write `graph` in the cache format.
pub fn save_cache(graph: &RoadGraph, path: &FsPath) -> SpatialResult<()> {
    let edges = (0..graph.edge_count())
        .map(|i| CachedEdge {
            from:     graph.edge_from[i],
            to:       graph.edge_to[i],
            length_m: graph.edge_length_m[i],
            geometry: graph.edge_geometry[i].clone(),
        })
        .collect();
    let cached = CachedNetwork {
        version: CACHE_VERSION,
        nodes:   graph.node_pos.clone(),
        edges,
    };

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, &cached)?;
    writer.flush()?;
    Ok(())
}

/// Uniform `steps × steps` cell grid spanning `bbox`, 4-neighbour roads.
///
/// Node `(i, j)` (i along longitude, j along latitude) has id
/// `i * (steps + 1) + j`.  Deterministic for a given box and step count.
pub fn synthetic_grid(bbox: &BoundingBox, steps: usize) -> RoadGraph {
    let steps = steps.max(1);
    let side = steps + 1;
    let mut b = RoadGraphBuilder::with_capacity(side * side, 4 * steps * side);

    for i in 0..side {
        for j in 0..side {
            let lon = bbox.min_lon + bbox.lon_span() * (i as f64 / steps as f64);
            let lat = bbox.min_lat + bbox.lat_span() * (j as f64 / steps as f64);
            b.add_node(GeoPoint::new(lon, lat));
        }
    }

    let id = |i: usize, j: usize| NodeId((i * side + j) as u32);
    for i in 0..side {
        for j in 0..side {
            if i < steps {
                b.add_road(id(i, j), id(i + 1, j));
            }
            if j < steps {
                b.add_road(id(i, j), id(i, j + 1));
            }
        }
    }
    b.build()
}

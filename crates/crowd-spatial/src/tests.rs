//! Unit tests for crowd-spatial.
//!
//! Hand-built graphs pin exact routing results; the synthetic grid covers
//! the caching layer.

#[cfg(test)]
mod helpers {
    use crowd_core::{GeoPoint, NodeId};

    use crate::{RoadGraph, RoadGraphBuilder};

    /// Both directions with an explicit length, so routing is independent of
    /// the coordinates.
    pub fn road(b: &mut RoadGraphBuilder, a: NodeId, c: NodeId, len: f64) {
        b.add_directed_edge(a, c, len, Vec::new());
        b.add_directed_edge(c, a, len, Vec::new());
    }

    /// Nodes (lon, lat):
    ///   0:(0,0)  1:(1,0)  2:(2,0)
    ///   3:(0,1)           4:(2,1)
    ///
    /// Roads: 0-1, 1-2, 2-4 (100 m each), 0-3 (500 m), 3-4 (100 m).
    /// 0→4: 0-1-2-4 = 300 m beats 0-3-4 = 600 m; these are the only two
    /// simple paths.
    pub fn ring() -> (RoadGraph, [NodeId; 5]) {
        let mut b = RoadGraphBuilder::new();
        let n0 = b.add_node(GeoPoint::new(0.0, 0.0));
        let n1 = b.add_node(GeoPoint::new(1.0, 0.0));
        let n2 = b.add_node(GeoPoint::new(2.0, 0.0));
        let n3 = b.add_node(GeoPoint::new(0.0, 1.0));
        let n4 = b.add_node(GeoPoint::new(2.0, 1.0));
        road(&mut b, n0, n1, 100.0);
        road(&mut b, n1, n2, 100.0);
        road(&mut b, n2, n4, 100.0);
        road(&mut b, n0, n3, 500.0);
        road(&mut b, n3, n4, 100.0);
        (b.build(), [n0, n1, n2, n3, n4])
    }
}

// ── Graph structure ───────────────────────────────────────────────────────────

#[cfg(test)]
mod graph {
    use crowd_core::{BoundingBox, GeoPoint};

    use crate::{synthetic_grid, RoadGraphBuilder};

    #[test]
    fn empty_build() {
        let g = RoadGraphBuilder::new().build();
        assert_eq!(g.node_count(), 0);
        assert!(g.is_empty());
        assert!(g.nearest(GeoPoint::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn csr_out_edges() {
        let (g, [n0, n1, _, _, n4]) = super::helpers::ring();
        assert_eq!(g.out_degree(n0), 2);
        assert_eq!(g.out_degree(n1), 2);
        for e in g.out_edges(n4) {
            assert_eq!(g.edge_from[e.index()], n4);
        }
    }

    #[test]
    fn nearest_snaps_to_closest_node() {
        let (g, [n0, _, n2, _, _]) = super::helpers::ring();
        assert_eq!(g.nearest(GeoPoint::new(0.1, -0.2)), Some(n0));
        assert_eq!(g.nearest(GeoPoint::new(2.3, 0.1)), Some(n2));
    }

    #[test]
    fn geometry_road_stores_reversed_back_edge() {
        let mut b = RoadGraphBuilder::new();
        let a = b.add_node(GeoPoint::new(0.0, 0.0));
        let c = b.add_node(GeoPoint::new(0.001, 0.0));
        let bend = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0005, 0.0002),
            GeoPoint::new(0.001, 0.0),
        ];
        b.add_road_with_geometry(a, c, bend.clone());
        let g = b.build();

        let back = g.out_edges(c).next().unwrap();
        let mut reversed = bend;
        reversed.reverse();
        assert_eq!(g.edge_geometry[back.index()], reversed);
        assert!(g.edge_length_m[back.index()] > GeoPoint::new(0.0, 0.0).distance_m(GeoPoint::new(0.001, 0.0)));
    }

    #[test]
    fn synthetic_grid_default_size() {
        let g = synthetic_grid(&BoundingBox::default(), 12);
        assert_eq!(g.node_count(), 169);
        // 2 axes × 12 × 13 undirected roads, two directed edges each.
        assert_eq!(g.edge_count(), 2 * 2 * 12 * 13);
    }
}

// ── Routing ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod router {
    use crowd_core::GeoPoint;

    use crate::{DijkstraRouter, RoadGraphBuilder, Router, SpatialError, YenRouter};

    #[test]
    fn dijkstra_prefers_shorter_branch() {
        let (g, [n0, n1, n2, _, n4]) = super::helpers::ring();
        let p = DijkstraRouter.shortest(&g, n0, n4).unwrap();
        assert_eq!(p.nodes, vec![n0, n1, n2, n4]);
        assert_eq!(p.edges.len(), 3);
        assert!((p.length_m - 300.0).abs() < 1e-9);
    }

    #[test]
    fn same_node_is_trivial() {
        let (g, [n0, ..]) = super::helpers::ring();
        let p = DijkstraRouter.shortest(&g, n0, n0).unwrap();
        assert_eq!(p.nodes, vec![n0]);
        assert!(p.edges.is_empty());
    }

    #[test]
    fn unreachable_is_no_route() {
        let mut b = RoadGraphBuilder::new();
        let a = b.add_node(GeoPoint::new(0.0, 0.0));
        let c = b.add_node(GeoPoint::new(1.0, 0.0));
        let g = b.build();
        assert!(matches!(
            DijkstraRouter.shortest(&g, a, c),
            Err(SpatialError::NoRoute { .. })
        ));
    }

    #[test]
    fn dijkstra_router_degrades_to_one_path() {
        let (g, [n0, _, _, _, n4]) = super::helpers::ring();
        assert_eq!(DijkstraRouter.k_shortest(&g, n0, n4, 5).unwrap().len(), 1);
    }

    #[test]
    fn yen_finds_both_simple_paths_in_order() {
        let (g, [n0, n1, n2, n3, n4]) = super::helpers::ring();
        let paths = YenRouter.k_shortest(&g, n0, n4, 5).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].nodes, vec![n0, n1, n2, n4]);
        assert_eq!(paths[1].nodes, vec![n0, n3, n4]);
        assert!((paths[1].length_m - 600.0).abs() < 1e-9);
    }

    #[test]
    fn yen_on_grid_is_distinct_and_sorted() {
        let g = crate::synthetic_grid(&crowd_core::BoundingBox::default(), 3);
        let from = crowd_core::NodeId(0);
        let to = crowd_core::NodeId(15);
        let paths = YenRouter.k_shortest(&g, from, to, 6).unwrap();
        assert_eq!(paths.len(), 6);
        for w in paths.windows(2) {
            assert_ne!(w[0].nodes, w[1].nodes);
            assert!(w[0].length_m <= w[1].length_m + 1e-6);
        }
        for p in &paths {
            assert_eq!(p.origin(), Some(from));
            assert_eq!(p.destination(), Some(to));
            assert_eq!(p.nodes.len(), p.edges.len() + 1);
        }
    }
}

// ── Route values ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod route {
    use crowd_core::GeoPoint;

    use crate::{DijkstraRouter, RoadGraphBuilder, Route, Router, SpatialError};

    fn pts(v: &[(f64, f64)]) -> Vec<GeoPoint> {
        v.iter().map(|&(lon, lat)| GeoPoint::new(lon, lat)).collect()
    }

    #[test]
    fn single_point_is_degenerate() {
        assert!(matches!(
            Route::new(pts(&[(0.0, 0.0)])),
            Err(SpatialError::DegenerateRoute(1))
        ));
    }

    #[test]
    fn from_path_expands_straight_edges_without_duplicates() {
        let (g, [n0, _, _, _, n4]) = super::helpers::ring();
        let p = DijkstraRouter.shortest(&g, n0, n4).unwrap();
        let r = Route::from_path(&g, &p).unwrap();
        assert_eq!(r.points(), pts(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0)]).as_slice());
    }

    #[test]
    fn from_path_uses_edge_polyline() {
        let mut b = RoadGraphBuilder::new();
        let a = b.add_node(GeoPoint::new(0.0, 0.0));
        let c = b.add_node(GeoPoint::new(0.001, 0.0));
        let d = b.add_node(GeoPoint::new(0.002, 0.0));
        b.add_road_with_geometry(a, c, pts(&[(0.0, 0.0), (0.0005, 0.0003), (0.001, 0.0)]));
        b.add_road(c, d);
        let g = b.build();

        let r = Route::from_path(&g, &DijkstraRouter.shortest(&g, a, d).unwrap()).unwrap();
        assert_eq!(
            r.points(),
            pts(&[(0.0, 0.0), (0.0005, 0.0003), (0.001, 0.0), (0.002, 0.0)]).as_slice()
        );

        let back = Route::from_path(&g, &DijkstraRouter.shortest(&g, d, a).unwrap()).unwrap();
        assert_eq!(back.points()[2], GeoPoint::new(0.0005, 0.0003));
    }

    #[test]
    fn trivial_path_is_not_a_route() {
        let (g, [n0, ..]) = super::helpers::ring();
        let p = DijkstraRouter.shortest(&g, n0, n0).unwrap();
        assert!(Route::from_path(&g, &p).is_err());
    }

    #[test]
    fn splice_detour_drops_join_points() {
        let base = Route::new(pts(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)])).unwrap();
        let detour = Route::new(pts(&[(1.0, 0.0), (1.0, 1.0)])).unwrap();
        let back = Route::new(pts(&[(1.0, 1.0), (2.0, 1.0), (3.0, 0.0)])).unwrap();
        let spliced = base.splice_detour(1, &detour, &back).unwrap();
        assert_eq!(
            spliced.points(),
            pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 1.0), (3.0, 0.0)]).as_slice()
        );
        assert_eq!(spliced.end(), base.end());
    }

    #[test]
    fn clones_share_storage() {
        let r = Route::new(pts(&[(0.0, 0.0), (1.0, 0.0)])).unwrap();
        let c = r.clone();
        assert!(std::ptr::eq(r.points().as_ptr(), c.points().as_ptr()));
    }
}

// ── RoadNetwork facade ────────────────────────────────────────────────────────

#[cfg(test)]
mod network {
    use std::sync::Arc;

    use crowd_core::{BoundingBox, GeoPoint, SimRng};

    use crate::{DijkstraRouter, NetworkSource, RoadGraphBuilder, RoadNetwork, SpatialError};

    fn small_grid() -> RoadNetwork {
        RoadNetwork::load(None, &BoundingBox::default(), 4).unwrap()
    }

    #[test]
    fn empty_graph_is_refused() {
        let g = RoadGraphBuilder::new().build();
        assert!(matches!(
            RoadNetwork::new(g, NetworkSource::Synthetic),
            Err(SpatialError::EmptyNetwork)
        ));
    }

    #[test]
    fn nearest_node_is_memoized_per_cell() {
        let net = small_grid();
        let p = GeoPoint::new(75.7300, 23.1400);
        let a = net.nearest_node(p).unwrap();
        let b = net.nearest_node(GeoPoint::new(75.730_001, 23.140_001)).unwrap();
        assert_eq!(a, b);
        assert_eq!(net.nearest_cache_len(), 1);
        assert_eq!(a, net.graph().nearest(p).unwrap());
    }

    #[test]
    fn k_variants_are_bounded_and_distinct() {
        let net = small_grid();
        let g = net.graph();
        let from = crowd_core::NodeId(0);
        let to = crowd_core::NodeId((g.node_count() - 1) as u32);
        let variants = net.k_shortest_variants(from, to, 5).unwrap();
        assert!(!variants.is_empty() && variants.len() <= 5);
        for (i, a) in variants.iter().enumerate() {
            assert!(a.len() >= 2);
            for b in &variants[i + 1..] {
                assert_ne!(a.points(), b.points());
            }
        }
    }

    #[test]
    fn k_of_one_is_single_shortest() {
        let (g, [n0, _, _, _, n4]) = super::helpers::ring();
        let net = RoadNetwork::new(g, NetworkSource::Synthetic).unwrap();
        let v = net.k_shortest_variants(n0, n4, 1).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0], net.shortest_path(n0, n4).unwrap());
    }

    #[test]
    fn dijkstra_router_gives_one_variant() {
        let (g, [n0, _, _, _, n4]) = super::helpers::ring();
        let yen = RoadNetwork::new(g, NetworkSource::Synthetic).unwrap();
        assert_eq!(yen.k_shortest_variants(n0, n4, 5).unwrap().len(), 2);

        let (g, _) = super::helpers::ring();
        let plain = RoadNetwork::new(g, NetworkSource::Synthetic).unwrap().with_router(DijkstraRouter);
        let v = plain.k_shortest_variants(n0, n4, 5).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0], yen.shortest_path(n0, n4).unwrap());
    }

    #[test]
    fn route_between_same_node_picks_other_destination() {
        let net = small_grid();
        let mut rng = SimRng::new(3);
        let p = net.graph().pos(crowd_core::NodeId(6));
        let r = net.route_between(p, p, &mut rng).unwrap();
        assert_eq!(r.start(), p);
        assert_ne!(r.end(), p);
    }

    #[test]
    fn variants_between_hits_cache() {
        let net = small_grid();
        let mut rng = SimRng::new(4);
        let bbox = BoundingBox::default();
        let src = GeoPoint::new(bbox.min_lon, bbox.min_lat);
        let dst = GeoPoint::new(bbox.max_lon, bbox.max_lat);
        let a = net.variants_between(src, dst, 5, &mut rng).unwrap();
        let b = net.variants_between(src, dst, 5, &mut rng).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(net.variant_cache_len(), 1);
        // Different k is a different key.
        net.variants_between(src, dst, 6, &mut rng).unwrap();
        assert_eq!(net.variant_cache_len(), 2);
    }

    #[test]
    fn route_bank_is_idempotent() {
        let net = small_grid();
        let mut rng = SimRng::new(5);
        assert_eq!(net.precompute_route_bank(50, &mut rng), 50);
        assert_eq!(net.precompute_route_bank(50, &mut rng), 50);
        assert_eq!(net.bank_len(), 50);
    }

    #[test]
    fn bank_entries_are_valid_routes() {
        let net = small_grid();
        net.precompute_route_bank(40, &mut SimRng::new(6));
        net.with_bank(|bank| {
            for r in bank.routes() {
                assert!(r.len() >= 2);
                assert_ne!(r.points()[0], r.points()[1]);
            }
        });
        assert!(net.bank_origins() > 0);
    }

    #[test]
    fn empty_bank_falls_back_to_on_demand() {
        let net = small_grid();
        let r = net.draw_from_bank(&mut SimRng::new(7)).unwrap();
        assert!(r.len() >= 2);
        assert_eq!(net.bank_len(), 0);
    }

    #[test]
    fn draw_near_prefers_matching_origin() {
        let net = small_grid();
        let mut rng = SimRng::new(8);
        net.precompute_route_bank(60, &mut rng);
        let start = net.with_bank(|b| b.routes()[0].start());
        for _ in 0..10 {
            let r = net.draw_from_bank_near(start, &mut rng).unwrap();
            assert_eq!(r.start(), start);
        }
    }
}

// ── Cache file ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod loader {
    use std::io::Write;

    use crowd_core::{BoundingBox, GeoPoint};

    use crate::{load_cache, NetworkSource, RoadGraphBuilder, RoadNetwork, SpatialError};

    #[test]
    fn missing_cache_falls_back_to_grid() {
        let dir = tempfile::tempdir().unwrap();
        let net = RoadNetwork::load(Some(dir.path().join("absent.json").as_path()), &BoundingBox::default(), 12).unwrap();
        assert_eq!(net.source(), &NetworkSource::Synthetic);
        assert_eq!(net.graph().node_count(), 169);
    }

    #[test]
    fn corrupt_cache_falls_back_to_grid() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"{ not json").unwrap();
        let net = RoadNetwork::load(Some(f.path()), &BoundingBox::default(), 12).unwrap();
        assert_eq!(net.source(), &NetworkSource::Synthetic);
        assert_eq!(net.graph().node_count(), 169);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(br#"{"version": 99, "nodes": [{"lon": 0.0, "lat": 0.0}], "edges": []}"#).unwrap();
        assert!(matches!(load_cache(f.path()), Err(SpatialError::CacheFormat(_))));
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(br#"{"version": 1, "nodes": [{"lon": 0.0, "lat": 0.0}], "edges": [{"from": 0, "to": 3, "length_m": 1.0}]}"#).unwrap();
        assert!(matches!(load_cache(f.path()), Err(SpatialError::CacheFormat(_))));
    }

    #[test]
    fn saved_cache_round_trips() {
        let mut b = RoadGraphBuilder::new();
        let a = b.add_node(GeoPoint::new(75.70, 23.10));
        let c = b.add_node(GeoPoint::new(75.71, 23.10));
        let d = b.add_node(GeoPoint::new(75.71, 23.11));
        b.add_road(a, c);
        b.add_road_with_geometry(
            c,
            d,
            vec![GeoPoint::new(75.71, 23.10), GeoPoint::new(75.712, 23.105), GeoPoint::new(75.71, 23.11)],
        );
        let net = RoadNetwork::new(b.build(), NetworkSource::Synthetic).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        net.save_cache(&path).unwrap();

        let loaded = RoadNetwork::load(Some(path.as_path()), &BoundingBox::default(), 12).unwrap();
        assert_eq!(loaded.source(), &NetworkSource::Cached(path.clone()));
        assert_eq!(loaded.graph().node_count(), 3);
        assert_eq!(loaded.graph().edge_count(), 4);
        assert_eq!(loaded.graph().edge_geometry, net.graph().edge_geometry);
    }
}

//! Unit tests for crowd-core primitives.

#[cfg(test)]
mod ids {
    use crate::{AgentId, IdSource, NodeId};

    #[test]
    fn index_roundtrip() {
        let id = NodeId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(NodeId::try_from(42usize).unwrap(), id);
    }

    #[test]
    fn invalid_sentinels_are_max() {
        assert_eq!(NodeId::INVALID.0, u32::MAX);
        assert_eq!(AgentId::INVALID.0, u64::MAX);
    }

    #[test]
    fn display() {
        assert_eq!(AgentId(7).to_string(), "AgentId(7)");
    }

    #[test]
    fn id_source_never_repeats() {
        let ids = IdSource::new();
        let a = ids.next_agent();
        let c = ids.next_campaign();
        let b = ids.next_agent();
        assert_ne!(a, b);
        assert_ne!(a.0, c.0);
        assert_ne!(b.0, c.0);
    }

    #[test]
    fn agent_id_serializes_as_bare_number() {
        assert_eq!(serde_json::to_string(&AgentId(9)).unwrap(), "9");
    }
}

#[cfg(test)]
mod geo {
    use crate::{BoundingBox, GeoPoint, SimRng};

    #[test]
    fn zero_distance() {
        let p = GeoPoint::new(75.77, 23.18);
        assert!(p.distance_m(p) < 0.01);
    }

    #[test]
    fn one_degree_latitude() {
        let a = GeoPoint::new(75.0, 23.0);
        let b = GeoPoint::new(75.0, 24.0);
        let d = a.distance_m(b);
        assert!((d - 111_195.0).abs() < 500.0, "got {d}");
    }

    #[test]
    fn within_is_inclusive() {
        let c = GeoPoint::new(0.0, 0.0);
        assert!(c.within(GeoPoint::new(0.5, 0.0), 0.5));
        assert!(!c.within(GeoPoint::new(0.5001, 0.0), 0.5));
    }

    #[test]
    fn quantized_merges_nearby_points() {
        let a = GeoPoint::new(75.123_451, 23.000_001);
        let b = GeoPoint::new(75.123_449, 23.000_002);
        assert_eq!(a.quantized(), b.quantized());
        assert_ne!(a.quantized(), GeoPoint::new(75.1235, 23.0).quantized());
    }

    #[test]
    fn sample_stays_inside_bbox() {
        let bbox = BoundingBox::default();
        let mut rng = SimRng::new(1);
        for _ in 0..500 {
            assert!(bbox.contains(bbox.sample(&mut rng)));
        }
    }

    #[test]
    fn exit_points_lie_outside_bbox() {
        let bbox = BoundingBox::default();
        let mut rng = SimRng::new(2);
        for _ in 0..200 {
            let p = bbox.exit_point(0.02, &mut rng);
            assert!(!bbox.contains(p), "{p} should be outside");
            let outside_lon = p.lon < bbox.min_lon || p.lon > bbox.max_lon;
            let outside_lat = p.lat < bbox.min_lat || p.lat > bbox.max_lat;
            // Exactly one cardinal side.
            assert!(outside_lon ^ outside_lat);
        }
    }
}

#[cfg(test)]
mod rng {
    use crate::SimRng;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SimRng::new(99);
        let mut b = SimRng::new(99);
        for _ in 0..10 {
            assert_eq!(a.random::<u64>(), b.random::<u64>());
        }
    }

    #[test]
    fn streams_differ() {
        let mut a = SimRng::stream(7, 0);
        let mut b = SimRng::stream(7, 1);
        assert_ne!(a.random::<u64>(), b.random::<u64>());
    }

    #[test]
    fn uniform_tolerates_inverted_range() {
        let mut r = SimRng::new(0);
        assert_eq!(r.uniform(5.0, 1.0), 5.0);
        let v = r.uniform(1.0, 2.0);
        assert!((1.0..=2.0).contains(&v));
    }
}

#[cfg(test)]
mod speed {
    use crate::SpeedMultiplier;

    #[test]
    fn clamps_high() {
        let m = SpeedMultiplier::default();
        assert_eq!(m.set(50.0), 10.0);
        assert_eq!(m.get(), 10.0);
    }

    #[test]
    fn clamps_low() {
        let m = SpeedMultiplier::default();
        assert_eq!(m.set(-1.0), 0.01);
        assert_eq!(m.get(), 0.01);
    }

    #[test]
    fn in_range_is_stored_verbatim() {
        let m = SpeedMultiplier::new(2.5);
        assert_eq!(m.get(), 2.5);
    }

    #[test]
    fn nan_stores_minimum() {
        let m = SpeedMultiplier::default();
        assert_eq!(m.set(f64::NAN), SpeedMultiplier::MIN);
    }
}

#[cfg(test)]
mod config {
    use std::io::Write;

    use crate::{RouteRefresh, SimConfig};

    #[test]
    fn empty_json_is_all_defaults() {
        let cfg: SimConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.movement_tick_ms, 50);
        assert_eq!(cfg.broadcast_tick_ms, 100);
        assert_eq!(cfg.route_refresh, RouteRefresh::Bank);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn file_overrides_fields() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"seed": 7, "route_refresh": "resolver", "grid_steps": 4}}"#).unwrap();
        let cfg = SimConfig::from_json_file(f.path()).unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.grid_steps, 4);
        assert_eq!(cfg.route_refresh, RouteRefresh::Resolver);
    }

    #[test]
    fn degenerate_bbox_rejected() {
        let mut cfg = SimConfig::default();
        cfg.bbox.max_lon = cfg.bbox.min_lon;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn resolver_threads_at_least_one() {
        let cfg = SimConfig { resolver_threads: Some(0), ..SimConfig::default() };
        assert_eq!(cfg.resolver_thread_count(), 1);
    }
}

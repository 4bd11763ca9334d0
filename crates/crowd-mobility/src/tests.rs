//! Unit tests for crowd-mobility.

#[cfg(test)]
mod step {
    use crowd_agent::Motion;
    use crowd_core::GeoPoint;
    use crowd_spatial::Route;

    use crate::{advance, step_towards, Advance, MobilityError};

    #[test]
    fn half_step_moves_halfway() {
        let (p, arrived) = step_towards(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0), 0.5);
        assert_eq!(p, GeoPoint::new(0.5, 0.0));
        assert!(!arrived);
    }

    #[test]
    fn step_beyond_target_lands_exactly() {
        let target = GeoPoint::new(1.0, 0.0);
        for step in [1.0, 1.5, 100.0] {
            let (p, arrived) = step_towards(GeoPoint::new(0.0, 0.0), target, step);
            assert_eq!(p, target);
            assert!(arrived);
        }
    }

    #[test]
    fn diagonal_step_keeps_direction() {
        let (p, _) = step_towards(GeoPoint::new(0.0, 0.0), GeoPoint::new(3.0, 4.0), 1.0);
        assert!((p.lon - 0.6).abs() < 1e-12);
        assert!((p.lat - 0.8).abs() < 1e-12);
    }

    #[test]
    fn zero_step_stays_put() {
        let start = GeoPoint::new(0.0, 0.0);
        assert_eq!(step_towards(start, GeoPoint::new(1.0, 0.0), 0.0), (start, false));
    }

    fn motion_on(points: &[(f64, f64)]) -> Motion {
        let route = Route::new(points.iter().map(|&(x, y)| GeoPoint::new(x, y)).collect()).unwrap();
        let mut m = Motion::new(GeoPoint::new(9.0, 9.0), 0.0);
        m.install_route(route);
        m
    }

    #[test]
    fn advance_walks_route_to_completion() {
        let mut m = motion_on(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert_eq!(m.position, GeoPoint::new(0.0, 0.0));
        assert_eq!(advance(&mut m, 0.6).unwrap(), Advance::Moved);
        assert_eq!(advance(&mut m, 0.6).unwrap(), Advance::Waypoint);
        assert_eq!(m.position, GeoPoint::new(1.0, 0.0));
        assert_eq!(advance(&mut m, 2.0).unwrap(), Advance::Finished);
        assert_eq!(m.position, GeoPoint::new(1.0, 1.0));
        let p = m.route.as_ref().unwrap();
        assert!(p.cursor() <= p.route().len());
    }

    #[test]
    fn finished_route_is_a_fault() {
        let mut m = motion_on(&[(0.0, 0.0), (1.0, 0.0)]);
        assert_eq!(advance(&mut m, 5.0).unwrap(), Advance::Finished);
        assert!(matches!(advance(&mut m, 5.0), Err(MobilityError::CursorOutOfRange { cursor: 2, len: 2 })));
    }

    #[test]
    fn no_route_is_idle() {
        let mut m = Motion::new(GeoPoint::new(0.0, 0.0), 0.001);
        assert_eq!(advance(&mut m, 1.0).unwrap(), Advance::Idle);
    }
}

#[cfg(test)]
mod limit {
    use crate::InFlightLimit;

    #[test]
    fn refuses_beyond_ceiling_and_frees_on_drop() {
        let limit = InFlightLimit::new(2);
        let a = limit.try_acquire().unwrap();
        let _b = limit.try_acquire().unwrap();
        assert!(limit.try_acquire().is_none());
        assert_eq!(limit.in_flight(), 2);
        drop(a);
        assert_eq!(limit.in_flight(), 1);
        assert!(limit.try_acquire().is_some());
    }

    #[test]
    fn zero_ceiling_refuses_everything() {
        assert!(InFlightLimit::new(0).try_acquire().is_none());
    }
}

#[cfg(test)]
mod resolver {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use crowd_core::{AgentId, BoundingBox, GeoPoint};
    use crowd_spatial::RoadNetwork;

    use crate::{MobilityError, ResolverConfig, RouteRequest, RouteResolver};

    fn network() -> Arc<RoadNetwork> {
        Arc::new(RoadNetwork::load(None, &BoundingBox::default(), 6).unwrap())
    }

    #[tokio::test]
    async fn each_request_is_delivered_once() {
        let (resolver, mut rx) = RouteResolver::new(
            network(),
            ResolverConfig { threads: 2, ceiling: 50, seed: 1 },
        )
        .unwrap();
        let bbox = BoundingBox::default();

        for i in 0..10 {
            let req = if i % 2 == 0 {
                RouteRequest::exploratory(AgentId(i), bbox.center())
            } else {
                RouteRequest::towards(AgentId(i), GeoPoint::new(bbox.min_lon, bbox.min_lat), bbox.center())
            };
            resolver.request(req).unwrap();
        }

        let mut seen = HashSet::new();
        for _ in 0..10 {
            let res = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(seen.insert(res.agent), "duplicate delivery for {}", res.agent);
            assert!(res.result.unwrap().len() >= 2);
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(resolver.in_flight(), 0);
    }

    #[tokio::test]
    async fn zero_ceiling_defers() {
        let (resolver, _rx) = RouteResolver::new(
            network(),
            ResolverConfig { threads: 1, ceiling: 0, seed: 1 },
        )
        .unwrap();
        let err = resolver
            .request(RouteRequest::exploratory(AgentId(1), BoundingBox::default().center()))
            .unwrap_err();
        assert!(matches!(err, MobilityError::Deferred { ceiling: 0, .. }));
    }
}

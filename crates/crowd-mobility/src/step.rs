//! Per-tick movement along a route.
//!
//! # Movement model
//!
//! Positions live in planar degree space.  Each tick an agent moves at most
//! `step` degrees straight toward its current waypoint; when the waypoint is
//! within reach it lands exactly on it (no overshoot, no carry-over into the
//! next segment) and the cursor advances.

use crowd_agent::Motion;
use crowd_core::GeoPoint;

use crate::{MobilityError, MobilityResult};

/// Outcome of one [`advance`] call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Advance {
    /// No active route.
    Idle,
    /// Moved toward the waypoint without reaching it.
    Moved,
    /// Landed on an intermediate waypoint.
    Waypoint,
    /// Landed on the final waypoint; the route is finished.
    Finished,
}

/// Move from `pos` toward `target` by at most `step`.
///
/// Returns the new position and whether it is exactly `target`.
pub fn step_towards(pos: GeoPoint, target: GeoPoint, step: f64) -> (GeoPoint, bool) {
    let dlon = target.lon - pos.lon;
    let dlat = target.lat - pos.lat;
    let dist = dlon.hypot(dlat);
    if dist <= step {
        return (target, true);
    }
    if step <= 0.0 {
        return (pos, false);
    }
    let k = step / dist;
    (GeoPoint::new(pos.lon + dlon * k, pos.lat + dlat * k), false)
}

/// Advance `motion` along its route by `step` degrees.
///
/// # Errors
///
/// [`MobilityError::CursorOutOfRange`] if the route is already finished; the
/// caller should clear it.
pub fn advance(motion: &mut Motion, step: f64) -> MobilityResult<Advance> {
    let Some(progress) = motion.route.as_mut() else {
        return Ok(Advance::Idle);
    };
    let Some(target) = progress.target() else {
        return Err(MobilityError::CursorOutOfRange {
            cursor: progress.cursor(),
            len:    progress.route().len(),
        });
    };

    let (pos, arrived) = step_towards(motion.position, target, step);
    motion.position = pos;
    if !arrived {
        return Ok(Advance::Moved);
    }
    Ok(if progress.advance() { Advance::Finished } else { Advance::Waypoint })
}

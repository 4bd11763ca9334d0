//! Geographic coordinate types and spatial utilities.
//!
//! Coordinates are `(lon, lat)` in WGS-84 degrees stored as `f64`.  Agent
//! speeds are expressed in degrees per tick (≈ 30–90 m), so single precision
//! would visibly quantize movement near the snap threshold.
//!
//! Two distance measures are provided:
//!
//! - [`GeoPoint::distance_m`]: haversine metres, used for edge weights.
//! - [`GeoPoint::planar_distance`]: Euclidean distance in degree space, used
//!   for movement steps and proximity counts.

use serde::{Deserialize, Serialize};

use crate::SimRng;

/// Quantization scale for coordinate cache keys (1e-5° ≈ 1.1 m).
pub const QUANTIZE_SCALE: f64 = 1e5;

/// A WGS-84 geographic coordinate.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    #[inline]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Haversine great-circle distance in metres.
    pub fn distance_m(self, other: GeoPoint) -> f64 {
        const R: f64 = 6_371_000.0; // mean Earth radius, metres

        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat * 0.5).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        R * c
    }

    /// Euclidean distance in degree space.
    #[inline]
    pub fn planar_distance(self, other: GeoPoint) -> f64 {
        (other.lon - self.lon).hypot(other.lat - self.lat)
    }

    /// `true` if `other` lies within `radius` degrees (inclusive).
    #[inline]
    pub fn within(self, other: GeoPoint, radius: f64) -> bool {
        let dlon = self.lon - other.lon;
        let dlat = self.lat - other.lat;
        dlon * dlon + dlat * dlat <= radius * radius
    }

    /// Return a copy shifted by `(dlon, dlat)` degrees.
    #[inline]
    pub fn offset(self, dlon: f64, dlat: f64) -> GeoPoint {
        GeoPoint::new(self.lon + dlon, self.lat + dlat)
    }

    /// Integer key at 1e-5° resolution, used by the nearest-node and variant
    /// caches to bound their growth.
    #[inline]
    pub fn quantized(self) -> (i64, i64) {
        (
            (self.lon * QUANTIZE_SCALE).round() as i64,
            (self.lat * QUANTIZE_SCALE).round() as i64,
        )
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lon, self.lat)
    }
}

// ── BoundingBox ───────────────────────────────────────────────────────────────

/// The rectangular operating area of the simulation.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub const fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self { min_lon, max_lon, min_lat, max_lat }
    }

    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lon + self.max_lon) * 0.5,
            (self.min_lat + self.max_lat) * 0.5,
        )
    }

    pub fn contains(&self, p: GeoPoint) -> bool {
        (self.min_lon..=self.max_lon).contains(&p.lon)
            && (self.min_lat..=self.max_lat).contains(&p.lat)
    }

    /// `true` if the box has positive extent on both axes.
    pub fn is_valid(&self) -> bool {
        self.lon_span() > 0.0 && self.lat_span() > 0.0
    }

    /// Uniformly sample a point inside the box.
    pub fn sample(&self, rng: &mut SimRng) -> GeoPoint {
        GeoPoint::new(
            rng.gen_range(self.min_lon..=self.max_lon),
            rng.gen_range(self.min_lat..=self.max_lat),
        )
    }

    /// Pick a point `margin` degrees outside one of the four sides (chosen
    /// uniformly), at a uniformly random position along that side.
    pub fn exit_point(&self, margin: f64, rng: &mut SimRng) -> GeoPoint {
        match rng.gen_range(0..4u8) {
            0 => GeoPoint::new(rng.gen_range(self.min_lon..=self.max_lon), self.max_lat + margin),
            1 => GeoPoint::new(rng.gen_range(self.min_lon..=self.max_lon), self.min_lat - margin),
            2 => GeoPoint::new(self.max_lon + margin, rng.gen_range(self.min_lat..=self.max_lat)),
            _ => GeoPoint::new(self.min_lon - margin, rng.gen_range(self.min_lat..=self.max_lat)),
        }
    }
}

impl Default for BoundingBox {
    /// Ujjain, Madhya Pradesh: a 0.1° × 0.1° box around the old city.
    fn default() -> Self {
        Self::new(75.7264, 75.8264, 23.1324, 23.2324)
    }
}

//! `crowd-spatial`: road network, spatial indexing, and routing.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                    |
//! |--------------|-------------------------------------------------------------|
//! | [`graph`]    | `RoadGraph` (CSR + R-tree + edge polylines), builder        |
//! | [`route`]    | `Route` (shared coordinate sequence), `Path` (node/edge ids)|
//! | [`router`]   | `Router` trait, `DijkstraRouter`, `YenRouter`               |
//! | [`bank`]     | `RouteBank`: precomputed routes indexed by origin node     |
//! | [`variants`] | `VariantCache`, `VariantKey`                                |
//! | [`loader`]   | JSON network cache and synthetic grid fallback              |
//! | [`network`]  | `RoadNetwork`: the caching facade used by the simulation   |
//! | [`error`]    | `SpatialError`, `SpatialResult<T>`                          |

pub mod bank;
pub mod error;
pub mod graph;
pub mod loader;
pub mod network;
pub mod route;
pub mod router;
pub mod variants;

#[cfg(test)]
mod tests;

pub use bank::RouteBank;
pub use error::{SpatialError, SpatialResult};
pub use graph::{RoadGraph, RoadGraphBuilder};
pub use loader::{load_cache, save_cache, synthetic_grid};
pub use network::{NetworkSource, RoadNetwork};
pub use route::{Path, Route};
pub use router::{DijkstraRouter, Router, YenRouter};
pub use variants::{VariantCache, VariantKey};

//! `crowd-core`: foundational types for the `rust_crowd` simulation engine.
//!
//! This crate is a dependency of every other `crowd-*` crate.  It has no
//! `crowd-*` dependencies and only small external ones (`rand`, `serde`,
//! `serde_json`, `thiserror`).
//!
//! # What lives here
//!
//! | Module     | Contents                                                   |
//! |------------|------------------------------------------------------------|
//! | [`ids`]    | `AgentId`, `NodeId`, `EdgeId`, `CampaignId`, `IdSource`    |
//! | [`geo`]    | `GeoPoint`, `BoundingBox`, haversine / planar distances    |
//! | [`rng`]    | `SimRng` (seedable, with deterministic child streams)      |
//! | [`speed`]  | `SpeedMultiplier`: process-wide clamped step scale        |
//! | [`config`] | `SimConfig`, `RouteRefresh`                                |
//! | [`error`]  | `CoreError`, `CoreResult`                                  |

pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod rng;
pub mod speed;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{RouteRefresh, SimConfig};
pub use error::{CoreError, CoreResult};
pub use geo::{BoundingBox, GeoPoint};
pub use ids::{AgentId, CampaignId, EdgeId, IdSource, NodeId};
pub use rng::SimRng;
pub use speed::SpeedMultiplier;

//! Top-level simulation configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BoundingBox, CoreError, CoreResult};

/// How agents without a route obtain their next one.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteRefresh {
    /// Instant draw from the precomputed route bank.
    #[default]
    Bank,
    /// Asynchronous request through the route resolver.
    Resolver,
}

/// Top-level simulation configuration.
///
/// Loaded from a JSON file by the application crate (every field has a
/// default, so `{}` is a valid config) and passed to the simulation context.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Operating area.  Spawn points, the synthetic grid and exit targets are
    /// all derived from it.
    pub bbox: BoundingBox,

    /// Master RNG seed.
    pub seed: u64,

    /// Persistent road-network cache (JSON).  `None` always builds the
    /// synthetic grid.
    pub network_cache: Option<PathBuf>,

    /// Cells per side of the synthetic fallback grid (nodes = (steps+1)²).
    pub grid_steps: usize,

    /// Routes collected by the startup route-bank warm-up.
    pub route_bank_target: usize,

    /// Movement scheduler period.
    pub movement_tick_ms: u64,

    /// Broadcast publisher period.
    pub broadcast_tick_ms: u64,

    /// Poll period of the event-campaign and random-traffic tasks.
    pub campaign_poll_ms: u64,

    /// Maximum concurrently in-flight route resolutions.
    pub resolver_in_flight: usize,

    /// Resolver worker threads.  `None` = available parallelism, capped at 4.
    pub resolver_threads: Option<usize>,

    /// Route source for agents that finished their route.
    pub route_refresh: RouteRefresh,

    /// Initial global speed multiplier (clamped to [0.01, 10]).
    pub speed_multiplier: f64,

    /// Per-subscriber delivery timeout.
    pub publish_timeout_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bbox:               BoundingBox::default(),
            seed:               42,
            network_cache:      None,
            grid_steps:         12,
            route_bank_target:  600,
            movement_tick_ms:   50,
            broadcast_tick_ms:  100,
            campaign_poll_ms:   500,
            resolver_in_flight: 50,
            resolver_threads:   None,
            route_refresh:      RouteRefresh::Bank,
            speed_multiplier:   1.0,
            publish_timeout_ms: 1_000,
        }
    }
}

impl SimConfig {
    /// Read a JSON config file.  Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.bbox.is_valid() {
            return Err(CoreError::Config(format!("degenerate bounding box {:?}", self.bbox)));
        }
        if self.grid_steps == 0 {
            return Err(CoreError::Config("grid_steps must be at least 1".into()));
        }
        if self.movement_tick_ms == 0 || self.broadcast_tick_ms == 0 || self.campaign_poll_ms == 0 {
            return Err(CoreError::Config("task periods must be non-zero".into()));
        }
        if self.resolver_in_flight == 0 {
            return Err(CoreError::Config("resolver_in_flight must be at least 1".into()));
        }
        Ok(())
    }

    pub fn movement_period(&self) -> Duration {
        Duration::from_millis(self.movement_tick_ms)
    }

    pub fn broadcast_period(&self) -> Duration {
        Duration::from_millis(self.broadcast_tick_ms)
    }

    pub fn campaign_period(&self) -> Duration {
        Duration::from_millis(self.campaign_poll_ms)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    /// Resolver worker count after applying the default cap.
    pub fn resolver_thread_count(&self) -> usize {
        self.resolver_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().min(4))
                .unwrap_or(2)
        })
        .max(1)
    }
}

//! Scripted event campaigns: periodic waves from a fixed source to a fixed
//! destination, with dwell and optional exit.
//!
//! # Wave timing
//!
//! ```text
//! start(t0) ─► wave 1 at t0 ─► wave 2 at t0 + interval ─► … ─► max_waves reached: inactive
//!                 │
//!                 └─ no variants: skipped, retried at now + interval
//! ```
//!
//! The deadline is re-armed relative to the poll that launched the wave, so a
//! slow poll never causes a burst of catch-up waves.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crowd_agent::{Agent, AgentBuilder, AgentFilter, AgentKind, EventState};
use crowd_core::{CampaignId, GeoPoint, SimRng};

use crate::context::lock;
use crate::generators::{random_speed, vary_route, Detour, SPEED_RANGE};
use crate::{SimContext, SimError, SimResult};

/// Alternates computed per campaign.
pub const EVENT_VARIANTS: usize = 6;

pub const EVENT_DETOUR: Detour = Detour { probability: 0.3, spread: 0.004 };

/// Upper bound on any campaign interval or dwell, seconds (one day).
pub const MAX_CAMPAIGN_SECONDS: f64 = 86_400.0;

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventCampaignConfig {
    pub source:      GeoPoint,
    pub destination: GeoPoint,
    #[serde(default = "defaults::wave_size")]
    pub wave_size: usize,
    #[serde(default = "defaults::wave_interval")]
    pub wave_interval_seconds: f64,
    #[serde(default = "defaults::dwell_min")]
    pub dwell_min_seconds: f64,
    #[serde(default = "defaults::dwell_max")]
    pub dwell_max_seconds: f64,
    #[serde(default = "defaults::exit_after_dwell")]
    pub exit_after_dwell: bool,
    /// `None` runs until stopped.
    #[serde(default)]
    pub max_waves: Option<u32>,
}

mod defaults {
    pub fn wave_size() -> usize { 100 }
    pub fn wave_interval() -> f64 { 10.0 }
    pub fn dwell_min() -> f64 { 30.0 }
    pub fn dwell_max() -> f64 { 90.0 }
    pub fn exit_after_dwell() -> bool { true }
}

impl EventCampaignConfig {
    /// A config with every optional field at its default.
    pub fn new(source: GeoPoint, destination: GeoPoint) -> Self {
        Self {
            source,
            destination,
            wave_size: defaults::wave_size(),
            wave_interval_seconds: defaults::wave_interval(),
            dwell_min_seconds: defaults::dwell_min(),
            dwell_max_seconds: defaults::dwell_max(),
            exit_after_dwell: defaults::exit_after_dwell(),
            max_waves: None,
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.wave_size == 0 {
            return Err(SimError::Config("wave_size must be at least 1".into()));
        }
        if !(self.wave_interval_seconds > 0.0 && self.wave_interval_seconds <= MAX_CAMPAIGN_SECONDS) {
            return Err(SimError::Config(format!(
                "wave_interval_seconds must be in (0, {MAX_CAMPAIGN_SECONDS}], got {}",
                self.wave_interval_seconds
            )));
        }
        let dwell_ok = |s: f64| (0.0..=MAX_CAMPAIGN_SECONDS).contains(&s);
        if !(dwell_ok(self.dwell_min_seconds) && dwell_ok(self.dwell_max_seconds)) {
            return Err(SimError::Config(format!(
                "dwell bounds must be within [0, {MAX_CAMPAIGN_SECONDS}]"
            )));
        }
        if self.dwell_min_seconds > self.dwell_max_seconds {
            return Err(SimError::Config(format!(
                "dwell_min_seconds ({}) exceeds dwell_max_seconds ({})",
                self.dwell_min_seconds, self.dwell_max_seconds
            )));
        }
        if self.max_waves == Some(0) {
            return Err(SimError::Config("max_waves must be at least 1 when set".into()));
        }
        Ok(())
    }

    pub fn wave_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.wave_interval_seconds).unwrap_or(Duration::ZERO)
    }

    fn dwell_bounds(&self) -> (Duration, Duration) {
        let min = Duration::try_from_secs_f64(self.dwell_min_seconds).unwrap_or(Duration::ZERO);
        let max = Duration::try_from_secs_f64(self.dwell_max_seconds).unwrap_or(min);
        (min, max)
    }
}

// ── Runtime state ─────────────────────────────────────────────────────────────

/// Runtime state of the (single) event campaign.
#[derive(Debug, Default)]
pub struct EventCampaign {
    config:         Option<EventCampaignConfig>,
    campaign:       Option<CampaignId>,
    active:         bool,
    next_wave:      Option<Instant>,
    waves_launched: u32,
}

/// Point-in-time campaign status.
#[derive(Clone, Debug, Serialize)]
pub struct EventStatus {
    pub active:               bool,
    pub campaign:             Option<CampaignId>,
    pub waves_launched:       u32,
    pub next_wave_in_seconds: Option<f64>,
    pub event_agents:         usize,
    pub config:               Option<EventCampaignConfig>,
}

impl EventCampaign {
    /// Replace any running campaign.  The first wave is due immediately.
    pub fn start(&mut self, config: EventCampaignConfig, campaign: CampaignId, now: Instant) {
        self.config = Some(config);
        self.campaign = Some(campaign);
        self.active = true;
        self.next_wave = Some(now);
        self.waves_launched = 0;
    }

    /// Deactivate.  Returns whether a campaign was running.
    pub fn stop(&mut self) -> bool {
        let was_active = self.active;
        self.active = false;
        self.next_wave = None;
        was_active
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn waves_launched(&self) -> u32 {
        self.waves_launched
    }

    /// `true` while `campaign` is the running campaign.
    fn is_running(&self, campaign: CampaignId) -> bool {
        self.active && self.campaign == Some(campaign)
    }

    /// The config and id of a wave due at `now`, if any.
    fn due(&self, now: Instant) -> Option<(EventCampaignConfig, CampaignId)> {
        match self.next_wave {
            Some(t) if self.active && t <= now => Some((self.config.clone()?, self.campaign?)),
            _ => None,
        }
    }

    /// `None` leaves an active campaign with no wave ever due.
    fn retry_at(&mut self, at: Option<Instant>) {
        self.next_wave = at;
    }

    /// Count a launched wave and re-arm or deactivate.
    fn wave_launched(&mut self, now: Instant) {
        self.waves_launched += 1;
        let Some(config) = &self.config else { return };
        if config.max_waves.is_some_and(|max| self.waves_launched >= max) {
            self.active = false;
            self.next_wave = None;
        } else {
            self.next_wave = now.checked_add(config.wave_interval());
        }
    }

    pub fn status(&self, now: Instant, event_agents: usize) -> EventStatus {
        EventStatus {
            active: self.active,
            campaign: self.campaign,
            waves_launched: self.waves_launched,
            next_wave_in_seconds: self
                .next_wave
                .filter(|_| self.active)
                .map(|t| t.saturating_duration_since(now).as_secs_f64()),
            event_agents,
            config: self.config.clone(),
        }
    }
}

// ── Poll ──────────────────────────────────────────────────────────────────────

/// Launch the campaign's next wave if one is due at `now`.  Returns the
/// number of agents spawned.
///
/// Variants and routes are computed without holding the campaign lock; the
/// wave is inserted only if the same campaign is still running afterwards.
pub fn poll_event(ctx: &SimContext, now: Instant, rng: &mut SimRng) -> usize {
    let Some((config, campaign)) = lock(&ctx.event).due(now) else {
        return 0;
    };

    let variants = match ctx
        .network
        .variants_between(config.source, config.destination, EVENT_VARIANTS, rng)
    {
        Ok(v) => v,
        Err(e) => {
            warn!(%campaign, error = %e, "event wave skipped: no route variants");
            let mut ev = lock(&ctx.event);
            if ev.is_running(campaign) {
                ev.retry_at(now.checked_add(config.wave_interval()));
            }
            return 0;
        }
    };

    let (dwell_min, dwell_max) = config.dwell_bounds();
    let mut wave: Vec<Agent> = Vec::with_capacity(config.wave_size);
    for _ in 0..config.wave_size {
        let Some(base) = rng.choose(&variants[..]) else { break };
        let route = vary_route(&ctx.network, base, EVENT_DETOUR, rng);
        wave.push(
            AgentBuilder::new(ctx.ids.next_agent())
                .route(route)
                .speed(random_speed(rng, SPEED_RANGE.0, SPEED_RANGE.1))
                .kind(AgentKind::Event(EventState::new(
                    campaign,
                    dwell_min,
                    dwell_max,
                    config.exit_after_dwell,
                )))
                .build(),
        );
    }

    let mut ev = lock(&ctx.event);
    if !ev.is_running(campaign) {
        debug!(%campaign, "campaign stopped while its wave was built; wave dropped");
        return 0;
    }
    let added = ctx.store.insert_many(wave);
    ev.wave_launched(now);
    info!(
        %campaign,
        wave = ev.waves_launched(),
        added,
        variants = variants.len(),
        active = ev.is_active(),
        "event wave spawned"
    );
    added
}

// ── Control ───────────────────────────────────────────────────────────────────

pub(crate) fn start(ctx: &SimContext, config: EventCampaignConfig, now: Instant) -> SimResult<CampaignId> {
    config.validate()?;
    let campaign = ctx.ids.next_campaign();
    info!(
        %campaign,
        source = %config.source,
        destination = %config.destination,
        wave_size = config.wave_size,
        interval_s = config.wave_interval_seconds,
        max_waves = ?config.max_waves,
        "event campaign started"
    );
    lock(&ctx.event).start(config, campaign, now);
    Ok(campaign)
}

pub(crate) fn stop(ctx: &SimContext) -> bool {
    let was_active = lock(&ctx.event).stop();
    if was_active {
        info!("event campaign stopped");
    }
    was_active
}

pub(crate) fn status(ctx: &SimContext, now: Instant) -> EventStatus {
    let (event_agents, _) = ctx.store.count_matching(AgentFilter::Event);
    lock(&ctx.event).status(now, event_agents)
}

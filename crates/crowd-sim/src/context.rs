//! Shared simulation state.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};

use crowd_agent::{AgentFilter, AgentStore};
use crowd_core::{IdSource, SimConfig, SimRng, SpeedMultiplier};
use crowd_mobility::RouteResolver;
use crowd_spatial::RoadNetwork;

use crate::campaign::EventCampaign;
use crate::traffic::RandomTraffic;

/// Commands the movement scheduler applies at the start of its next step.
///
/// Removal of existing agents is owned by the scheduler, so bulk clears are
/// routed through it rather than applied by the caller.
#[derive(Debug)]
pub enum Control {
    /// Remove every agent the filter selects; replies `(removed, remaining)`.
    Clear {
        filter: AgentFilter,
        reply:  oneshot::Sender<(usize, usize)>,
    },
}

/// Everything the periodic tasks and the control surface share.
///
/// Passed around as `Arc<SimContext>`; there is no other global state.
pub struct SimContext {
    pub config:   SimConfig,
    pub network:  Arc<RoadNetwork>,
    pub store:    AgentStore,
    pub resolver: RouteResolver,
    pub ids:      IdSource,
    pub speed:    SpeedMultiplier,

    pub(crate) event:   Mutex<EventCampaign>,
    pub(crate) traffic: Mutex<RandomTraffic>,
    pub(crate) control: mpsc::UnboundedSender<Control>,
    /// Parent stream for control-surface calls, which have no task of their own.
    rng: Mutex<SimRng>,
}

impl SimContext {
    pub(crate) fn new(
        config:   SimConfig,
        network:  Arc<RoadNetwork>,
        resolver: RouteResolver,
        control:  mpsc::UnboundedSender<Control>,
        rng:      SimRng,
    ) -> Self {
        let speed = SpeedMultiplier::new(config.speed_multiplier);
        Self {
            config,
            network,
            store: AgentStore::new(),
            resolver,
            ids: IdSource::new(),
            speed,
            event: Mutex::new(EventCampaign::default()),
            traffic: Mutex::new(RandomTraffic::default()),
            control,
            rng: Mutex::new(rng),
        }
    }

    /// A fresh RNG stream for one control-surface call.
    pub fn fork_rng(&self) -> SimRng {
        lock(&self.rng).child(1)
    }
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

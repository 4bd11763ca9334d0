//! Read-only projections of the population.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crowd_core::AgentId;

use crate::agent::{Agent, AgentKind, EventPhase, KindTag};

/// Minimal per-agent record streamed to observers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id:    AgentId,
    pub lat:   f64,
    pub lon:   f64,
    #[serde(rename = "type")]
    pub kind:  KindTag,
    pub phase: Option<EventPhase>,
    pub speed: f64,
    pub stop:  bool,
}

impl From<&Agent> for AgentSnapshot {
    fn from(a: &Agent) -> Self {
        Self {
            id:    a.id,
            lat:   a.motion.position.lat,
            lon:   a.motion.position.lon,
            kind:  a.kind.tag(),
            phase: a.kind.phase(),
            speed: a.motion.speed,
            stop:  a.stop_at_end,
        }
    }
}

/// Selector for bulk removal.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentFilter {
    #[default]
    All,
    Random,
    Event,
    /// Stop-at-destination agents.
    Routed,
}

impl AgentFilter {
    pub fn matches(self, agent: &Agent) -> bool {
        match self {
            AgentFilter::All    => true,
            AgentFilter::Random => matches!(agent.kind, AgentKind::Random),
            AgentFilter::Event  => agent.is_event(),
            AgentFilter::Routed => agent.stop_at_end,
        }
    }
}

impl FromStr for AgentFilter {
    type Err = String;

    /// `""` and `"all"` select everything.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(AgentFilter::All),
            "random"   => Ok(AgentFilter::Random),
            "event"    => Ok(AgentFilter::Event),
            "routed"   => Ok(AgentFilter::Routed),
            other      => Err(format!("unknown agent filter `{other}`")),
        }
    }
}

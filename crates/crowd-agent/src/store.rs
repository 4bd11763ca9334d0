//! The shared population store.
//!
//! # Locking discipline
//!
//! One mutex guards the whole map.  Every method takes the lock for a single
//! operation (one agent, one insert batch, one scan) and releases it before
//! returning; no caller ever holds it across a tick.  The movement scheduler
//! therefore iterates an [`ids`](AgentStore::ids) snapshot and re-locks per
//! agent, tolerating agents inserted or removed in between.
//!
//! Writers by field group: generators only [`insert`](AgentStore::insert);
//! the scheduler owns every mutation of existing agents and every removal.

use std::sync::{Mutex, MutexGuard};

use rustc_hash::FxHashMap;

use crowd_core::{AgentId, GeoPoint};

use crate::agent::Agent;
use crate::snapshot::{AgentFilter, AgentSnapshot};

#[derive(Default)]
pub struct AgentStore {
    agents: Mutex<FxHashMap<AgentId, Agent>>,
}

impl AgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, agent: Agent) {
        self.lock().insert(agent.id, agent);
    }

    /// Insert a batch under one lock acquisition.  Returns the batch size.
    pub fn insert_many(&self, agents: impl IntoIterator<Item = Agent>) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.extend(agents.into_iter().map(|a| (a.id, a)));
        map.len() - before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Point-in-time id list, ascending.
    pub fn ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Run `f` on one agent.  `None` if the agent no longer exists.
    pub fn with_agent<R>(&self, id: AgentId, f: impl FnOnce(&Agent) -> R) -> Option<R> {
        self.lock().get(&id).map(f)
    }

    /// Run `f` on one agent mutably.  `None` if the agent no longer exists.
    pub fn with_agent_mut<R>(&self, id: AgentId, f: impl FnOnce(&mut Agent) -> R) -> Option<R> {
        self.lock().get_mut(&id).map(f)
    }

    pub fn remove(&self, id: AgentId) -> Option<Agent> {
        self.lock().remove(&id)
    }

    /// Remove every agent `filter` selects.  Returns `(removed, remaining)`.
    pub fn remove_matching(&self, filter: AgentFilter) -> (usize, usize) {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, a| !filter.matches(a));
        (before - map.len(), map.len())
    }

    /// `(matching, total)` in one consistent view.
    pub fn count_matching(&self, filter: AgentFilter) -> (usize, usize) {
        let map = self.lock();
        (map.values().filter(|a| filter.matches(a)).count(), map.len())
    }

    /// Agents with an outstanding route request.
    pub fn pending_count(&self) -> usize {
        self.lock().values().filter(|a| a.motion.is_pending()).count()
    }

    /// Projection of every agent, ordered by id.
    pub fn snapshot(&self) -> Vec<AgentSnapshot> {
        let mut out: Vec<AgentSnapshot> = self.lock().values().map(AgentSnapshot::from).collect();
        out.sort_unstable_by_key(|s| s.id);
        out
    }

    /// Agents within `radius` degrees of `point` (planar, inclusive).
    pub fn count_within(&self, point: GeoPoint, radius: f64) -> usize {
        self.lock()
            .values()
            .filter(|a| point.within(a.motion.position, radius))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<AgentId, Agent>> {
        // Every critical section leaves the map consistent, so a panic
        // elsewhere does not invalidate it.
        self.agents.lock().unwrap_or_else(|e| e.into_inner())
    }
}

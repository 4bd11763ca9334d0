//! One broadcast frame: the population snapshot plus its JSON encoding.

use std::sync::Arc;

use crowd_agent::AgentSnapshot;

use crate::OutputResult;

/// A published snapshot.  Cheap to clone; the JSON is encoded once per
/// publish and shared by every subscriber.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Publish sequence number, starting at 0.
    pub seq:    u64,
    pub agents: Arc<[AgentSnapshot]>,
    /// `agents` as a JSON array.
    pub json:   Arc<str>,
}

impl Frame {
    pub fn encode(seq: u64, agents: Vec<AgentSnapshot>) -> OutputResult<Self> {
        let json = serde_json::to_string(&agents)?;
        Ok(Self { seq, agents: agents.into(), json: json.into() })
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

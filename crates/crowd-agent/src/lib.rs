//! `crowd-agent`: agent model and the shared population store.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                        |
//! |--------------|-----------------------------------------------------------------|
//! | [`agent`]    | `Agent`, `Motion`, `RouteProgress`, `Pending`, `AgentKind`, `EventState` |
//! | [`builder`]  | `AgentBuilder` (fluent construction)                            |
//! | [`store`]    | `AgentStore`: mutex-guarded map, proximity query                |
//! | [`snapshot`] | `AgentSnapshot` wire projection, `AgentFilter`                  |

pub mod agent;
pub mod builder;
pub mod snapshot;
pub mod store;


pub use agent::{Agent, AgentKind, EventPhase, EventState, KindTag, Motion, Pending, RouteProgress};
pub use builder::{AgentBuilder, DEFAULT_SPEED};
pub use snapshot::{AgentFilter, AgentSnapshot};
pub use store::AgentStore;

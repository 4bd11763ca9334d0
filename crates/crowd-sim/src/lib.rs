//! `crowd-sim`: shared context, movement scheduler, population generators
//! and the periodic-task runtime for the rust_crowd engine.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                      |
//! |-----------------|---------------------------------------------------------------|
//! | [`context`]     | `SimContext` (everything shared), `Control` commands          |
//! | [`builder`]     | `SimBuilder`, `Sim` (manual stepping)                          |
//! | [`scheduler`]   | `Scheduler::step`, `TickStats`, event-agent state machine      |
//! | [`generators`]  | immediate spawn, routed crowd, route detours                   |
//! | [`campaign`]    | event campaigns: config, wave timing, `poll_event`             |
//! | [`traffic`]     | background traffic admission control, `poll_random_traffic`    |
//! | [`handle`]      | `SimHandle` control surface                                    |
//! | [`observer`]    | `SimObserver` broadcast hook                                   |
//! | [`runtime`]     | `SimRuntime`: the four periodic tasks and shutdown             |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use crowd_core::SimConfig;
//! use crowd_sim::{NoopObserver, SimBuilder, SimRuntime};
//!
//! let sim = SimBuilder::new(SimConfig::default()).build()?;
//! let runtime = SimRuntime::start(sim, NoopObserver);
//! runtime.handle().add_agents(100).await?;
//! runtime.shutdown().await?;
//! ```

pub mod builder;
pub mod campaign;
pub mod context;
pub mod error;
pub mod generators;
pub mod handle;
pub mod observer;
pub mod runtime;
pub mod scheduler;
pub mod traffic;


pub use builder::{Sim, SimBuilder};
pub use campaign::{poll_event, EventCampaign, EventCampaignConfig, EventStatus};
pub use context::{Control, SimContext};
pub use error::{SimError, SimResult};
pub use generators::{add_agents, add_routed_crowd, vary_route, CrowdOutcome, CrowdRouteRequest, Detour};
pub use handle::{Health, PerfStatus, SimHandle};
pub use observer::{NoopObserver, SimObserver};
pub use runtime::SimRuntime;
pub use scheduler::{Scheduler, TickStats};
pub use traffic::{poll_random_traffic, RandomTraffic, RandomTrafficConfig, RandomTrafficStatus};

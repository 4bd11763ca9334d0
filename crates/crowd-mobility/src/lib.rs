//! `crowd-mobility`: agent movement and route resolution.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                        |
//! |--------------|-----------------------------------------------------------------|
//! | [`step`]     | `step_towards`, `advance`: bounded per-tick movement            |
//! | [`resolver`] | `RouteResolver`: rayon pool, in-flight ceiling, completion channel |
//! | [`error`]    | `MobilityError`, `MobilityResult<T>`                            |

pub mod error;
pub mod resolver;
pub mod step;

#[cfg(test)]
mod tests;

pub use error::{MobilityError, MobilityResult};
pub use resolver::{InFlightLimit, Permit, Resolution, ResolverConfig, RouteRequest, RouteResolver};
pub use step::{advance, step_towards, Advance};

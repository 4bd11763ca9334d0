//! `crowd-output`: broadcast publisher and subscribers for the rust_crowd
//! engine.
//!
//! | Module         | Contents                                                   |
//! |----------------|------------------------------------------------------------|
//! | [`publisher`]  | `Publisher` (a `SimObserver`), `PublisherHandle`           |
//! | [`subscriber`] | `Subscriber` trait, `ChannelSubscriber`                    |
//! | [`csv`]        | `CsvRecorder`: `agent_snapshots.csv`, one row per agent per frame |
//! | [`frame`]      | `Frame`: snapshot plus its one-time JSON encoding          |
//!
//! # Usage
//!
//! ```rust,ignore
//! use crowd_output::{ChannelSubscriber, Publisher};
//!
//! let publisher = Publisher::new(config.publish_timeout());
//! let subscribers = publisher.handle();
//! let runtime = SimRuntime::start(sim, publisher);
//!
//! let (sub, mut frames) = ChannelSubscriber::new(16);
//! subscribers.subscribe(sub);
//! while let Some(json) = frames.recv().await { /* write to socket */ }
//! ```

pub mod csv;
pub mod error;
pub mod frame;
pub mod publisher;
pub mod subscriber;

#[cfg(test)]
mod tests;

pub use self::csv::CsvRecorder;
pub use error::{OutputError, OutputResult};
pub use frame::Frame;
pub use publisher::{PublishStats, Publisher, PublisherHandle, SubscriberId};
pub use subscriber::{ChannelSubscriber, Subscriber};

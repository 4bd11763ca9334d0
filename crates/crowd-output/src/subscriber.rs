//! The `Subscriber` trait and the channel-backed subscriber.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Frame, OutputError, OutputResult};

/// A frame consumer registered with the [`Publisher`](crate::Publisher).
///
/// Any error from [`deliver`](Self::deliver) (or exceeding the publisher's
/// delivery timeout) drops the subscriber; it must subscribe again.
#[async_trait]
pub trait Subscriber: Send {
    async fn deliver(&mut self, frame: &Frame) -> OutputResult<()>;

    /// Called when the publisher shuts down with this subscriber attached.
    async fn close(&mut self) -> OutputResult<()> {
        Ok(())
    }
}

/// Forwards each frame's JSON into a bounded channel.  The transport layer
/// holds the receiver and writes to its socket.
///
/// Delivery never waits: a full queue means the consumer is too slow, and
/// the subscriber is dropped.
pub struct ChannelSubscriber {
    tx: mpsc::Sender<Arc<str>>,
}

impl ChannelSubscriber {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn deliver(&mut self, frame: &Frame) -> OutputResult<()> {
        self.tx.try_send(Arc::clone(&frame.json)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => OutputError::Full,
            mpsc::error::TrySendError::Closed(_) => OutputError::Closed,
        })
    }
}

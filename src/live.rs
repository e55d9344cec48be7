//! Fan-out of freshly appended samples to live subscribers.
//!
//! Backed by a `tokio::sync::broadcast` channel: each subscriber has a bounded
//! queue, and one that falls behind loses its oldest events
//! (`RecvError::Lagged`) instead of slowing the publisher down.

use tokio::sync::broadcast;

use crate::models::LiveEvent;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct LivePublisher {
    tx: broadcast::Sender<LiveEvent>,
}

impl LivePublisher {
    /// `capacity` is the per-subscriber queue length; must be non-zero.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Broadcast to whoever is subscribed right now. Never blocks.
    ///
    /// Returns the number of subscribers that will see the event.
    pub fn publish(&self, event: LiveEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LivePublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

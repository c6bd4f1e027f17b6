//! Subscriber channels: where a feed delivers its events.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::protocol::Outbound;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("failed to encode {event}: {source}")]
    Encode {
        event: &'static str,
        source: serde_json::Error,
    },
}

/// A remote peer that can be pushed events. Delivery is best effort: there is
/// no acknowledgement and a successful `send` only means the event was queued.
pub trait SubscriberChannel: Send + Sync {
    fn send(&self, event: &Outbound) -> Result<(), ChannelError>;

    fn is_connected(&self) -> bool;
}

fn encode(event: &Outbound) -> Result<String, ChannelError> {
    event.to_line().map_err(|source| ChannelError::Encode {
        event: event.name(),
        source,
    })
}

/// Lines queued for one connection before further events are dropped.
pub const CONNECTION_QUEUE: usize = 64;

/// One client connection. Encoded lines are queued for the connection's
/// writer task; the channel reports disconnected once that task is gone.
///
/// The queue is bounded: while a peer is not reading, events beyond
/// [`CONNECTION_QUEUE`] are dropped instead of buffered.
#[derive(Debug, Clone)]
pub struct ConnectionChannel {
    tx: mpsc::Sender<String>,
}

impl ConnectionChannel {
    pub fn new() -> (Self, mpsc::Receiver<String>) {
        Self::with_capacity(CONNECTION_QUEUE)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl SubscriberChannel for ConnectionChannel {
    fn send(&self, event: &Outbound) -> Result<(), ChannelError> {
        let line = encode(event)?;
        match self.tx.try_send(line) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("Connection queue full; dropping {}", event.name());
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(ChannelError::Closed),
        }
    }

    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Fan-out to every subscribed connection. Each event is encoded once.
#[derive(Debug, Clone)]
pub struct BroadcastChannel {
    tx: broadcast::Sender<Arc<str>>,
}

impl BroadcastChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl SubscriberChannel for BroadcastChannel {
    fn send(&self, event: &Outbound) -> Result<(), ChannelError> {
        let line: Arc<str> = encode(event)?.into();
        self.tx
            .send(line)
            .map(|_| ())
            .map_err(|_| ChannelError::Closed)
    }

    fn is_connected(&self) -> bool {
        self.tx.receiver_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connection_channel_queues_lines() {
        let (channel, mut rx) = ConnectionChannel::new();
        assert!(channel.is_connected());
        channel.send(&Outbound::info("hi")).unwrap();
        let line = rx.recv().await.unwrap();
        assert!(line.contains("info-notification"));
        assert!(!line.ends_with('\n'));
    }

    #[tokio::test]
    async fn connection_channel_reports_closed_receiver() {
        let (channel, rx) = ConnectionChannel::new();
        drop(rx);
        assert!(!channel.is_connected());
        assert!(matches!(
            channel.send(&Outbound::info("lost")),
            Err(ChannelError::Closed)
        ));
    }

    #[tokio::test]
    async fn full_connection_queue_drops_instead_of_growing() {
        let (channel, mut rx) = ConnectionChannel::with_capacity(4);
        for i in 0..10 {
            channel.send(&Outbound::info(format!("event {i}"))).unwrap();
        }
        assert!(channel.is_connected());

        let mut queued = Vec::new();
        while let Ok(line) = rx.try_recv() {
            queued.push(line);
        }
        assert_eq!(queued.len(), 4);
        assert!(queued[0].contains("event 0"));
        assert!(queued[3].contains("event 3"));

        // Room again once the reader catches up.
        channel.send(&Outbound::info("later")).unwrap();
        assert!(rx.recv().await.unwrap().contains("later"));
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let channel = BroadcastChannel::new(8);
        assert!(!channel.is_connected());
        assert!(channel.send(&Outbound::info("nobody")).is_err());

        let mut a = channel.subscribe();
        let mut b = channel.subscribe();
        assert_eq!(channel.subscriber_count(), 2);
        channel.send(&Outbound::error("boom")).unwrap();
        assert_eq!(a.recv().await.unwrap(), b.recv().await.unwrap());

        drop(a);
        drop(b);
        assert!(!channel.is_connected());
    }
}

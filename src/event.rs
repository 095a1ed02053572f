//! Events delivered from the connection to the dispatcher.
//!
//! [`SpyWordConnection`](crate::client::SpyWordConnection) turns transport
//! frames into [`ConnectionEvent`]s and pushes them into a bounded channel.
//! The receiving half is a [`Subscription`], which has exactly one consumer.

use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::{PlayerId, ServerMessage};

/// Something that happened on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The transport is up. Always the first event.
    Connected {
        /// Id the server knows this client by, if the transport can tell.
        connection_id: Option<PlayerId>,
    },
    /// A decoded server event.
    Server(ServerMessage),
    /// The transport is gone. Always the last event.
    Disconnected {
        /// `None` when the server closed the connection cleanly.
        reason: Option<String>,
    },
}

impl ConnectionEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Server(msg) => msg.name(),
            Self::Disconnected { .. } => "disconnected",
        }
    }
}

impl From<ServerMessage> for ConnectionEvent {
    fn from(msg: ServerMessage) -> Self {
        Self::Server(msg)
    }
}

/// Receiving end of a connection's event stream.
///
/// Dropping or [releasing](Self::release) a subscription closes the channel,
/// so the sender sees the consumer is gone and stops delivering.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<ConnectionEvent>,
}

impl Subscription {
    /// Creates a bounded event channel. `capacity` is clamped to at least 1.
    pub fn channel(capacity: usize) -> (mpsc::Sender<ConnectionEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }

    /// Waits for the next event. Returns `None` once the sender is gone and
    /// the buffer is empty.
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.rx.recv().await
    }

    /// Returns the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<ConnectionEvent> {
        self.rx.try_recv().ok()
    }

    /// Closes the channel and discards anything still buffered.
    pub fn release(mut self) {
        self.rx.close();
        let mut discarded = 0usize;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        debug!(discarded, "subscription released");
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (tx, mut sub) = Subscription::channel(4);
        tx.send(ConnectionEvent::Connected {
            connection_id: None,
        })
        .await
        .unwrap();
        tx.send(
            ServerMessage::TimerTick {
                remaining_seconds: 9,
            }
            .into(),
        )
        .await
        .unwrap();
        drop(tx);

        assert_eq!(sub.recv().await.unwrap().name(), "connected");
        assert_eq!(sub.recv().await.unwrap().name(), "timerTick");
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn release_closes_sender_side() {
        let (tx, sub) = Subscription::channel(4);
        tx.send(ConnectionEvent::Disconnected { reason: None })
            .await
            .unwrap();
        sub.release();
        assert!(tx.is_closed());
        assert!(tx
            .try_send(ConnectionEvent::Disconnected { reason: None })
            .is_err());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (tx, mut sub) = Subscription::channel(0);
        tx.try_send(ConnectionEvent::Connected {
            connection_id: Some("s1".into()),
        })
        .unwrap();
        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_none());
    }
}

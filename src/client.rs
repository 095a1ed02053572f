//! Async connection to the SpyWord game server.
//!
//! [`SpyWordConnection`] is a thin handle around a background transport loop.
//! Outbound intents travel to the loop over an unbounded channel; inbound
//! frames are decoded into [`ServerMessage`]s and delivered as
//! [`ConnectionEvent`]s on the [`Subscription`] returned from
//! [`SpyWordConnection::start`]. The loop never touches session state.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = SpyWordConfig::new();
//! let (connection, subscription) = SpyWordConnection::start(transport, &config);
//!
//! let mut dispatcher = Dispatcher::new(connection.sender(), SoundEngine::silent(), &config);
//! dispatcher.attach(subscription)?;
//! dispatcher.set_username("Ana");
//! dispatcher.create_room()?;
//! dispatcher.run().await;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::config::SpyWordConfig;
use crate::dispatcher::IntentSink;
use crate::error::{Result, SpyWordError};
use crate::event::{ConnectionEvent, Subscription};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::Transport;

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the handle, its senders and the transport loop.
struct ConnectionState {
    connected: AtomicBool,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
        }
    }
}

// ── Intent sender ───────────────────────────────────────────────────

/// Cloneable handle that queues intents on a connection.
///
/// Hand one to a [`Dispatcher`](crate::dispatcher::Dispatcher) while the
/// [`SpyWordConnection`] itself stays with whoever shuts it down.
#[derive(Clone)]
pub struct IntentSender {
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    state: Arc<ConnectionState>,
}

impl IntentSender {
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }
}

impl IntentSink for IntentSender {
    /// Queues `msg` for the transport loop. Returns once it is queued.
    fn emit(&self, msg: ClientMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(SpyWordError::NotConnected);
        }
        self.cmd_tx
            .send(msg)
            .map_err(|_| SpyWordError::NotConnected)
    }
}

impl std::fmt::Debug for IntentSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentSender")
            .field("connected", &self.is_connected())
            .finish()
    }
}

// ── Connection handle ───────────────────────────────────────────────

/// Handle to a running connection.
///
/// Created via [`SpyWordConnection::start`], which spawns the transport loop
/// and returns this handle together with the event [`Subscription`].
pub struct SpyWordConnection {
    sender: IntentSender,
    /// Handle to the background transport loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Signals the transport loop to shut down gracefully.
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl SpyWordConnection {
    /// Starts the transport loop on a connected transport.
    ///
    /// The first event on the subscription is always
    /// [`Connected`](ConnectionEvent::Connected), carrying the transport's
    /// connection id or, failing that, the one in `config`. The last is
    /// always [`Disconnected`](ConnectionEvent::Disconnected).
    #[must_use = "the subscription must be attached to receive events"]
    pub fn start(transport: impl Transport, config: &SpyWordConfig) -> (Self, Subscription) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (event_tx, subscription) = Subscription::channel(config.event_channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let connection_id = transport
            .connection_id()
            .or_else(|| config.connection_id.clone());
        let state = Arc::new(ConnectionState::new());

        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            event_tx,
            Arc::clone(&state),
            shutdown_rx,
            connection_id,
        ));

        let connection = Self {
            sender: IntentSender { cmd_tx, state },
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (connection, subscription)
    }

    /// Connects a [`WebSocketTransport`](crate::WebSocketTransport) to
    /// `server` and starts the transport loop on it.
    ///
    /// # Errors
    ///
    /// Any error [`WebSocketTransport::connect`](crate::WebSocketTransport::connect)
    /// returns.
    #[cfg(feature = "transport-websocket")]
    pub async fn connect(server: &str, config: &SpyWordConfig) -> Result<(Self, Subscription)> {
        let transport = crate::transports::WebSocketTransport::connect(server).await?;
        Ok(Self::start(transport, config))
    }

    /// Returns a cloneable sender for outbound intents.
    pub fn sender(&self) -> IntentSender {
        self.sender.clone()
    }

    /// Queues one intent.
    ///
    /// # Errors
    ///
    /// Returns [`SpyWordError::NotConnected`] if the transport has closed.
    pub fn send(&self, msg: ClientMessage) -> Result<()> {
        self.sender.emit(msg)
    }

    /// Closes the transport and stops the background task.
    ///
    /// The subscription yields a final `Disconnected` and then ends.
    pub async fn shutdown(&mut self) {
        debug!("SpyWordConnection: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // A loop that does not exit in time is aborted so it cannot detach.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.sender.state.connected.store(false, Ordering::Release);
    }

    /// Returns `true` while the transport is believed to be open.
    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }
}

impl IntentSink for SpyWordConnection {
    fn emit(&self, msg: ClientMessage) -> Result<()> {
        self.sender.emit(msg)
    }
}

impl std::fmt::Debug for SpyWordConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpyWordConnection")
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for SpyWordConnection {
    fn drop(&mut self) {
        // No executor here to drive an async close, so just abort the loop.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Multiplexes outbound intents, the shutdown signal and inbound frames.
///
/// Exits when the command channel closes, the shutdown signal fires, the
/// transport reports a close, or a transport error occurs.
async fn transport_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    state: Arc<ConnectionState>,
    mut shutdown_rx: oneshot::Receiver<()>,
    connection_id: Option<String>,
) {
    debug!(?connection_id, "transport loop started");

    emit_event(&event_tx, ConnectionEvent::Connected { connection_id }).await;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(msg) => {
                        debug!(intent = msg.name(), "sending intent");
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    emit_disconnected(
                                        &event_tx,
                                        &state,
                                        Some(format!("transport send error: {e}")),
                                    ).await;
                                    break;
                                }
                            }
                            Err(e) => {
                                error!(intent = msg.name(), "failed to serialize intent: {e}");
                            }
                        }
                    }
                    // Every sender is gone.
                    None => {
                        debug!("command channel closed, shutting down transport loop");
                        let _ = transport.close().await;
                        emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                break;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(msg) => emit_event(&event_tx, ConnectionEvent::Server(msg)).await,
                        Err(e) => warn!("dropping undecodable server event: {e} (raw: {text})"),
                    },
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &state,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    None => {
                        debug!("transport closed by server");
                        emit_disconnected(&event_tx, &state, None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

/// Delivers an event without blocking the loop. A full channel drops the
/// event with a warning.
async fn emit_event(event_tx: &mpsc::Sender<ConnectionEvent>, event: ConnectionEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(event = dropped.name(), "event channel full, dropping event");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, subscription released");
        }
    }
}

/// Marks the connection closed and delivers `Disconnected`.
///
/// Waits for channel space: `Disconnected` is the last event and is never
/// dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<ConnectionEvent>,
    state: &ConnectionState,
    reason: Option<String>,
) {
    state.connected.store(false, Ordering::Release);
    if event_tx
        .send(ConnectionEvent::Disconnected { reason })
        .await
        .is_err()
    {
        debug!("event channel closed, subscription released");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EVENT_CHANNEL_CAPACITY;
    use crate::protocol::{Ballot, Phase};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    type Frame = Option<std::result::Result<String, SpyWordError>>;

    // ── Mock transport ──────────────────────────────────────────────

    /// Records sent frames and replays scripted incoming ones.
    struct MockTransport {
        incoming: VecDeque<Frame>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
        connection_id: Option<String>,
    }

    impl MockTransport {
        fn new(incoming: Vec<Frame>) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
                connection_id: None,
            };
            (transport, sent, closed)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), SpyWordError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Frame {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                // Script exhausted: stay open until shutdown.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), SpyWordError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }

        fn connection_id(&self) -> Option<String> {
            self.connection_id.clone()
        }
    }

    fn frame(msg: &ServerMessage) -> Frame {
        Some(Ok(serde_json::to_string(msg).unwrap()))
    }

    fn tick(seconds: i32) -> ServerMessage {
        ServerMessage::TimerTick {
            remaining_seconds: seconds,
        }
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn connected_is_first_event_and_carries_transport_id() {
        let (mut transport, _sent, _closed) = MockTransport::new(vec![]);
        transport.connection_id = Some("sock-1".into());
        let config = SpyWordConfig::new().with_connection_id("ignored");
        let (mut connection, mut events) = SpyWordConnection::start(transport, &config);

        let first = events.recv().await.unwrap();
        assert_eq!(
            first,
            ConnectionEvent::Connected {
                connection_id: Some("sock-1".into())
            }
        );

        connection.shutdown().await;
    }

    #[tokio::test]
    async fn config_id_is_used_when_transport_has_none() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let config = SpyWordConfig::new().with_connection_id("cfg-7");
        let (mut connection, mut events) = SpyWordConnection::start(transport, &config);

        let first = events.recv().await.unwrap();
        assert_eq!(
            first,
            ConnectionEvent::Connected {
                connection_id: Some("cfg-7".into())
            }
        );

        connection.shutdown().await;
    }

    #[tokio::test]
    async fn inbound_frames_are_decoded_in_order() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            frame(&ServerMessage::RoomCreated {
                room_id: "AB12".into(),
            }),
            frame(&tick(30)),
        ]);
        let (mut connection, mut events) =
            SpyWordConnection::start(transport, &SpyWordConfig::new());

        let _ = events.recv().await; // Connected
        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::Server(ServerMessage::RoomCreated {
                room_id: "AB12".into()
            })
        );
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Server(tick(30)));

        connection.shutdown().await;
    }

    #[tokio::test]
    async fn undecodable_frames_are_skipped() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok("{ not json".into())),
            Some(Ok(r#"{"event":"fireworks","data":{}}"#.into())),
            Some(Ok(r#"{"event":"voteUpdate","data":{"votesCast":1}}"#.into())),
            frame(&tick(12)),
        ]);
        let (mut connection, mut events) =
            SpyWordConnection::start(transport, &SpyWordConfig::new());

        let _ = events.recv().await; // Connected
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Server(tick(12)));

        connection.shutdown().await;
    }

    #[tokio::test]
    async fn intents_are_serialized_as_envelopes() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut connection, mut events) =
            SpyWordConnection::start(transport, &SpyWordConfig::new());
        let _ = events.recv().await; // Connected

        connection
            .send(ClientMessage::Vote {
                room_id: "AB12".into(),
                suspect_id: Ballot::Skip,
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            assert_eq!(messages.len(), 1);
            let value: serde_json::Value = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(
                value,
                serde_json::json!({
                    "event": "vote",
                    "data": { "roomId": "AB12", "suspectId": "SKIP" }
                })
            );
        }

        connection.shutdown().await;
    }

    #[tokio::test]
    async fn cloned_sender_shares_the_connection() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut connection, mut events) =
            SpyWordConnection::start(transport, &SpyWordConfig::new());
        let _ = events.recv().await; // Connected

        let sender = connection.sender();
        sender
            .emit(ClientMessage::StartGame {
                room_id: "AB12".into(),
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sent.lock().unwrap().len(), 1);

        connection.shutdown().await;
        assert!(matches!(
            sender.emit(ClientMessage::StartGame {
                room_id: "AB12".into()
            }),
            Err(SpyWordError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn disconnected_on_transport_close() {
        let (transport, _sent, _closed) = MockTransport::new(vec![None]);
        let (mut connection, mut events) =
            SpyWordConnection::start(transport, &SpyWordConfig::new());

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        assert_eq!(event, ConnectionEvent::Disconnected { reason: None });
        assert!(!connection.is_connected());

        connection.shutdown().await;
    }

    #[tokio::test]
    async fn transport_recv_error_emits_disconnected() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Err(
            SpyWordError::TransportReceive("boom".into()),
        ))]);
        let (mut connection, mut events) =
            SpyWordConnection::start(transport, &SpyWordConfig::new());

        let _ = events.recv().await; // Connected
        match events.recv().await.unwrap() {
            ConnectionEvent::Disconnected { reason } => {
                assert!(reason.unwrap().contains("boom"));
            }
            other => panic!("expected Disconnected, got {other:?}"),
        }

        connection.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_emits_disconnected_and_closes_transport() {
        let (transport, _sent, closed) = MockTransport::new(vec![]);
        let (mut connection, mut events) =
            SpyWordConnection::start(transport, &SpyWordConfig::new());
        let _ = events.recv().await; // Connected

        connection.shutdown().await;

        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::Disconnected {
                reason: Some("client shut down".into())
            }
        );
        assert!(events.recv().await.is_none());
        assert!(closed.load(Ordering::Relaxed));
        assert!(matches!(
            connection.send(ClientMessage::StartGame {
                room_id: "AB12".into()
            }),
            Err(SpyWordError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut connection, _events) = SpyWordConnection::start(transport, &SpyWordConfig::new());
        connection.shutdown().await;
        connection.shutdown().await;
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (connection, mut events) = SpyWordConnection::start(transport, &SpyWordConfig::new());
        let _ = events.recv().await; // Connected

        drop(connection);

        // The aborted loop drops its sender, so the subscription ends.
        while let Some(_event) = events.recv().await {}
    }

    #[tokio::test]
    async fn small_event_channel_drops_but_always_disconnects() {
        let mut incoming: Vec<Frame> = (0..20).map(|s| frame(&tick(s))).collect();
        incoming.push(None);
        let (transport, _sent, _closed) = MockTransport::new(incoming);

        let config = SpyWordConfig::new().with_event_channel_capacity(1);
        let (mut connection, mut events) = SpyWordConnection::start(transport, &config);

        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut received = Vec::new();
        while let Some(event) = events.recv().await {
            received.push(event);
        }
        // 1 Connected + 20 ticks + 1 Disconnected could have been delivered.
        assert!(received.len() >= 2, "got {}", received.len());
        assert!(received.len() < 22, "expected drops, got {}", received.len());
        assert_eq!(
            received.last(),
            Some(&ConnectionEvent::Disconnected { reason: None })
        );

        connection.shutdown().await;
    }

    #[tokio::test]
    async fn backpressure_does_not_block_the_loop() {
        let mut incoming: Vec<Frame> = (0..DEFAULT_EVENT_CHANNEL_CAPACITY + 50)
            .map(|_| frame(&tick(9)))
            .collect();
        incoming.push(None);
        let (transport, _sent, _closed) = MockTransport::new(incoming);
        let (mut connection, mut events) =
            SpyWordConnection::start(transport, &SpyWordConfig::new());

        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut count = 0;
        while let Some(_event) = events.recv().await {
            count += 1;
        }
        assert!(count > 0);

        connection.shutdown().await;
    }

    /// Hangs forever in `close()` so the shutdown abort path runs.
    struct HangingCloseTransport {
        close_called: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
    }

    impl Drop for HangingCloseTransport {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::Release);
        }
    }

    #[async_trait]
    impl Transport for HangingCloseTransport {
        async fn send(&mut self, _message: String) -> std::result::Result<(), SpyWordError> {
            Ok(())
        }

        async fn recv(&mut self) -> Frame {
            std::future::pending().await
        }

        async fn close(&mut self) -> std::result::Result<(), SpyWordError> {
            self.close_called.store(true, Ordering::Release);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_timeout_aborts_stuck_transport_task() {
        let close_called = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = HangingCloseTransport {
            close_called: Arc::clone(&close_called),
            dropped: Arc::clone(&dropped),
        };
        let config = SpyWordConfig::new().with_shutdown_timeout(Duration::from_millis(20));
        let (mut connection, mut events) = SpyWordConnection::start(transport, &config);
        let _ = events.recv().await; // Connected

        connection.shutdown().await;

        assert!(close_called.load(Ordering::Acquire));
        assert!(dropped.load(Ordering::Acquire));
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn debug_impl_reports_state() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut connection, _events) = SpyWordConnection::start(transport, &SpyWordConfig::new());
        let debug_str = format!("{connection:?}");
        assert!(debug_str.contains("SpyWordConnection"));
        assert!(debug_str.contains("connected"));
        connection.shutdown().await;
    }

    #[tokio::test]
    async fn phase_payload_survives_the_loop() {
        let (transport, _sent, _closed) = MockTransport::new(vec![frame(
            &ServerMessage::PhaseChange {
                phase_name: Phase::Voting,
            },
        )]);
        let (mut connection, mut events) =
            SpyWordConnection::start(transport, &SpyWordConfig::new());
        let _ = events.recv().await; // Connected
        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::Server(ServerMessage::PhaseChange {
                phase_name: Phase::Voting
            })
        );
        connection.shutdown().await;
    }
}

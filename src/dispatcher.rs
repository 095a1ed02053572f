//! Routes connection events into the state machine, one at a time.
//!
//! A [`Dispatcher`] is the single writer of session state. Inbound events
//! come from a [`Subscription`] (or are fed directly with
//! [`dispatch`](Dispatcher::dispatch)); local player actions come from the
//! intent methods. Every call takes `&mut self` and runs to completion, so
//! two handlers never interleave.
//!
//! # Example
//!
//! ```
//! use spyword_client::config::SpyWordConfig;
//! use spyword_client::dispatcher::{Dispatcher, IntentSink};
//! use spyword_client::protocol::{ClientMessage, Phase};
//! use spyword_client::sound::SoundEngine;
//!
//! struct Discard;
//!
//! impl IntentSink for Discard {
//!     fn emit(&self, _msg: ClientMessage) -> spyword_client::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let mut dispatcher = Dispatcher::new(Discard, SoundEngine::silent(), &SpyWordConfig::new());
//! dispatcher.dispatch_json(r#"{"event":"roomCreated","data":{"roomId":"AB12"}}"#);
//! assert_eq!(dispatcher.phase(), Phase::Lobby);
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bootstrap;
use crate::config::SpyWordConfig;
use crate::error::{Result, SpyWordError};
use crate::event::{ConnectionEvent, Subscription};
use crate::phase::{PhaseStateMachine, Session};
use crate::protocol::{ClientMessage, Phase, PlayerId, ServerMessage};
use crate::sound::{Cue, SoundEngine};

/// Where outbound intents go.
///
/// Implemented by [`IntentSender`](crate::client::IntentSender) for a live
/// connection, and by recorders in tests.
pub trait IntentSink {
    /// Hands one intent to the connection.
    ///
    /// # Errors
    ///
    /// Returns [`SpyWordError::NotConnected`] when nothing can be sent.
    fn emit(&self, msg: ClientMessage) -> Result<()>;
}

impl<T: IntentSink + ?Sized> IntentSink for &T {
    fn emit(&self, msg: ClientMessage) -> Result<()> {
        (**self).emit(msg)
    }
}

impl<T: IntentSink + ?Sized> IntentSink for Arc<T> {
    fn emit(&self, msg: ClientMessage) -> Result<()> {
        (**self).emit(msg)
    }
}

/// Owns the session and applies events and intents to it.
#[derive(Debug)]
pub struct Dispatcher<S> {
    machine: PhaseStateMachine,
    sound: SoundEngine,
    sink: S,
    subscription: Option<Subscription>,
    torn_down: bool,
    connected: bool,
    fallback_connection_id: Option<PlayerId>,
}

impl<S: IntentSink> Dispatcher<S> {
    pub fn new(sink: S, mut sound: SoundEngine, config: &SpyWordConfig) -> Self {
        let mut machine = PhaseStateMachine::new(config.round_seconds, config.min_players);
        machine.set_self_id(config.connection_id.clone());
        sound.set_muted(config.muted);
        Self {
            machine,
            sound,
            sink,
            subscription: None,
            torn_down: false,
            connected: false,
            fallback_connection_id: config.connection_id.clone(),
        }
    }

    // ── Subscription ────────────────────────────────────────────────

    /// Takes ownership of the event source.
    ///
    /// # Errors
    ///
    /// Returns [`SpyWordError::AlreadySubscribed`] if a subscription is
    /// already attached. The new one is released.
    pub fn attach(&mut self, subscription: Subscription) -> Result<()> {
        if self.subscription.is_some() {
            subscription.release();
            return Err(SpyWordError::AlreadySubscribed);
        }
        self.subscription = Some(subscription);
        self.torn_down = false;
        debug!("dispatcher attached");
        Ok(())
    }

    /// Releases the subscription and stops applying events.
    ///
    /// Events buffered but not yet handled are discarded. A new
    /// subscription may be attached afterwards.
    pub fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
        self.torn_down = true;
        self.connected = false;
        debug!("dispatcher torn down");
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Handles events until the subscription ends.
    ///
    /// Returns the number of events handled.
    pub async fn run(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.next_event().await {
            self.handle(event);
            handled += 1;
        }
        self.subscription = None;
        handled
    }

    async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.subscription.as_mut()?.recv().await
    }

    /// Handles every event already buffered, without waiting.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_recv) {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    // ── Inbound ─────────────────────────────────────────────────────

    /// Applies one connection event. Returns `true` if state changed.
    pub fn handle(&mut self, event: ConnectionEvent) -> bool {
        if self.torn_down {
            debug!(event = event.name(), "dispatcher torn down, event dropped");
            return false;
        }
        match event {
            ConnectionEvent::Connected { connection_id } => {
                let id = connection_id.or_else(|| self.fallback_connection_id.clone());
                info!(connection_id = ?id, "connected");
                self.machine.set_self_id(id);
                self.connected = true;
                true
            }
            ConnectionEvent::Server(msg) => self.dispatch(msg),
            ConnectionEvent::Disconnected { reason } => {
                match &reason {
                    Some(reason) => warn!(%reason, "disconnected"),
                    None => info!("disconnected by server"),
                }
                self.connected = false;
                true
            }
        }
    }

    /// Applies one server event and plays the cues it triggers.
    ///
    /// Returns `false` if the event was ignored in the current phase.
    pub fn dispatch(&mut self, msg: ServerMessage) -> bool {
        if self.torn_down {
            debug!(event = msg.name(), "dispatcher torn down, event dropped");
            return false;
        }
        let name = msg.name();
        let outcome = self.machine.apply(msg);
        debug!(
            event = name,
            applied = outcome.applied,
            phase = %self.machine.phase(),
            "event dispatched"
        );
        for cue in outcome.cues {
            self.sound.play(cue);
        }
        outcome.applied
    }

    /// Decodes and applies one raw frame.
    ///
    /// Frames with an unknown event name or a malformed payload are logged
    /// and dropped.
    pub fn dispatch_json(&mut self, text: &str) -> bool {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(msg) => self.dispatch(msg),
            Err(e) => {
                warn!(error = %e, raw = text, "dropping undecodable server event");
                false
            }
        }
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Asks the server for a new room.
    ///
    /// # Errors
    ///
    /// [`SpyWordError::Validation`] if the name is missing or the client is
    /// not on the login screen; otherwise whatever the sink returns.
    pub fn create_room(&mut self) -> Result<()> {
        let msg = self.machine.create_room_intent()?;
        self.emit(msg, Cue::Click)
    }

    /// Joins the room typed into the join field.
    ///
    /// The phase does not change until the server answers.
    ///
    /// # Errors
    ///
    /// [`SpyWordError::Validation`] if the name or room code is missing.
    pub fn join_room(&mut self) -> Result<()> {
        let msg = self.machine.join_room_intent()?;
        self.emit(msg, Cue::Click)
    }

    /// Host only: starts the game.
    ///
    /// # Errors
    ///
    /// [`SpyWordError::Validation`] if this client is not the host or the
    /// room is too small.
    pub fn start_game(&mut self) -> Result<()> {
        let msg = self.machine.start_game_intent()?;
        self.emit(msg, Cue::Click)
    }

    /// Submits this turn's description.
    ///
    /// # Errors
    ///
    /// [`SpyWordError::Validation`] if the word is blank or it is not this
    /// client's turn.
    pub fn submit_word(&mut self, word: &str) -> Result<()> {
        let msg = self.machine.submit_word_intent(word)?;
        self.emit(msg, Cue::WordSent)
    }

    /// Votes against `target`. Returns `Ok(false)` if no vote was sent
    /// because voting is closed or this round's vote is already cast.
    ///
    /// A vote that the sink fails to send is still consumed.
    ///
    /// # Errors
    ///
    /// Whatever the sink returns.
    pub fn cast_vote(&mut self, target: impl Into<PlayerId>) -> Result<bool> {
        match self.machine.cast_vote(target) {
            Some(msg) => self.emit(msg, Cue::Click).map(|()| true),
            None => Ok(false),
        }
    }

    /// Abstains from this round's vote. Same rules as
    /// [`cast_vote`](Self::cast_vote).
    ///
    /// # Errors
    ///
    /// Whatever the sink returns.
    pub fn cast_skip(&mut self) -> Result<bool> {
        match self.machine.cast_skip() {
            Some(msg) => self.emit(msg, Cue::Click).map(|()| true),
            None => Ok(false),
        }
    }

    fn emit(&mut self, msg: ClientMessage, cue: Cue) -> Result<()> {
        let name = msg.name();
        self.sink.emit(msg)?;
        debug!(intent = name, "intent emitted");
        self.sound.play(cue);
        Ok(())
    }

    // ── Local input ─────────────────────────────────────────────────

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.machine.set_username(username);
    }

    pub fn set_avatar(&mut self, avatar: impl Into<String>) {
        self.machine.set_avatar(avatar);
    }

    /// Sets the join field. Returns `false` outside LOGIN.
    pub fn set_room_code(&mut self, code: &str) -> bool {
        self.machine.set_room_code(code)
    }

    /// Pre-fills the join field from the page location's `room` parameter.
    ///
    /// Accepts a full URL or a bare query string. Returns `true` if a code
    /// was found and applied, which only happens in LOGIN. Nothing is sent.
    pub fn bootstrap(&mut self, location: &str) -> bool {
        if self.machine.phase() != Phase::Login {
            debug!(phase = %self.machine.phase(), "location ignored outside login");
            return false;
        }
        match bootstrap::room_code(location) {
            Some(code) => {
                debug!(%code, "room code pre-filled from location");
                self.machine.set_room_code(&code)
            }
            None => false,
        }
    }

    pub fn reveal_word(&mut self) -> bool {
        self.machine.reveal_word()
    }

    pub fn dismiss_notice(&mut self) {
        self.machine.dismiss_notice();
    }

    /// Returns the session to the login screen, as a page reload would.
    pub fn reset(&mut self) {
        self.machine.reset();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.sound.set_muted(muted);
    }

    /// Flips the mute flag and returns the new value.
    pub fn toggle_muted(&mut self) -> bool {
        let muted = !self.sound.is_muted();
        self.sound.set_muted(muted);
        muted
    }

    // ── Views ───────────────────────────────────────────────────────

    pub fn machine(&self) -> &PhaseStateMachine {
        &self.machine
    }

    pub fn session(&self) -> &Session {
        self.machine.session()
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn is_muted(&self) -> bool {
        self.sound.is_muted()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

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
    use crate::error::ValidationError;
    use crate::protocol::{Ballot, GameState, Player, RoomSnapshot};
    use crate::sound::RenderBackend;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: StdMutex<Vec<ClientMessage>>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<ClientMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl IntentSink for RecordingSink {
        fn emit(&self, msg: ClientMessage) -> Result<()> {
            self.sent.lock().unwrap().push(msg);
            Ok(())
        }
    }

    struct ClosedSink;

    impl IntentSink for ClosedSink {
        fn emit(&self, _msg: ClientMessage) -> Result<()> {
            Err(SpyWordError::NotConnected)
        }
    }

    fn lobby_snapshot() -> RoomSnapshot {
        RoomSnapshot {
            room_id: "AB12".into(),
            host_id: "s1".into(),
            game_state: GameState::Lobby,
            players: ["s1", "s2", "s3"]
                .iter()
                .map(|id| Player {
                    id: (*id).into(),
                    username: (*id).into(),
                    avatar: "🐺".into(),
                    is_alive: true,
                    role: None,
                    word: None,
                })
                .collect(),
        }
    }

    fn dispatcher<S: IntentSink>(sink: S) -> Dispatcher<S> {
        let config = SpyWordConfig::new().with_connection_id("s1");
        Dispatcher::new(sink, SoundEngine::silent(), &config)
    }

    fn voting<S: IntentSink>(d: &mut Dispatcher<S>) {
        d.dispatch(ServerMessage::UpdateRoom(lobby_snapshot()));
        d.dispatch(ServerMessage::GameStarted {
            role: "CITIZEN".into(),
            word: Some("Banana".into()),
            category: None,
        });
        d.dispatch(ServerMessage::PhaseChange {
            phase_name: Phase::Voting,
        });
    }

    #[test]
    fn second_attach_is_rejected() {
        let mut d = dispatcher(RecordingSink::default());
        let (_tx1, first) = Subscription::channel(8);
        let (tx2, second) = Subscription::channel(8);
        d.attach(first).unwrap();
        assert!(matches!(
            d.attach(second),
            Err(SpyWordError::AlreadySubscribed)
        ));
        assert!(tx2.is_closed());
    }

    #[test]
    fn teardown_releases_and_silences_dispatch() {
        let mut d = dispatcher(RecordingSink::default());
        let (tx, sub) = Subscription::channel(8);
        d.attach(sub).unwrap();
        d.teardown();
        assert!(tx.is_closed());
        assert!(!d.is_attached());
        assert!(!d.dispatch(ServerMessage::RoomCreated {
            room_id: "AB12".into()
        }));
        assert_eq!(d.phase(), Phase::Login);

        let (_tx, sub) = Subscription::channel(8);
        d.attach(sub).unwrap();
        assert!(d.dispatch(ServerMessage::RoomCreated {
            room_id: "AB12".into()
        }));
    }

    #[test]
    fn pump_handles_buffered_events_in_order() {
        let mut d = dispatcher(RecordingSink::default());
        let (tx, sub) = Subscription::channel(8);
        d.attach(sub).unwrap();
        tx.try_send(ConnectionEvent::Connected {
            connection_id: Some("sock-9".into()),
        })
        .unwrap();
        tx.try_send(
            ServerMessage::RoomCreated {
                room_id: "ZX81".into(),
            }
            .into(),
        )
        .unwrap();
        assert_eq!(d.pump(), 2);
        assert!(d.is_connected());
        assert_eq!(d.session().self_id.as_deref(), Some("sock-9"));
        assert_eq!(d.session().room_id, "ZX81");
    }

    #[test]
    fn connected_without_id_falls_back_to_config() {
        let mut d = dispatcher(RecordingSink::default());
        d.handle(ConnectionEvent::Connected {
            connection_id: None,
        });
        assert_eq!(d.session().self_id.as_deref(), Some("s1"));
        d.handle(ConnectionEvent::Disconnected {
            reason: Some("reset by peer".into()),
        });
        assert!(!d.is_connected());
    }

    #[test]
    fn malformed_and_unknown_frames_are_dropped() {
        let mut d = dispatcher(RecordingSink::default());
        assert!(!d.dispatch_json("not json"));
        assert!(!d.dispatch_json(r#"{"event":"confetti","data":{}}"#));
        assert!(!d.dispatch_json(r#"{"event":"timerTick","data":{}}"#));
        assert_eq!(d.phase(), Phase::Login);
        assert!(d.dispatch_json(r#"{"event":"roomCreated","data":{"roomId":"AB12"}}"#));
    }

    #[test]
    fn validation_errors_send_nothing() {
        let mut d = dispatcher(RecordingSink::default());
        let err = d.join_room().unwrap_err();
        assert!(matches!(
            err,
            SpyWordError::Validation(ValidationError::MissingUsername)
        ));
        d.set_username("Ana");
        let err = d.join_room().unwrap_err();
        assert!(matches!(
            err,
            SpyWordError::Validation(ValidationError::MissingRoomCode)
        ));
        assert!(d.sink().sent().is_empty());
    }

    #[test]
    fn join_does_not_change_phase_before_server_reply() {
        let mut d = dispatcher(RecordingSink::default());
        d.set_username("Ana");
        d.set_room_code("ab12");
        d.join_room().unwrap();
        assert_eq!(d.phase(), Phase::Login);
        assert_eq!(
            d.sink().sent(),
            vec![ClientMessage::JoinRoom {
                room_id: "AB12".into(),
                username: "Ana".into(),
                avatar: "🐺".into(),
            }]
        );
    }

    #[test]
    fn double_vote_emits_once() {
        let mut d = dispatcher(RecordingSink::default());
        voting(&mut d);
        assert!(d.cast_vote("s2").unwrap());
        assert!(!d.cast_vote("s3").unwrap());
        assert!(!d.cast_skip().unwrap());
        assert_eq!(
            d.sink().sent(),
            vec![ClientMessage::Vote {
                room_id: "AB12".into(),
                suspect_id: Ballot::Suspect("s2".into()),
            }]
        );
    }

    #[test]
    fn failed_send_still_consumes_vote() {
        let mut d = dispatcher(ClosedSink);
        voting(&mut d);
        assert!(matches!(d.cast_skip(), Err(SpyWordError::NotConnected)));
        assert!(d.machine().has_voted());
        assert!(!d.cast_skip().unwrap());
    }

    #[test]
    fn cues_reach_the_backend_unless_muted() {
        let mix = RenderBackend::new(8_000);
        let handle = mix.clone();
        let mut d = Dispatcher::new(
            RecordingSink::default(),
            SoundEngine::with_backend(mix),
            &SpyWordConfig::new().with_connection_id("s1"),
        );
        d.dispatch(ServerMessage::UpdateRoom(lobby_snapshot()));
        d.dispatch(ServerMessage::GameStarted {
            role: "CITIZEN".into(),
            word: None,
            category: None,
        });
        let after_start = handle.tone_count();
        assert_eq!(after_start, Cue::GameStart.program().tones.len());

        assert!(d.toggle_muted());
        d.dispatch(ServerMessage::TimerTick {
            remaining_seconds: 3,
        });
        assert_eq!(handle.tone_count(), after_start);
    }

    #[test]
    fn audio_survives_teardown_and_reattach() {
        let mix = RenderBackend::new(8_000);
        let handle = mix.clone();
        let mut d = Dispatcher::new(
            RecordingSink::default(),
            SoundEngine::with_backend(mix),
            &SpyWordConfig::new().with_connection_id("s1"),
        );
        let (_tx, sub) = Subscription::channel(8);
        d.attach(sub).unwrap();
        d.teardown();
        let (_tx, sub) = Subscription::channel(8);
        d.attach(sub).unwrap();

        d.dispatch(ServerMessage::UpdateRoom(lobby_snapshot()));
        d.dispatch(ServerMessage::GameStarted {
            role: "CITIZEN".into(),
            word: None,
            category: None,
        });
        assert_eq!(handle.tone_count(), Cue::GameStart.program().tones.len());
        assert!(!handle.is_closed());
    }

    #[test]
    fn bootstrap_prefills_join_field_without_sending() {
        let mut d = dispatcher(RecordingSink::default());
        assert!(d.bootstrap("https://spyword.example/play?room=ab12"));
        assert_eq!(d.session().room_id, "AB12");
        assert!(d.sink().sent().is_empty());
        assert!(!d.bootstrap("https://spyword.example/play"));
    }

    #[test]
    fn bootstrap_mid_game_keeps_vote_in_current_room() {
        let mut d = dispatcher(RecordingSink::default());
        voting(&mut d);
        assert!(!d.bootstrap("https://spyword.example/play?room=zz99"));
        assert!(!d.set_room_code("zz99"));
        assert_eq!(d.session().room_id, "AB12");

        assert!(d.cast_vote("s2").unwrap());
        assert_eq!(
            d.sink().sent(),
            vec![ClientMessage::Vote {
                room_id: "AB12".into(),
                suspect_id: Ballot::Suspect("s2".into()),
            }]
        );
    }

    #[tokio::test]
    async fn run_drains_until_sender_drops() {
        let mut d = dispatcher(RecordingSink::default());
        let (tx, sub) = Subscription::channel(8);
        d.attach(sub).unwrap();
        tx.send(ServerMessage::RoomCreated {
            room_id: "AB12".into(),
        }
        .into())
        .await
        .unwrap();
        tx.send(ConnectionEvent::Disconnected { reason: None })
            .await
            .unwrap();
        drop(tx);

        assert_eq!(d.run().await, 2);
        assert_eq!(d.phase(), Phase::Lobby);
        assert!(!d.is_attached());
    }

    #[test]
    fn run_without_subscription_returns_at_once() {
        let mut d = dispatcher(RecordingSink::default());
        assert_eq!(tokio_test::block_on(d.run()), 0);

        let (tx, sub) = Subscription::channel(1);
        d.attach(sub).unwrap();
        d.teardown();
        assert!(tx.is_closed());
        assert_eq!(tokio_test::block_on(d.run()), 0);
    }
}

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for SpyWord client integration tests.
//!
//! Provides a scripted [`MockTransport`], a [`RecordingSink`] for intents,
//! and builders for the JSON frames the game server sends.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::json;
use spyword_client::protocol::ClientMessage;
use spyword_client::{IntentSink, SpyWordError, Transport};

// ── MockTransport ───────────────────────────────────────────────────

/// A scripted transport for integration testing.
///
/// Server frames are consumed in order by `recv()`. Everything the client
/// sends is recorded in `sent`.
pub struct MockTransport {
    incoming: VecDeque<Option<Result<String, SpyWordError>>>,
    connection_id: Option<String>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Creates a transport that will replay `incoming`, then stay open.
    pub fn new(
        incoming: Vec<Option<Result<String, SpyWordError>>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            connection_id: None,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }

    /// Reports `id` as the server-assigned connection id.
    pub fn with_connection_id(mut self, id: &str) -> Self {
        self.connection_id = Some(id.to_string());
        self
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), SpyWordError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, SpyWordError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // Out of script: stay open until the client shuts down.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), SpyWordError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn connection_id(&self) -> Option<String> {
        self.connection_id.clone()
    }
}

/// Wraps frames as successful `recv()` results.
pub fn script(frames: Vec<String>) -> Vec<Option<Result<String, SpyWordError>>> {
    frames.into_iter().map(|f| Some(Ok(f))).collect()
}

/// Decodes every recorded outbound frame.
pub fn sent_messages(sent: &Arc<StdMutex<Vec<String>>>) -> Vec<ClientMessage> {
    sent.lock()
        .unwrap()
        .iter()
        .map(|raw| serde_json::from_str(raw).expect("client sent an invalid frame"))
        .collect()
}

// ── RecordingSink ───────────────────────────────────────────────────

/// An [`IntentSink`] that keeps every intent it is given.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    sent: Arc<StdMutex<Vec<ClientMessage>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl IntentSink for RecordingSink {
    fn emit(&self, msg: ClientMessage) -> spyword_client::Result<()> {
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }
}

// ── JSON helpers ────────────────────────────────────────────────────

fn frame(event: &str, data: serde_json::Value) -> String {
    json!({ "event": event, "data": data }).to_string()
}

/// A roster entry: `(id, username)`, alive, with a fixed avatar.
pub fn player_json(id: &str, username: &str) -> serde_json::Value {
    json!({"id": id, "username": username, "avatar": "🐺", "isAlive": true})
}

pub fn update_room_json(room_id: &str, host: &str, state: &str, players: &[(&str, &str)]) -> String {
    let players: Vec<_> = players
        .iter()
        .map(|(id, name)| player_json(id, name))
        .collect();
    frame(
        "updateRoom",
        json!({"roomId": room_id, "host": host, "gameState": state, "players": players}),
    )
}

pub fn room_created_json(room_id: &str) -> String {
    frame("roomCreated", json!({ "roomId": room_id }))
}

pub fn game_started_json(role: &str, word: Option<&str>, category: &str) -> String {
    frame(
        "gameStarted",
        json!({"role": role, "word": word, "category": category}),
    )
}

pub fn turn_update_json(player_id: &str) -> String {
    frame("turnUpdate", json!({ "currentPlayerId": player_id }))
}

pub fn player_action_json(username: &str, action: &str, payload: &str) -> String {
    frame(
        "playerAction",
        json!({"username": username, "action": action, "payload": payload}),
    )
}

pub fn phase_change_json(phase: &str) -> String {
    frame("phaseChange", json!({ "phaseName": phase }))
}

pub fn timer_tick_json(seconds: i32) -> String {
    frame("timerTick", json!({ "remainingSeconds": seconds }))
}

pub fn vote_update_json(votes_cast: u32, total: u32) -> String {
    frame("voteUpdate", json!({"votesCast": votes_cast, "total": total}))
}

pub fn round_result_json(message: &str, role: Option<&str>) -> String {
    frame("roundResult", json!({"message": message, "role": role}))
}

pub fn game_over_json(winner: &str, players: serde_json::Value) -> String {
    frame("gameOver", json!({"winner": winner, "players": players}))
}

pub fn error_json(message: &str) -> String {
    frame("error", json!({ "message": message }))
}

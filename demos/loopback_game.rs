//! # Loopback Game Example
//!
//! Plays one full SpyWord game against a scripted in-process server:
//!
//! 1. Implement [`Transport`] over a pair of channels
//! 2. Run a fake server that answers each intent the way the real one does
//! 3. Drive a [`Dispatcher`] from the connection's events, taking the
//!    player's turn and vote when the session allows it
//! 4. Render every sound cue into an in-memory buffer
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback_game
//! RUST_LOG=spyword_client=debug cargo run --example loopback_game
//! ```

use async_trait::async_trait;
use serde_json::json;
use spyword_client::protocol::{ClientMessage, Phase};
use spyword_client::sound::RenderBackend;
use spyword_client::{
    ConnectionEvent, Dispatcher, SoundEngine, SpyWordConfig, SpyWordConnection, SpyWordError,
    Transport,
};
use tokio::sync::mpsc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const SELF_ID: &str = "you";
const ROOM: &str = "AB12";

// ─────────────────────────────────────────────────────────────────────
// Loopback transport
// ─────────────────────────────────────────────────────────────────────

/// Client half of the loopback. Reports a fixed connection id, as the real
/// server does in its handshake.
struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Server half: read what the client sent, push frames back.
struct LoopbackServer {
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<String>,
}

fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        },
        LoopbackServer {
            rx: server_rx,
            tx: server_tx,
        },
    )
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), SpyWordError> {
        self.tx
            .send(message)
            .map_err(|e| SpyWordError::TransportSend(e.to_string()))
    }

    /// Cancel-safe: `UnboundedReceiver::recv` is.
    async fn recv(&mut self) -> Option<Result<String, SpyWordError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), SpyWordError> {
        Ok(())
    }

    fn connection_id(&self) -> Option<String> {
        Some(SELF_ID.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Scripted server
// ─────────────────────────────────────────────────────────────────────

impl LoopbackServer {
    fn push(&self, event: &str, data: serde_json::Value) -> Result<(), BoxError> {
        self.tx
            .send(json!({ "event": event, "data": data }).to_string())?;
        Ok(())
    }

    /// Answers intents until the game is over, then hangs up.
    async fn serve(mut self) -> Result<(), BoxError> {
        let mut username = String::new();
        while let Some(raw) = self.rx.recv().await {
            let intent: ClientMessage = serde_json::from_str(&raw)?;
            tracing::info!(intent = intent.name(), "server received");

            match intent {
                ClientMessage::CreateRoom {
                    username: name,
                    avatar,
                } => {
                    username = name;
                    self.push("roomCreated", json!({ "roomId": ROOM }))?;
                    self.push(
                        "updateRoom",
                        json!({
                            "roomId": ROOM,
                            "host": SELF_ID,
                            "gameState": "LOBBY",
                            "players": [
                                {"id": SELF_ID, "username": username, "avatar": avatar, "isAlive": true},
                                {"id": "bot1", "username": "Bo", "avatar": "🦊", "isAlive": true},
                                {"id": "bot2", "username": "Cy", "avatar": "🐸", "isAlive": true}
                            ]
                        }),
                    )?;
                }
                ClientMessage::StartGame { .. } => {
                    self.push(
                        "gameStarted",
                        json!({"role": "CITIZEN", "word": "Banana", "category": "Fruits"}),
                    )?;
                    self.push("turnUpdate", json!({ "currentPlayerId": "bot1" }))?;
                    self.push("timerTick", json!({ "remainingSeconds": 12 }))?;
                    self.push(
                        "playerAction",
                        json!({"username": "Bo", "action": "WORD", "payload": "yellow"}),
                    )?;
                    self.push("turnUpdate", json!({ "currentPlayerId": SELF_ID }))?;
                }
                ClientMessage::SubmitWord { word, .. } => {
                    self.push(
                        "playerAction",
                        json!({"username": username, "action": "WORD", "payload": word}),
                    )?;
                    self.push("phaseChange", json!({ "phaseName": "VOTING" }))?;
                }
                ClientMessage::Vote { .. } => {
                    self.push("voteUpdate", json!({"votesCast": 3, "total": 3}))?;
                    self.push(
                        "roundResult",
                        json!({"message": "Cy was voted out", "role": "IMPOSTER"}),
                    )?;
                    self.push(
                        "gameOver",
                        json!({
                            "winner": "Citizens",
                            "players": [
                                {"id": "bot2", "role": "IMPOSTER", "isAlive": false},
                                {"id": "bot1", "role": "CITIZEN", "word": "Banana"}
                            ]
                        }),
                    )?;
                    break;
                }
                ClientMessage::JoinRoom { .. } => {
                    self.push("error", json!({ "message": "Room not found" }))?;
                }
            }
        }
        tracing::info!("server hanging up");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (transport, server) = loopback_pair();
    let server_task = tokio::spawn(server.serve());

    let config = SpyWordConfig::new();
    let (mut connection, mut subscription) = SpyWordConnection::start(transport, &config);

    let render = RenderBackend::new(22_050);
    let mut dispatcher = Dispatcher::new(
        connection.sender(),
        SoundEngine::with_backend(render.clone()),
        &config,
    );

    dispatcher.set_username("Ana");
    dispatcher.create_room()?;

    let mut started = false;
    let mut submitted = false;

    // Events are handled one at a time; after each, act if the session
    // now allows it.
    while let Some(event) = subscription.recv().await {
        let done = matches!(event, ConnectionEvent::Disconnected { .. });
        dispatcher.handle(event);
        if done {
            break;
        }

        let machine = dispatcher.machine();
        match dispatcher.phase() {
            Phase::Lobby if !started && machine.can_start() => {
                started = true;
                dispatcher.start_game()?;
            }
            Phase::Playing if !submitted && machine.is_my_turn() => {
                submitted = true;
                dispatcher.reveal_word();
                dispatcher.submit_word("curved")?;
            }
            Phase::Voting if !machine.has_voted() => {
                let suspect = machine.vote_candidates().last().map(|p| p.id.clone());
                match suspect {
                    Some(id) => dispatcher.cast_vote(id)?,
                    None => dispatcher.cast_skip()?,
                };
            }
            _ => {}
        }
    }

    // ── Results ─────────────────────────────────────────────────────
    let session = dispatcher.session();
    tracing::info!(
        phase = %session.phase,
        result = session.notification.as_deref().unwrap_or("-"),
        "game finished"
    );
    for entry in dispatcher.machine().log().entries() {
        tracing::info!("log #{}: {}", entry.seq, entry.text);
    }
    tracing::info!(
        tones = render.tone_count(),
        samples = render.samples().len(),
        "audio rendered"
    );

    connection.shutdown().await;
    server_task.await??;
    Ok(())
}

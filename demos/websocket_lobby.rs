//! # WebSocket Lobby Example
//!
//! Connects to a running SpyWord server and follows one session:
//!
//! 1. Open the socket; the server's `x-connection-id` header becomes the
//!    session's player id
//! 2. Create a room, or join one from a shared `?room=` link
//! 3. Log every phase change, turn and result until the game ends,
//!    the server disconnects, or Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start a SpyWord server on localhost:3001, then:
//! cargo run --example websocket_lobby
//!
//! # Join a friend's room instead of creating one:
//! SPYWORD_LINK="http://localhost:3001/?room=ab12" cargo run --example websocket_lobby
//!
//! # With sound on the default output device:
//! cargo run --example websocket_lobby --features audio-rodio
//! ```

use spyword_client::bootstrap;
use spyword_client::protocol::Phase;
use spyword_client::{ConnectionEvent, Dispatcher, SoundEngine, SpyWordConfig, SpyWordConnection};

/// Server used when `SPYWORD_URL` is not set.
const DEFAULT_URL: &str = "http://localhost:3001";

#[cfg(feature = "audio-rodio")]
fn sound_engine() -> SoundEngine {
    SoundEngine::default_output()
}

#[cfg(not(feature = "audio-rodio"))]
fn sound_engine() -> SoundEngine {
    tracing::info!("Built without `audio-rodio`, cues are silent");
    SoundEngine::silent()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("SPYWORD_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let name = std::env::var("SPYWORD_NAME").unwrap_or_else(|_| "RustPlayer".to_string());
    let link = std::env::var("SPYWORD_LINK").ok();
    tracing::info!("Connecting to {url}");

    // ── Connect ─────────────────────────────────────────────────────
    let config = SpyWordConfig::new();
    let (mut connection, mut subscription) = SpyWordConnection::connect(&url, &config).await?;
    let mut dispatcher = Dispatcher::new(connection.sender(), sound_engine(), &config);

    dispatcher.set_username(name);
    match link.as_deref() {
        Some(link) if dispatcher.bootstrap(link) => {
            tracing::info!("Joining room {}", dispatcher.session().room_id);
            dispatcher.join_room()?;
        }
        _ => {
            dispatcher.create_room()?;
        }
    }

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };
                let disconnected = matches!(event, ConnectionEvent::Disconnected { .. });
                let before = dispatcher.phase();
                dispatcher.handle(event);

                let phase = dispatcher.phase();
                if phase != before {
                    tracing::info!("Phase {before} → {phase}");
                    if phase == Phase::Lobby {
                        let code = &dispatcher.session().room_id;
                        tracing::info!("Share this room: {}", bootstrap::join_link(&url, code)?);
                    }
                }
                if let Some(notice) = dispatcher.session().notice.clone() {
                    tracing::error!("Server: {notice}");
                    dispatcher.dismiss_notice();
                }
                if let Some(player) = dispatcher.machine().turn_player() {
                    tracing::debug!("Turn: {}", player.username);
                }
                if disconnected || phase == Phase::Ended {
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    for line in dispatcher.machine().log().texts() {
        tracing::info!("{line}");
    }
    connection.shutdown().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}

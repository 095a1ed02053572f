//! # SpyWord Client
//!
//! Client-side sync engine for SpyWord, a real-time social-deduction word
//! game. Players join a room; one secret word is dealt to everyone except the
//! imposter, players take turns describing it, then vote on who the imposter
//! is.
//!
//! The crate keeps a local mirror of the server's game state and routes every
//! server event into it, one event at a time:
//!
//! ```text
//! transport → SpyWordConnection → Subscription → Dispatcher → PhaseStateMachine
//!                                                     │          ├ TimerSync
//!                                                     │          ├ VoteSession
//!                                                     │          └ GameLog
//!                                                     └→ SoundEngine
//! ```
//!
//! Player intents flow the other way: [`Dispatcher`] validates them against
//! the session and hands them to an [`IntentSink`].
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] for any text channel
//! - **WebSocket built-in**: the default `transport-websocket` feature
//!   provides `WebSocketTransport`
//! - **Synthesized audio**: every cue is a tone program; plug in any
//!   [`sound::AudioBackend`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let config = SpyWordConfig::new();
//! let (connection, subscription) = SpyWordConnection::connect("http://localhost:3001", &config).await?;
//!
//! let mut dispatcher = Dispatcher::new(connection.sender(), SoundEngine::silent(), &config);
//! dispatcher.attach(subscription)?;
//! dispatcher.set_username("Ana");
//! dispatcher.create_room()?;
//! dispatcher.run().await;
//! ```

pub mod bootstrap;
#[cfg(feature = "tokio-runtime")]
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod game_log;
pub mod phase;
pub mod protocol;
pub mod sound;
pub mod timer;
pub mod transport;
pub mod transports;
pub mod vote;

// Re-export primary types for ergonomic imports.
#[cfg(feature = "tokio-runtime")]
pub use client::{IntentSender, SpyWordConnection};
pub use config::SpyWordConfig;
pub use dispatcher::{Dispatcher, IntentSink};
pub use error::{Result, SpyWordError, ValidationError};
pub use event::{ConnectionEvent, Subscription};
pub use phase::{PhaseStateMachine, Session};
pub use protocol::{ClientMessage, Phase, ServerMessage};
pub use sound::SoundEngine;
pub use transport::Transport;
#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;

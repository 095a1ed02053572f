//! Error types for the SpyWord client.

use thiserror::Error;

/// Errors that can occur when using the SpyWord client.
#[derive(Debug, Error)]
pub enum SpyWordError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted to emit an intent, but the connection is gone.
    #[error("not connected to server")]
    NotConnected,

    /// A player action was rejected locally before anything was sent.
    #[error("invalid action: {0}")]
    Validation(#[from] ValidationError),

    /// A dispatcher already has a live event subscription.
    #[error("dispatcher is already subscribed to an event source")]
    AlreadySubscribed,

    /// A page or server URL could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a local player action is refused without a network round trip.
///
/// None of these mutate session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The player has not entered a username.
    #[error("enter your name")]
    MissingUsername,

    /// Joining requires a room code.
    #[error("enter name and room code")]
    MissingRoomCode,

    /// The action needs a room, but the client is not in one.
    #[error("not in a room")]
    NotInRoom,

    /// Submitted words must contain at least one visible character.
    #[error("word is empty")]
    EmptyWord,

    /// Only the room host can start the game.
    #[error("only the host can start the game")]
    NotHost,

    /// The lobby does not have enough players yet.
    #[error("waiting for players ({have}/{need})")]
    NotEnoughPlayers {
        /// Players currently in the room.
        have: usize,
        /// Minimum required to start.
        need: usize,
    },

    /// Words may only be submitted on this player's turn.
    #[error("wait for your turn")]
    NotYourTurn,

    /// The action is not available in the current phase.
    #[error("action not available during {0}")]
    WrongPhase(crate::protocol::Phase),
}

/// A specialized [`Result`] type for SpyWord client operations.
pub type Result<T> = std::result::Result<T, SpyWordError>;

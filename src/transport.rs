//! Transport abstraction for the SpyWord game protocol.
//!
//! The [`Transport`] trait is a bidirectional text message channel between
//! the client and the game server. Every frame is one JSON event envelope, so
//! implementations handle framing themselves (WebSocket frames, a
//! newline-delimited socket, an in-process channel for tests).
//!
//! Connection setup is not part of this trait. Construct a connected
//! transport, then pass it to `SpyWordConnection::start`.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use spyword_client::error::SpyWordError;
//! use spyword_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), SpyWordError> {
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, SpyWordError>> {
//!         // None once the server has closed the connection
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), SpyWordError> {
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::SpyWordError;

/// A bidirectional text message transport to the game server.
///
/// Each call to [`send`](Transport::send) transmits one complete event
/// envelope; each call to [`recv`](Transport::recv) returns one.
///
/// # Object Safety
///
/// This trait is object-safe, so `Box<dyn Transport>` works for dynamic
/// dispatch.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because it is polled
/// inside `tokio::select!`. If `recv` is cancelled before completion, calling
/// it again must not lose data.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`SpyWordError::TransportSend`] if the message could not be
    /// sent.
    async fn send(&mut self, message: String) -> Result<(), SpyWordError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` when a complete message was received
    /// - `Some(Err(e))` on a transport error
    /// - `None` once the server closed the connection cleanly
    async fn recv(&mut self) -> Option<Result<String, SpyWordError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Resources are released
    /// either way.
    async fn close(&mut self) -> Result<(), SpyWordError>;

    /// Id the server assigned to this connection, if the transport knows it.
    ///
    /// The session compares it against the room host and the current turn.
    fn connection_id(&self) -> Option<String> {
        None
    }
}

//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries one event envelope per text frame. Both
//! `ws://` and `wss://` URLs are supported, and a page origin such as
//! `https://play.example` is accepted and switched to the matching WebSocket
//! scheme, since the game server is served from the same origin as the page.
//!
//! If the server's handshake response carries an
//! [`x-connection-id`](CONNECTION_ID_HEADER) header, its value becomes the
//! transport's [`connection_id`](Transport::connection_id).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), spyword_client::SpyWordError> {
//! use spyword_client::{Transport, WebSocketTransport};
//!
//! let mut transport = WebSocketTransport::connect("http://localhost:3001").await?;
//! transport
//!     .send(r#"{"event":"createRoom","data":{"username":"Ana","avatar":"🐺"}}"#.to_string())
//!     .await?;
//!
//! if let Some(Ok(msg)) = transport.recv().await {
//!     println!("server said: {msg}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use url::Url;

use crate::error::SpyWordError;
use crate::transport::Transport;

/// Handshake response header carrying the server-assigned connection id.
pub const CONNECTION_ID_HEADER: &str = "x-connection-id";

/// Type alias for the underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Turns a server or page URL into a WebSocket URL.
///
/// `http` becomes `ws` and `https` becomes `wss`; other schemes are kept.
///
/// # Errors
///
/// Returns [`SpyWordError::Url`] if `server` is not an absolute URL.
pub fn socket_url(server: &str) -> Result<Url, SpyWordError> {
    let mut url = Url::parse(server)?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Ok(url),
    };
    if url.set_scheme(scheme).is_err() {
        tracing::debug!(url = %url, "scheme left unchanged");
    }
    Ok(url)
}

/// A [`Transport`] backed by a WebSocket connection.
///
/// Use [`WebSocketTransport::connect`] to establish a new connection, or
/// [`WebSocketTransport::from_stream`] for a stream set up elsewhere (custom
/// TLS, proxies, extra headers).
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future before it
/// completes loses no messages.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    connection_id: Option<String>,
    closed: bool,
}

impl WebSocketTransport {
    /// Connects to the game server at `server`.
    ///
    /// # Errors
    ///
    /// Returns [`SpyWordError::Url`] if `server` cannot be parsed and
    /// [`SpyWordError::Io`] if the connection cannot be established. When the
    /// underlying error is an I/O error its [`ErrorKind`](std::io::ErrorKind)
    /// is preserved.
    pub async fn connect(server: &str) -> Result<Self, SpyWordError> {
        let url = socket_url(server)?;
        tracing::debug!(url = %url, "connecting to game server");

        let (stream, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| {
                let kind = match &e {
                    tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                    _ => std::io::ErrorKind::Other,
                };
                SpyWordError::Io(std::io::Error::new(kind, e))
            })?;

        let connection_id = response
            .headers()
            .get(CONNECTION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        tracing::info!(url = %url, ?connection_id, "connected to game server");

        Ok(Self {
            stream,
            connection_id,
            closed: false,
        })
    }

    /// Wraps an already-established WebSocket stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            connection_id: None,
            closed: false,
        }
    }

    /// Sets the connection id reported to the session.
    #[must_use]
    pub fn with_connection_id(mut self, id: impl Into<String>) -> Self {
        self.connection_id = Some(id.into());
        self
    }

    /// Like [`connect`](Self::connect), but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SpyWordError::Timeout`] if the deadline elapses, or any
    /// error that [`connect`](Self::connect) may return.
    pub async fn connect_with_timeout(
        server: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, SpyWordError> {
        tokio::time::timeout(timeout, Self::connect(server))
            .await
            .map_err(|_| SpyWordError::Timeout)?
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), SpyWordError> {
        if self.closed {
            return Err(SpyWordError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| SpyWordError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, SpyWordError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(SpyWordError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                // tungstenite queues the pong itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(bytes) => {
                    tracing::warn!(len = bytes.len(), "skipping binary WebSocket frame");
                }
                Message::Frame(_) => {
                    tracing::debug!("skipping raw WebSocket frame");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), SpyWordError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| SpyWordError::TransportSend(e.to_string()))
    }

    fn connection_id(&self) -> Option<String> {
        self.connection_id.clone()
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
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
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[test]
    fn page_origins_map_to_socket_schemes() {
        assert_eq!(
            socket_url("http://localhost:3001").unwrap().as_str(),
            "ws://localhost:3001/"
        );
        assert_eq!(
            socket_url("https://play.example/").unwrap().scheme(),
            "wss"
        );
        assert_eq!(socket_url("ws://10.0.0.2:9000/game").unwrap().scheme(), "ws");
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-valid-url")
            .await
            .unwrap_err();
        assert!(matches!(err, SpyWordError::Url(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1")
            .await
            .unwrap_err();
        assert!(matches!(err, SpyWordError::Io(_)));
    }

    // ── Mock-server helpers ─────────────────────────────────────────────

    /// Starts a one-connection WebSocket server. When `connection_id` is set
    /// the handshake response carries it in [`CONNECTION_ID_HEADER`].
    async fn start_mock_server<F, Fut>(connection_id: Option<&'static str>, handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let callback = move |_req: &Request, mut resp: Response| {
                if let Some(id) = connection_id {
                    resp.headers_mut()
                        .insert(CONNECTION_ID_HEADER, HeaderValue::from_static(id));
                }
                Ok::<Response, ErrorResponse>(resp)
            };
            let ws = tokio_tungstenite::accept_hdr_async(tcp, callback)
                .await
                .unwrap();
            handler(ws).await;
        });

        format!("http://{addr}")
    }

    // ── Mock-server tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn handshake_header_sets_connection_id() {
        let url = start_mock_server(Some("sock-42"), |mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.connection_id().as_deref(), Some("sock-42"));
    }

    #[tokio::test]
    async fn connection_id_absent_without_header() {
        let url = start_mock_server(None, |mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let transport = WebSocketTransport::connect(&url).await.unwrap();
        assert!(transport.connection_id().is_none());
        let transport = transport.with_connection_id("manual");
        assert_eq!(transport.connection_id().as_deref(), Some("manual"));
    }

    #[tokio::test]
    async fn recv_receives_event_frames() {
        let url = start_mock_server(None, |mut ws| async move {
            ws.send(Message::Text(
                r#"{"event":"roomCreated","data":{"roomId":"AB12"}}"#.into(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(
                r#"{"event":"timerTick","data":{"remainingSeconds":30}}"#.into(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let first = transport.recv().await.unwrap().unwrap();
        assert!(first.contains("roomCreated"));
        let second = transport.recv().await.unwrap().unwrap();
        assert!(second.contains("timerTick"));
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(None, |mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("after_binary".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let msg = transport.recv().await.unwrap().unwrap();
        assert_eq!(msg, "after_binary");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url = start_mock_server(None, |mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, SpyWordError::TransportClosed));
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        // TEST-NET-1 is not routable.
        let err = WebSocketTransport::connect_with_timeout(
            "ws://192.0.2.1:1",
            std::time::Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SpyWordError::Timeout));
    }

    #[tokio::test]
    async fn intents_reach_the_server() {
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel::<String>();
        let url = start_mock_server(None, |mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = seen_tx.send(text.to_string());
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport
            .send(r#"{"event":"startGame","data":{"roomId":"AB12"}}"#.to_string())
            .await
            .unwrap();
        let seen = seen_rx.await.unwrap();
        assert!(seen.contains("startGame"));
    }
}

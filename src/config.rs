//! Client configuration.

use std::time::Duration;

/// Default length of a timed phase, in seconds.
pub const DEFAULT_ROUND_SECONDS: i32 = 30;

/// Default minimum number of players before the host may start.
pub const DEFAULT_MIN_PLAYERS: usize = 3;

/// Default capacity of the bounded event channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration shared by the [`Dispatcher`](crate::dispatcher::Dispatcher)
/// and the [`SpyWordConnection`](crate::client::SpyWordConnection).
///
/// Every field has a default that matches the game server.
///
/// # Example
///
/// ```
/// use spyword_client::config::SpyWordConfig;
/// use std::time::Duration;
///
/// let config = SpyWordConfig::new()
///     .with_muted(true)
///     .with_event_channel_capacity(64)
///     .with_shutdown_timeout(Duration::from_millis(250));
/// assert_eq!(config.round_seconds, 30);
/// assert!(config.muted);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpyWordConfig {
    /// Value the countdown shows after every phase change.
    ///
    /// Defaults to **30**. Values below 1 are clamped to 1.
    pub round_seconds: i32,
    /// Players needed before the host may start.
    ///
    /// Defaults to **3**. The server enforces its own minimum as well.
    pub min_players: usize,
    /// Whether sound starts muted.
    pub muted: bool,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up, events are dropped with a warning
    /// instead of blocking the transport loop. `Disconnected` is always
    /// delivered.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time the transport loop gets to close the transport on shutdown
    /// before it is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Connection id to use when the transport cannot report one.
    pub connection_id: Option<String>,
}

impl SpyWordConfig {
    pub fn new() -> Self {
        Self {
            round_seconds: DEFAULT_ROUND_SECONDS,
            min_players: DEFAULT_MIN_PLAYERS,
            muted: false,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            connection_id: None,
        }
    }

    #[must_use]
    pub fn with_round_seconds(mut self, seconds: i32) -> Self {
        self.round_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_min_players(mut self, min_players: usize) -> Self {
        self.min_players = min_players;
        self
    }

    #[must_use]
    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    ///
    /// A zero timeout aborts the transport loop immediately.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Fix the id this client is known by, for transports that do not
    /// report one.
    #[must_use]
    pub fn with_connection_id(mut self, id: impl Into<String>) -> Self {
        self.connection_id = Some(id.into());
        self
    }
}

impl Default for SpyWordConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SpyWordConfig::default();
        assert_eq!(config.round_seconds, 30);
        assert_eq!(config.min_players, 3);
        assert!(!config.muted);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert!(config.connection_id.is_none());
    }

    #[test]
    fn builder_clamps_degenerate_values() {
        let config = SpyWordConfig::new()
            .with_event_channel_capacity(0)
            .with_round_seconds(-5);
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.round_seconds, 1);
    }

    #[test]
    fn connection_id_override() {
        let config = SpyWordConfig::new().with_connection_id("sock-1");
        assert_eq!(config.connection_id.as_deref(), Some("sock-1"));
    }
}

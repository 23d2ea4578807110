//! Notification push channel: a persistent WebSocket the server uses to
//! deliver one JSON-encoded notification per message.
//!
//! The connection is a small state machine — Connecting, Open, Closed —
//! driven by a background task that reconnects after a fixed delay for as
//! long as the authenticated signal holds. Inbound messages are routed to
//! the notification hub through the same mutation path REST resyncs use,
//! so the unread-count bookkeeping lives in exactly one place.

mod socket;

pub(crate) use socket::spawn_socket_loop;

/// Connection state for the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Configuration for the reconnect behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = infinite).
    pub max_attempts: u32,
    /// Initial delay in milliseconds.
    pub initial_delay_ms: u32,
    /// Maximum delay in milliseconds.
    pub max_delay_ms: u32,
    /// Multiplier applied per attempt.
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    /// The default policy is a fixed 5s delay, retried indefinitely.
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: 5000,
            max_delay_ms: 5000,
            backoff_multiplier: 1.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculate the delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> u32 {
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(attempt as i32);
        (delay as u32).min(self.max_delay_ms)
    }
}

/// Build the socket URL for the notification channel. The token rides in
/// a query parameter; the server authenticates the upgrade with it.
pub fn notifications_socket_url(ws_base: &str, token: &str) -> Option<String> {
    let mut url = url::Url::parse(ws_base).ok()?;
    url.set_path("/ws/notifications");
    url.set_query(Some(&format!("token={}", urlencoding::encode(token))));
    Some(url.to_string())
}

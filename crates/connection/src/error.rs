//! Error types surfaced by a session.

use std::sync::Arc;

use tokio_tungstenite::tungstenite;

/// Failures reported through [`ConnectionEvent::Error`](crate::ConnectionEvent::Error).
///
/// None of these escape as a `Result` from the manager's methods; they are
/// either delivered as events or logged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionError {
    /// The connection could not be opened or broke while open.
    #[error("WebSocket error: {0}")]
    Transport(#[source] Arc<tungstenite::Error>),

    /// A payload could not be written to the connection.
    #[error("send failed: {0}")]
    Send(String),

    /// The reconnect budget of the current failure streak is used up.
    #[error("reconnect attempts exhausted ({attempts} allowed)")]
    ReconnectExhausted { attempts: u32 },

    /// The peer stopped answering heartbeat probes.
    #[error("heartbeat timed out waiting for `{marker}`")]
    HeartbeatTimeout { marker: String },
}

impl From<tungstenite::Error> for ConnectionError {
    fn from(e: tungstenite::Error) -> Self {
        Self::Transport(Arc::new(e))
    }
}

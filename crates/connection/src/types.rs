//! Public types for the connection manager.

use std::time::Duration;

use crate::error::ConnectionError;

/// Connection status of a session.
///
/// A pending reconnect is `Unconnected` with a scheduled attempt; there is no
/// separate "reconnecting" status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Unconnected,
    Connected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Close details reported by the peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code, if the peer sent a close frame.
    pub code: Option<u16>,
    pub reason: String,
}

/// Events emitted by the connection manager.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The connection is open and the heartbeat (if enabled) is running.
    Open,
    /// A text message arrived. The raw payload is forwarded untouched,
    /// heartbeat answers included.
    Message(String),
    /// Transport failure, heartbeat failure, or reconnect exhaustion.
    Error(ConnectionError),
    /// The peer closed the connection or the stream ended.
    Close(CloseInfo),
    /// A reconnect attempt was scheduled.
    Reconnecting {
        /// Attempts left in the current streak, including this one.
        remaining: u32,
        delay: Duration,
    },
}

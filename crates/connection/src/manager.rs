//! Consumer-facing handle to a resilient session.
//!
//! Creating a [`ConnectionManager`] spawns the session task and starts the
//! first connection attempt right away. Lifecycle events are delivered on a
//! channel obtained once through [`ConnectionManager::take_events`].

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::config::{ConfigError, Options, SessionConfig};
use crate::session::{self, Command};
use crate::transport::{Connector, WsConnector};
use crate::types::{ConnectionEvent, ConnectionStatus};

/// Keeps one WebSocket session alive with reconnects and heartbeats.
///
/// Must be created inside a Tokio runtime. The session ends on
/// [`close`](Self::close) or when the manager is dropped.
pub struct ConnectionManager {
    url: String,
    commands: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<ConnectionStatus>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ConnectionEvent>>>,
}

impl ConnectionManager {
    /// Starts a session for `url` over a real WebSocket.
    pub fn new(url: impl Into<String>, config: SessionConfig) -> Self {
        Self::with_connector(url, config, Arc::new(WsConnector))
    }

    /// Validates consumer options, then starts the session.
    pub fn with_options(url: impl Into<String>, options: Options) -> Result<Self, ConfigError> {
        let config = SessionConfig::try_from(options)?;
        Ok(Self::new(url, config))
    }

    /// Starts a session that opens connections through `connector`.
    pub fn with_connector(
        url: impl Into<String>,
        config: SessionConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let url = url.into();
        let channels = session::spawn(url.clone(), config, connector);

        Self {
            url,
            commands: channels.commands,
            status_rx: channels.status,
            events_rx: Mutex::new(Some(channels.events)),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ConnectionEvent>> {
        self.events_rx.lock().await.take()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// A receiver that observes every status change.
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Serializes `data` as JSON and sends it as a text message.
    ///
    /// Never fails: a payload that cannot be serialized, or a session that
    /// is not connected, is logged and dropped.
    pub fn send<T: Serialize + ?Sized>(&self, data: &T) {
        match serde_json::to_string(data) {
            Ok(text) => self.send_text(text),
            Err(e) => warn!(url = %self.url, error = %e, "failed to serialize outbound message"),
        }
    }

    /// Sends a raw text message. Delivery follows the same rules as
    /// [`send`](Self::send).
    pub fn send_text(&self, text: impl Into<String>) {
        self.command(Command::Send(text.into()));
    }

    /// Drops the current connection and opens a new one immediately.
    ///
    /// A pending automatic attempt is cancelled. The remaining reconnect
    /// budget is left as is; it is restored once the new connection opens.
    pub fn reconnect(&self) {
        self.command(Command::Reconnect);
    }

    /// Cancels every timer, releases the connection and ends the session.
    ///
    /// Returns once the session has stopped. Calling it again is a no-op.
    pub async fn close(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Close(ack_tx)).is_err() {
            debug!(url = %self.url, "session already closed");
            return;
        }
        let _ = ack_rx.await;
    }

    fn command(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            debug!(url = %self.url, "session closed, ignoring command");
        }
    }
}

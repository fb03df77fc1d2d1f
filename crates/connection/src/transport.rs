//! Connection handles and the transport seam.
//!
//! A [`ConnectionHandle`] owns one open attempt: a background task that
//! connects through a [`Connector`], then runs the read and write pumps.
//! Everything the task observes is posted to the session as a
//! [`TransportEvent`] stamped with the handle's generation, so events from
//! a handle the session already replaced can be recognised and dropped.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::{Sink, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use wsbox_protocol::constants::WS_MAX_MESSAGE_SIZE;

use crate::error::ConnectionError;
use crate::types::CloseInfo;

/// Outbound half of an open connection.
pub type WsSink = Pin<Box<dyn Sink<tungstenite::Message, Error = tungstenite::Error> + Send>>;

/// Inbound half of an open connection.
pub type WsStream =
    Pin<Box<dyn Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Send>>;

/// Opens duplex connections.
///
/// [`WsConnector`] is the production implementation; tests plug in scripted
/// connectors that never touch the network.
pub trait Connector: Send + Sync + 'static {
    fn connect(
        &self,
        url: &str,
    ) -> BoxFuture<'static, Result<(WsSink, WsStream), tungstenite::Error>>;
}

/// Connects over `ws://` or `wss://` with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(
        &self,
        url: &str,
    ) -> BoxFuture<'static, Result<(WsSink, WsStream), tungstenite::Error>> {
        let url = url.to_owned();
        Box::pin(async move {
            let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
            ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
            ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
            let (ws_stream, _) =
                tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
            let (write, read) = ws_stream.split();
            let write: WsSink = Box::pin(write);
            let read: WsStream = Box::pin(read);
            Ok((write, read))
        })
    }
}

/// Something a connection task observed.
#[derive(Debug)]
pub(crate) struct TransportEvent {
    pub(crate) generation: u64,
    pub(crate) kind: TransportEventKind,
}

#[derive(Debug)]
pub(crate) enum TransportEventKind {
    Opened,
    Message(String),
    Closed(CloseInfo),
    Failed(tungstenite::Error),
}

pub(crate) type TransportSender = mpsc::UnboundedSender<TransportEvent>;

/// Posts an event to the session; a closed session simply drops it.
pub(crate) fn post(tx: &TransportSender, generation: u64, kind: TransportEventKind) {
    if tx.send(TransportEvent { generation, kind }).is_err() {
        trace!(generation, "session gone, dropping transport event");
    }
}

/// Capacity of the per-connection outbound queue.
const WRITE_QUEUE: usize = 64;

/// One connection attempt and, once open, the live connection.
///
/// Dropping the handle cancels its task; the write pump then sends a close
/// frame if the connection was open.
pub(crate) struct ConnectionHandle {
    generation: u64,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// Spawns the connection task for `url`.
    pub(crate) fn open(
        generation: u64,
        url: &str,
        connector: &Arc<dyn Connector>,
        events_tx: TransportSender,
    ) -> Self {
        let (write_tx, write_rx) = mpsc::channel(WRITE_QUEUE);
        let cancel = CancellationToken::new();

        let connecting = connector.connect(url);
        tokio::spawn(run_connection(
            generation,
            connecting,
            write_tx.clone(),
            write_rx,
            events_tx,
            cancel.clone(),
        ));

        Self {
            generation,
            write_tx,
            cancel,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Queues a text frame without waiting.
    pub(crate) fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        self.write_tx
            .try_send(tungstenite::Message::Text(text.into()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    ConnectionError::Send("outbound queue full".into())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    ConnectionError::Send("connection closed".into())
                }
            })
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_connection(
    generation: u64,
    connecting: BoxFuture<'static, Result<(WsSink, WsStream), tungstenite::Error>>,
    write_tx: mpsc::Sender<tungstenite::Message>,
    write_rx: mpsc::Receiver<tungstenite::Message>,
    events_tx: TransportSender,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(generation, "connection attempt abandoned");
            return;
        }
        result = connecting => result,
    };

    let (write, read) = match connected {
        Ok(pair) => pair,
        Err(e) => {
            post(&events_tx, generation, TransportEventKind::Failed(e));
            return;
        }
    };
    post(&events_tx, generation, TransportEventKind::Opened);

    let write_handle = tokio::spawn(crate::pumps::write::write_pump(
        write,
        write_rx,
        generation,
        events_tx.clone(),
        cancel.clone(),
    ));

    crate::pumps::read::read_pump(read, generation, events_tx, write_tx, cancel.clone()).await;

    cancel.cancel();
    let _ = write_handle.await;
}

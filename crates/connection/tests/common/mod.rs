//! Live WebSocket peer for integration tests.
//!
//! Listens on an ephemeral local port, answers heartbeat probes, pushes
//! unsolicited payloads and records every text frame it receives.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use wsbox_connection::ConnectionEvent;

/// How the peer treats each accepted connection.
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Answer `{"type":"ping"}` with `{"type":"pong"}`.
    pub answer_heartbeats: bool,
    /// Push `{"data":"some info"}` at this period.
    pub push_every: Option<Duration>,
    /// Send a close frame right after the handshake.
    pub close_on_accept: bool,
}

impl Behavior {
    pub fn echo() -> Self {
        Self {
            answer_heartbeats: true,
            push_every: None,
            close_on_accept: false,
        }
    }

    pub fn silent() -> Self {
        Self {
            answer_heartbeats: false,
            ..Self::echo()
        }
    }

    pub fn closing() -> Self {
        Self {
            close_on_accept: true,
            ..Self::echo()
        }
    }

    pub fn pushing(every: Duration) -> Self {
        Self {
            push_every: Some(every),
            ..Self::echo()
        }
    }
}

pub struct EchoPeer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<String>>>,
    cancel: CancellationToken,
}

impl EchoPeer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();

        {
            let connections = connections.clone();
            let received = received.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = listener.accept() => {
                            let Ok((stream, _)) = result else { continue };
                            connections.fetch_add(1, Ordering::SeqCst);
                            tokio::spawn(serve(
                                stream,
                                behavior.clone(),
                                received.clone(),
                                cancel.clone(),
                            ));
                        }
                    }
                }
            });
        }

        Self {
            addr,
            connections,
            received,
            cancel,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Accepted TCP connections so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Text frames received from clients, oldest first.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for EchoPeer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn serve(
    stream: tokio::net::TcpStream,
    behavior: Behavior,
    received: Arc<Mutex<Vec<String>>>,
    cancel: CancellationToken,
) {
    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws.split();

    if behavior.close_on_accept {
        let _ = write
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "going away".into(),
            })))
            .await;
        return;
    }

    let (push_tx, mut push_rx) = mpsc::channel::<()>(1);
    if let Some(every) = behavior.push_every {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if push_tx.send(()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            Some(()) = push_rx.recv() => {
                let push = r#"{"data":"some info"}"#;
                if write.send(Message::Text(push.into())).await.is_err() {
                    break;
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str().to_owned();
                    let is_ping = serde_json::from_str::<serde_json::Value>(&text)
                        .map(|v| v["type"] == "ping")
                        .unwrap_or(false);
                    received.lock().unwrap().push(text);
                    if is_ping && behavior.answer_heartbeats {
                        let pong = r#"{"type":"pong"}"#;
                        if write.send(Message::Text(pong.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            }
        }
    }
}

/// Next event, failing the test if none arrives within five seconds.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("session ended")
}

/// Skips pushed payloads until an event other than a message arrives.
pub async fn next_lifecycle_event(
    events: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
) -> ConnectionEvent {
    loop {
        match next_event(events).await {
            ConnectionEvent::Message(_) => continue,
            other => return other,
        }
    }
}

/// A `ws://` URL nothing listens on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}")
}

//! WebSocket write pump: serialises outbound frames.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::transport::{TransportEventKind, TransportSender, post};

/// Writes queued frames to the WebSocket.
///
/// On cancellation a close frame is sent. A write error is reported as a
/// transport failure and cancels the read side, so the connection produces
/// a single terminal event.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    generation: u64,
    events_tx: TransportSender,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = write_rx.recv() => {
                match msg {
                    Some(m) => {
                        if let Err(e) = write.send(m).await {
                            if cancel.is_cancelled() {
                                return;
                            }
                            error!(generation, "WebSocket write error: {e}");
                            cancel.cancel();
                            post(&events_tx, generation, TransportEventKind::Failed(e));
                            return;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = write.send(tungstenite::Message::Close(None)).await;
}

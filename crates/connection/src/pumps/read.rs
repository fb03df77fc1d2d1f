//! WebSocket read pump: turns inbound frames into transport events.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::transport::{TransportEventKind, TransportSender, post};
use crate::types::CloseInfo;

/// Reads frames until the connection ends or the handle is cancelled.
///
/// Exactly one terminal event (`Closed` or `Failed`) is posted when the
/// connection ends on its own; cancellation ends the pump silently.
pub(crate) async fn read_pump<S>(
    mut read: S,
    generation: u64,
    events_tx: TransportSender,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            msg = read.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        trace!(generation, len = text.len(), "received text frame");
                        post(&events_tx, generation, TransportEventKind::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(tungstenite::Message::Ping(data))) => {
                        trace!(generation, "received ping, sending pong");
                        let _ = write_tx.try_send(tungstenite::Message::Pong(data));
                    }
                    Some(Ok(tungstenite::Message::Pong(_))) => {
                        trace!(generation, "received pong frame");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let info = frame
                            .map(|f| CloseInfo {
                                code: Some(u16::from(f.code)),
                                reason: f.reason.as_str().to_owned(),
                            })
                            .unwrap_or_default();
                        debug!(generation, code = ?info.code, reason = %info.reason, "received close frame");
                        post(&events_tx, generation, TransportEventKind::Closed(info));
                        break;
                    }
                    Some(Ok(tungstenite::Message::Binary(data))) => {
                        trace!(generation, len = data.len(), "ignoring binary frame");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(generation, "WebSocket read error: {e}");
                        post(&events_tx, generation, TransportEventKind::Failed(e));
                        break;
                    }
                    None => {
                        debug!(generation, "WebSocket stream ended");
                        post(&events_tx, generation, TransportEventKind::Closed(CloseInfo::default()));
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportEvent;
    use futures_util::stream;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    fn text(s: &str) -> Result<tungstenite::Message, tungstenite::Error> {
        Ok(tungstenite::Message::Text(s.to_owned().into()))
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<TransportEvent>) -> Vec<TransportEventKind> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            assert_eq!(ev.generation, 7);
            out.push(ev.kind);
        }
        out
    }

    #[tokio::test]
    async fn forwards_text_then_reports_stream_end() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (write_tx, _write_rx) = mpsc::channel(16);
        let frames = stream::iter(vec![text(r#"{"type":"pong"}"#), text("hello")]);

        read_pump(frames, 7, events_tx, write_tx, CancellationToken::new()).await;

        let events = drain(events_rx);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], TransportEventKind::Message(t) if t == r#"{"type":"pong"}"#));
        assert!(matches!(&events[1], TransportEventKind::Message(t) if t == "hello"));
        assert!(matches!(&events[2], TransportEventKind::Closed(info) if info.code.is_none()));
    }

    #[tokio::test]
    async fn close_frame_carries_code_and_reason() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (write_tx, _write_rx) = mpsc::channel(16);
        let close = tungstenite::Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "server restart".into(),
        }));
        // Frames after the close are never read.
        let frames = stream::iter(vec![Ok(close), text("late")]);

        read_pump(frames, 7, events_tx, write_tx, CancellationToken::new()).await;

        let events = drain(events_rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            TransportEventKind::Closed(info) => {
                assert_eq!(info.code, Some(1001));
                assert_eq!(info.reason, "server restart");
            }
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_error_is_reported_once() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (write_tx, _write_rx) = mpsc::channel(16);
        let frames = stream::iter(vec![Err::<tungstenite::Message, _>(
            tungstenite::Error::ConnectionClosed,
        )]);

        read_pump(frames, 7, events_tx, write_tx, CancellationToken::new()).await;

        let events = drain(events_rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], TransportEventKind::Failed(_)));
    }

    #[tokio::test]
    async fn answers_ping_frames() {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (write_tx, mut write_rx) = mpsc::channel(16);
        let frames = stream::iter(vec![Ok::<_, tungstenite::Error>(
            tungstenite::Message::Ping(vec![1, 2].into()),
        )]);

        read_pump(frames, 7, events_tx, write_tx, CancellationToken::new()).await;

        match write_rx.recv().await {
            Some(tungstenite::Message::Pong(data)) => assert_eq!(&data[..], &[1u8, 2][..]),
            other => panic!("expected pong, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn binary_frames_are_ignored() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (write_tx, _write_rx) = mpsc::channel(16);
        let frames = stream::iter(vec![Ok::<_, tungstenite::Error>(
            tungstenite::Message::Binary(vec![0u8; 4].into()),
        )]);

        read_pump(frames, 7, events_tx, write_tx, CancellationToken::new()).await;

        let events = drain(events_rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], TransportEventKind::Closed(_)));
    }

    #[tokio::test]
    async fn cancellation_is_silent() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (write_tx, _write_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let frames = stream::pending::<Result<tungstenite::Message, tungstenite::Error>>();
        read_pump(frames, 7, events_tx, write_tx, cancel).await;

        assert!(drain(events_rx).is_empty());
    }
}

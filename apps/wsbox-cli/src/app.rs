//! Event loop wiring stdin and the session together.

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use wsbox_connection::{ConnectionEvent, ConnectionManager, Options};

/// What a line of input asks for.
#[derive(Debug, PartialEq)]
enum Input {
    Send(serde_json::Value),
    Reconnect,
    Status,
    Quit,
    Empty,
}

/// Lines that already are JSON are sent untouched; anything else is wrapped
/// in a `message` envelope.
fn parse_line(line: &str) -> Input {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "/reconnect" => Input::Reconnect,
        "/status" => Input::Status,
        "/quit" => Input::Quit,
        _ => match serde_json::from_str(line) {
            Ok(value) => Input::Send(value),
            Err(_) => Input::Send(serde_json::json!({ "type": "message", "data": line })),
        },
    }
}

fn log_event(event: &ConnectionEvent) {
    match event {
        ConnectionEvent::Open => info!("connected"),
        ConnectionEvent::Message(text) => info!(%text, "message"),
        ConnectionEvent::Error(e) => error!(error = %e, "session error"),
        ConnectionEvent::Close(close) => {
            warn!(code = ?close.code, reason = %close.reason, "closed by peer");
        }
        ConnectionEvent::Reconnecting { remaining, delay } => {
            info!(remaining, ?delay, "reconnecting");
        }
    }
}

/// Runs the client until stdin ends, `/quit`, or Ctrl-C.
pub async fn run(url: String, options: Options) -> anyhow::Result<()> {
    let manager = ConnectionManager::with_options(url, options)?;
    let mut events = manager
        .take_events()
        .await
        .ok_or_else(|| anyhow::anyhow!("event channel already taken"))?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("SIGINT received, shutting down");
                break;
            }
            Some(event) = events.recv() => log_event(&event),
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_line(&line) {
                    Input::Send(value) => manager.send(&value),
                    Input::Reconnect => manager.reconnect(),
                    Input::Status => info!(status = ?manager.status(), url = manager.url(), "status"),
                    Input::Quit => break,
                    Input::Empty => {}
                }
            }
        }
    }

    manager.close().await;
    Ok(())
}

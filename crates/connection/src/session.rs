//! The session task.
//!
//! A session owns the connection handle, the timers, the reconnect
//! controller and the heartbeat monitor. It runs as a single task that
//! handles one input at a time (a command from the manager, an event from
//! the current connection, or an expired timer), so no state is ever shared
//! and a cancelled timer can never fire.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use wsbox_protocol::Envelope;

use crate::config::SessionConfig;
use crate::error::ConnectionError;
use crate::heartbeat::{HeartbeatMonitor, Liveness};
use crate::reconnection::{ReconnectController, Trigger};
use crate::timers::{self, TimerKind, TimerSet};
use crate::transport::{
    ConnectionHandle, Connector, TransportEvent, TransportEventKind, TransportSender,
};
use crate::types::{ConnectionEvent, ConnectionStatus};

/// Requests from the manager to its session.
#[derive(Debug)]
pub(crate) enum Command {
    Send(String),
    Reconnect,
    Close(oneshot::Sender<()>),
}

/// Channels connecting a spawned session to its manager.
pub(crate) struct SessionChannels {
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) status: watch::Receiver<ConnectionStatus>,
    pub(crate) events: mpsc::UnboundedReceiver<ConnectionEvent>,
}

/// Spawns a session for `url` and opens the first connection.
pub(crate) fn spawn(
    url: String,
    config: SessionConfig,
    connector: Arc<dyn Connector>,
) -> SessionChannels {
    let (status_tx, status) = watch::channel(ConnectionStatus::Unconnected);
    let (events_tx, events) = mpsc::unbounded_channel();
    let (commands, commands_rx) = mpsc::unbounded_channel();

    let session = Session::new(url, config, connector, status_tx, events_tx);
    tokio::spawn(session.run(commands_rx));

    SessionChannels {
        commands,
        status,
        events,
    }
}

pub(crate) struct Session {
    url: String,
    connector: Arc<dyn Connector>,
    status_tx: watch::Sender<ConnectionStatus>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    transport_tx: TransportSender,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    connection: Option<ConnectionHandle>,
    next_generation: u64,
    timers: TimerSet,
    reconnect: ReconnectController,
    heartbeat: HeartbeatMonitor,
    /// Serialized heartbeat request.
    probe: String,
    response_type: String,
}

impl Session {
    pub(crate) fn new(
        url: String,
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        status_tx: watch::Sender<ConnectionStatus>,
        events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let probe = config.heartbeat.request.to_text().unwrap_or_else(|e| {
            error!(error = %e, "failed to serialize heartbeat request");
            String::from("{}")
        });
        let response_type = config.heartbeat.response_type.clone();

        Self {
            url,
            connector,
            status_tx,
            events_tx,
            transport_tx,
            transport_rx,
            connection: None,
            next_generation: 0,
            timers: TimerSet::default(),
            reconnect: ReconnectController::new(&config.reconnect),
            heartbeat: HeartbeatMonitor::new(config.heartbeat),
            probe,
            response_type,
        }
    }

    /// Runs until the manager closes the session or drops every handle.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.init();

        loop {
            let deadline = self.timers.next_deadline();
            tokio::select! {
                biased;

                cmd = commands.recv() => match cmd {
                    Some(Command::Send(text)) => self.send(text),
                    Some(Command::Reconnect) => self.manual_reconnect(),
                    Some(Command::Close(ack)) => {
                        self.shutdown();
                        let _ = ack.send(());
                        return;
                    }
                    None => {
                        debug!(url = %self.url, "manager dropped, closing session");
                        self.shutdown();
                        return;
                    }
                },

                Some(event) = self.transport_rx.recv() => self.on_transport(event),

                _ = timers::sleep_until(deadline) => self.fire_expired(),
            }
        }
    }

    fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    /// Queues an event for the consumer. The channel is unbounded so the
    /// session never waits on a slow reader and never loses an event.
    fn emit(&self, event: ConnectionEvent) {
        if self.events_tx.send(event).is_err() {
            trace!("event receiver gone, dropping event");
        }
    }

    /// Discards the current handle and opens a new one.
    fn init(&mut self) {
        self.connection = None;
        self.heartbeat.stop(&mut self.timers);
        self.set_status(ConnectionStatus::Unconnected);

        self.next_generation += 1;
        let generation = self.next_generation;
        info!(url = %self.url, generation, "opening connection");
        self.connection = Some(ConnectionHandle::open(
            generation,
            &self.url,
            &self.connector,
            self.transport_tx.clone(),
        ));
    }

    pub(crate) fn on_transport(&mut self, event: TransportEvent) {
        let current = self.connection.as_ref().map(ConnectionHandle::generation);
        if current != Some(event.generation) {
            trace!(
                generation = event.generation,
                "dropping event from a superseded connection"
            );
            return;
        }

        match event.kind {
            TransportEventKind::Opened => self.on_open(),
            TransportEventKind::Message(text) => self.on_message(text),
            TransportEventKind::Closed(info) => {
                info!(url = %self.url, code = ?info.code, reason = %info.reason, "connection closed");
                self.connection_lost(ConnectionEvent::Close(info));
            }
            TransportEventKind::Failed(e) => {
                warn!(url = %self.url, error = %e, "connection failed");
                self.connection_lost(ConnectionEvent::Error(e.into()));
            }
        }
    }

    fn on_open(&mut self) {
        info!(url = %self.url, "connected");
        self.set_status(ConnectionStatus::Connected);
        self.reconnect.reset();
        self.timers.cancel(TimerKind::Reconnect);
        if self.heartbeat.enabled() {
            self.heartbeat.start(&mut self.timers);
        }
        self.emit(ConnectionEvent::Open);
    }

    fn on_message(&mut self, text: String) {
        match Envelope::parse(&text) {
            Ok(envelope) if envelope.is(&self.response_type) => {
                if self.heartbeat.enabled() && self.status().is_connected() {
                    trace!("heartbeat answered, restarting schedule");
                    self.heartbeat.on_response(&mut self.timers);
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "inbound message is not a typed envelope"),
        }
        self.emit(ConnectionEvent::Message(text));
    }

    fn connection_lost(&mut self, event: ConnectionEvent) {
        self.connection = None;
        self.heartbeat.stop(&mut self.timers);
        self.set_status(ConnectionStatus::Unconnected);
        self.emit(event);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        match self.reconnect.trigger(&mut self.timers) {
            Trigger::Scheduled { remaining, delay } => {
                info!(url = %self.url, remaining, ?delay, "reconnect scheduled");
                self.emit(ConnectionEvent::Reconnecting { remaining, delay });
            }
            Trigger::Exhausted => {
                let attempts = self.reconnect.initial();
                warn!(url = %self.url, attempts, "reconnect attempts exhausted");
                self.emit(ConnectionEvent::Error(
                    ConnectionError::ReconnectExhausted { attempts },
                ));
            }
            Trigger::Disabled => debug!(url = %self.url, "reconnect disabled"),
        }
    }

    fn fire_expired(&mut self) {
        let now = Instant::now();
        while let Some(kind) = self.timers.pop_expired(now) {
            self.on_timer(kind);
        }
    }

    fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Reconnect => {
                let remaining = self.reconnect.on_fire();
                debug!(url = %self.url, remaining, "reconnect timer fired");
                self.init();
            }
            TimerKind::Heartbeat => {
                let sent = self.send_probe();
                let verdict = self.heartbeat.on_probe(sent, &mut self.timers);
                self.on_liveness(verdict);
            }
            TimerKind::ServerTimeout => {
                let verdict = self.heartbeat.on_watchdog(&mut self.timers);
                self.on_liveness(verdict);
            }
        }
    }

    fn on_liveness(&mut self, verdict: Liveness) {
        match verdict {
            Liveness::Alive => {}
            Liveness::Missed { remaining } => {
                warn!(url = %self.url, remaining, "heartbeat missed");
            }
            Liveness::Dead => self.liveness_failure(),
        }
    }

    fn liveness_failure(&mut self) {
        warn!(url = %self.url, "heartbeat failed, peer considered gone");
        self.connection = None;
        self.set_status(ConnectionStatus::Unconnected);
        self.emit(ConnectionEvent::Error(ConnectionError::HeartbeatTimeout {
            marker: self.response_type.clone(),
        }));

        if self.reconnect.enabled() {
            self.schedule_reconnect();
        } else {
            warn!(url = %self.url, "reconnect disabled, session is dead");
        }
    }

    fn write(&self, text: String) -> Result<(), ConnectionError> {
        match &self.connection {
            Some(conn) if self.status().is_connected() => conn.send_text(text),
            _ => Err(ConnectionError::Send("not connected".into())),
        }
    }

    fn send(&mut self, text: String) {
        if let Err(e) = self.write(text) {
            warn!(url = %self.url, error = %e, "dropping outbound message");
        }
    }

    fn send_probe(&self) -> bool {
        match self.write(self.probe.clone()) {
            Ok(()) => {
                trace!("heartbeat probe sent");
                true
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "heartbeat probe not sent");
                false
            }
        }
    }

    fn manual_reconnect(&mut self) {
        info!(url = %self.url, "reconnect requested");
        if self.timers.cancel(TimerKind::Reconnect) {
            debug!(url = %self.url, "pending automatic attempt cancelled");
        }
        self.init();
    }

    fn shutdown(&mut self) {
        self.timers.cancel_all();
        self.connection = None;
        self.set_status(ConnectionStatus::Unconnected);
        info!(url = %self.url, "session closed");
    }
}

//! Resilient WebSocket sessions.
//!
//! A [`ConnectionManager`] keeps one logical session alive on top of a
//! single WebSocket connection: it reconnects with a fixed delay and a
//! bounded attempt budget, and proves liveness with a configurable
//! heartbeat (idle-timeout or missed-count detection).

pub mod config;
pub mod error;
pub(crate) mod heartbeat;
pub mod manager;
pub(crate) mod pumps;
pub(crate) mod reconnection;
pub(crate) mod session;
pub(crate) mod timers;
pub mod transport;
pub mod types;

pub use config::{
    CheckMode, CheckType, ConfigError, HeartbeatConfig, HeartbeatOptions, Options,
    ReconnectConfig, ReconnectOptions, SessionConfig,
};
pub use error::ConnectionError;
pub use manager::ConnectionManager;
pub use transport::{Connector, WsConnector, WsSink, WsStream};
pub use types::{CloseInfo, ConnectionEvent, ConnectionStatus};

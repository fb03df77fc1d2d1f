//! Session options and their validated form.
//!
//! [`Options`] mirrors the consumer-facing option object (two namespaces,
//! `reconnect` and `heartbeat`, every field optional). It can be built in
//! code, deserialised from JSON, or loaded from a TOML file:
//!
//! ```toml
//! [reconnect]
//! enable = true
//! times = 3
//! rate = 5000
//!
//! [heartbeat]
//! checkType = "timeout"
//! rate = 5000
//! timeout = 10000
//! reqObj = { type = "ping" }
//! resObj = { type = "pong" }
//! ```
//!
//! [`SessionConfig`] is the immutable value the session runs on; it is
//! produced once with `SessionConfig::try_from(options)`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wsbox_protocol::Envelope;
use wsbox_protocol::constants::{
    DEFAULT_HEARTBEAT_RATE, DEFAULT_HEARTBEAT_TIMEOUT, DEFAULT_HEARTBEAT_TIMES, DEFAULT_PING_TYPE,
    DEFAULT_PONG_TYPE, DEFAULT_RECONNECT_RATE, DEFAULT_RECONNECT_TIMES, TYPE_FIELD,
};

/// Errors raised while loading or validating options.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid option `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Consumer-facing session options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default)]
    pub reconnect: ReconnectOptions,
    #[serde(default)]
    pub heartbeat: HeartbeatOptions,
}

/// `reconnect` namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectOptions {
    /// Reconnect automatically after an error, close, or failed heartbeat.
    #[serde(default = "default_true")]
    pub enable: bool,

    /// Attempts per failure streak.
    #[serde(default = "default_reconnect_times")]
    pub times: u32,

    /// Delay before each attempt, in milliseconds.
    #[serde(default = "default_reconnect_rate")]
    pub rate: u64,
}

/// `heartbeat` namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatOptions {
    #[serde(default = "default_true")]
    pub enable: bool,

    /// Probe period in milliseconds.
    #[serde(default = "default_heartbeat_rate")]
    pub rate: u64,

    #[serde(default)]
    pub check_type: CheckType,

    /// Consecutive unanswered probes tolerated in `times` mode.
    #[serde(default = "default_heartbeat_times")]
    pub times: u32,

    /// Time the peer has to answer a probe, in milliseconds.
    #[serde(default = "default_heartbeat_timeout")]
    pub timeout: u64,

    /// Probe payload.
    #[serde(default = "default_req_obj")]
    pub req_obj: Value,

    /// Expected answer; only its `type` field is compared.
    #[serde(default = "default_res_obj")]
    pub res_obj: Value,
}

/// How a missing heartbeat answer is detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    /// Several consecutive unanswered probes.
    #[default]
    Times,
    /// A single probe left unanswered for `timeout`.
    Timeout,
}

fn default_true() -> bool {
    true
}

fn default_reconnect_times() -> u32 {
    DEFAULT_RECONNECT_TIMES
}

fn default_reconnect_rate() -> u64 {
    duration_ms(DEFAULT_RECONNECT_RATE)
}

fn default_heartbeat_rate() -> u64 {
    duration_ms(DEFAULT_HEARTBEAT_RATE)
}

fn default_heartbeat_times() -> u32 {
    DEFAULT_HEARTBEAT_TIMES
}

fn default_heartbeat_timeout() -> u64 {
    duration_ms(DEFAULT_HEARTBEAT_TIMEOUT)
}

fn default_req_obj() -> Value {
    serde_json::json!({ TYPE_FIELD: DEFAULT_PING_TYPE })
}

fn default_res_obj() -> Value {
    serde_json::json!({ TYPE_FIELD: DEFAULT_PONG_TYPE })
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            enable: default_true(),
            times: default_reconnect_times(),
            rate: default_reconnect_rate(),
        }
    }
}

impl Default for HeartbeatOptions {
    fn default() -> Self {
        Self {
            enable: default_true(),
            rate: default_heartbeat_rate(),
            check_type: CheckType::default(),
            times: default_heartbeat_times(),
            timeout: default_heartbeat_timeout(),
            req_obj: default_req_obj(),
            res_obj: default_res_obj(),
        }
    }
}

impl Options {
    /// Parses options from TOML text. Missing fields take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let options = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "session options loaded");
        Ok(options)
    }
}

/// Validated reconnect settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub enabled: bool,
    /// Attempt budget restored on every successful open.
    pub max_attempts: u32,
    pub delay: Duration,
}

/// Heartbeat failure-detection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Repeating probes; the session fails after `max_missed` unanswered ticks.
    CountBased,
    /// Idle timer plus a single watchdog per probe.
    TimeoutBased,
}

/// Validated heartbeat settings.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub check_mode: CheckMode,
    pub max_missed: u32,
    pub timeout: Duration,
    pub request: Envelope,
    /// Discriminant that marks a qualifying response.
    pub response_type: String,
}

impl HeartbeatConfig {
    /// How long one probe waits for its answer.
    ///
    /// In count mode the window never reaches the next tick, so each tick's
    /// watchdog is resolved before the following probe is sent.
    pub fn watchdog_window(&self) -> Duration {
        match self.check_mode {
            CheckMode::TimeoutBased => self.timeout,
            CheckMode::CountBased => {
                let tick_bound = self.interval - self.interval / 10;
                self.timeout.min(tick_bound).max(Duration::from_millis(1))
            }
        }
    }
}

/// Immutable configuration a session runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub reconnect: ReconnectConfig,
    pub heartbeat: HeartbeatConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig {
                enabled: true,
                max_attempts: DEFAULT_RECONNECT_TIMES,
                delay: DEFAULT_RECONNECT_RATE,
            },
            heartbeat: HeartbeatConfig {
                enabled: true,
                interval: DEFAULT_HEARTBEAT_RATE,
                check_mode: CheckMode::CountBased,
                max_missed: DEFAULT_HEARTBEAT_TIMES,
                timeout: DEFAULT_HEARTBEAT_TIMEOUT,
                request: Envelope::new(DEFAULT_PING_TYPE),
                response_type: DEFAULT_PONG_TYPE.into(),
            },
        }
    }
}

impl TryFrom<Options> for SessionConfig {
    type Error = ConfigError;

    fn try_from(options: Options) -> Result<Self, Self::Error> {
        let Options {
            reconnect,
            heartbeat,
        } = options;

        let request = Envelope::from_value(heartbeat.req_obj)
            .map_err(|e| ConfigError::invalid("heartbeat.reqObj", e.to_string()))?;
        let response = Envelope::from_value(heartbeat.res_obj)
            .map_err(|e| ConfigError::invalid("heartbeat.resObj", e.to_string()))?;
        let response_type = response
            .msg_type
            .ok_or_else(|| ConfigError::invalid("heartbeat.resObj", "missing `type` field"))?;

        if heartbeat.enable {
            if heartbeat.rate == 0 {
                return Err(ConfigError::invalid("heartbeat.rate", "must be non-zero"));
            }
            if heartbeat.timeout == 0 {
                return Err(ConfigError::invalid("heartbeat.timeout", "must be non-zero"));
            }
            if heartbeat.check_type == CheckType::Times && heartbeat.times == 0 {
                return Err(ConfigError::invalid("heartbeat.times", "must be at least 1"));
            }
        }

        Ok(Self {
            reconnect: ReconnectConfig {
                enabled: reconnect.enable,
                max_attempts: reconnect.times,
                delay: Duration::from_millis(reconnect.rate),
            },
            heartbeat: HeartbeatConfig {
                enabled: heartbeat.enable,
                interval: Duration::from_millis(heartbeat.rate),
                check_mode: match heartbeat.check_type {
                    CheckType::Times => CheckMode::CountBased,
                    CheckType::Timeout => CheckMode::TimeoutBased,
                },
                max_missed: heartbeat.times,
                timeout: Duration::from_millis(heartbeat.timeout),
                request,
                response_type,
            },
        })
    }
}

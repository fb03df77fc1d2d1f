use std::time::Duration;

/// Default discriminant of the heartbeat probe sent to the peer.
pub const DEFAULT_PING_TYPE: &str = "ping";

/// Default discriminant the peer answers a probe with.
pub const DEFAULT_PONG_TYPE: &str = "pong";

/// Name of the discriminant field in every text message.
pub const TYPE_FIELD: &str = "type";

/// Maximum inbound message size in bytes (16 MB).
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default delay between reconnect attempts.
pub const DEFAULT_RECONNECT_RATE: Duration = Duration::from_millis(5000);

/// Default number of reconnect attempts per failure streak.
pub const DEFAULT_RECONNECT_TIMES: u32 = 3;

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT_RATE: Duration = Duration::from_millis(5000);

/// Default number of consecutive unanswered probes tolerated in count mode.
pub const DEFAULT_HEARTBEAT_TIMES: u32 = 3;

/// Default time the peer has to answer a probe.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(10000);

//! Heartbeat liveness monitor.
//!
//! Two policies share the same timers:
//!
//! - **Timeout mode**: a single-shot idle timer. When it fires a probe goes
//!   out and a watchdog starts; an answer restarts the idle timer from zero,
//!   an expired watchdog fails the session.
//! - **Count mode**: a repeating ticker. Every tick sends a probe with its
//!   own watchdog; each expired watchdog costs one of `max_missed`, and the
//!   session fails when none are left. An answer refills the counter and
//!   restarts the ticker.
//!
//! The monitor never sends anything itself. The session sends the probe when
//! the heartbeat timer fires and reports back whether the write succeeded.

use crate::config::{CheckMode, HeartbeatConfig};
use crate::timers::{TimerKind, TimerSet};

/// Verdict after a heartbeat timer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Liveness {
    Alive,
    /// A probe went unanswered; `remaining` misses are still tolerated.
    Missed { remaining: u32 },
    /// The peer is considered gone. All heartbeat timers are stopped.
    Dead,
}

#[derive(Debug)]
pub(crate) struct HeartbeatMonitor {
    config: HeartbeatConfig,
    missed_remaining: u32,
}

impl HeartbeatMonitor {
    pub(crate) fn new(config: HeartbeatConfig) -> Self {
        let missed_remaining = config.max_missed;
        Self {
            config,
            missed_remaining,
        }
    }

    pub(crate) fn enabled(&self) -> bool {
        self.config.enabled
    }

    #[cfg(test)]
    pub(crate) fn missed_remaining(&self) -> u32 {
        self.missed_remaining
    }

    /// (Re)starts the schedule from zero and refills the miss counter.
    pub(crate) fn start(&mut self, timers: &mut TimerSet) {
        self.stop(timers);
        self.missed_remaining = self.config.max_missed;
        match self.config.check_mode {
            CheckMode::TimeoutBased => timers.arm(TimerKind::Heartbeat, self.config.interval),
            CheckMode::CountBased => {
                timers.arm_repeating(TimerKind::Heartbeat, self.config.interval);
            }
        }
    }

    pub(crate) fn stop(&mut self, timers: &mut TimerSet) {
        timers.cancel(TimerKind::Heartbeat);
        timers.cancel(TimerKind::ServerTimeout);
    }

    /// A qualifying response arrived.
    pub(crate) fn on_response(&mut self, timers: &mut TimerSet) {
        self.start(timers);
    }

    /// The heartbeat timer fired and the session tried to send a probe.
    ///
    /// A probe that could not be written counts as unanswered right away.
    pub(crate) fn on_probe(&mut self, sent: bool, timers: &mut TimerSet) -> Liveness {
        if sent {
            timers.arm(TimerKind::ServerTimeout, self.config.watchdog_window());
            return Liveness::Alive;
        }
        timers.cancel(TimerKind::ServerTimeout);
        self.record_miss(timers)
    }

    /// The watchdog for the last probe expired.
    pub(crate) fn on_watchdog(&mut self, timers: &mut TimerSet) -> Liveness {
        self.record_miss(timers)
    }

    fn record_miss(&mut self, timers: &mut TimerSet) -> Liveness {
        match self.config.check_mode {
            CheckMode::TimeoutBased => {
                self.stop(timers);
                Liveness::Dead
            }
            CheckMode::CountBased => {
                self.missed_remaining = self.missed_remaining.saturating_sub(1);
                if self.missed_remaining == 0 {
                    self.stop(timers);
                    Liveness::Dead
                } else {
                    Liveness::Missed {
                        remaining: self.missed_remaining,
                    }
                }
            }
        }
    }
}

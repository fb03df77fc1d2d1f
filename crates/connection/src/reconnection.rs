//! Fixed-delay, bounded-attempt reconnection.
//!
//! The controller only decides; the session task owns the connection and
//! calls back into [`ReconnectController::on_fire`] when the reconnect timer
//! expires, then re-opens.

use std::time::Duration;

use crate::config::ReconnectConfig;
use crate::timers::{TimerKind, TimerSet};

/// Outcome of [`ReconnectController::trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    /// An attempt is scheduled after `delay`.
    Scheduled { remaining: u32, delay: Duration },
    /// The budget is used up; no attempt is scheduled.
    Exhausted,
    /// Reconnection is turned off.
    Disabled,
}

#[derive(Debug)]
pub(crate) struct ReconnectController {
    enabled: bool,
    remaining: u32,
    initial: u32,
    delay: Duration,
}

impl ReconnectController {
    pub(crate) fn new(config: &ReconnectConfig) -> Self {
        Self {
            enabled: config.enabled,
            remaining: config.max_attempts,
            initial: config.max_attempts,
            delay: config.delay,
        }
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled
    }

    #[cfg(test)]
    pub(crate) fn remaining(&self) -> u32 {
        self.remaining
    }

    pub(crate) fn initial(&self) -> u32 {
        self.initial
    }

    /// Schedules the next attempt, replacing any pending one.
    pub(crate) fn trigger(&mut self, timers: &mut TimerSet) -> Trigger {
        if !self.enabled {
            return Trigger::Disabled;
        }
        if self.remaining == 0 {
            timers.cancel(TimerKind::Reconnect);
            return Trigger::Exhausted;
        }
        timers.arm(TimerKind::Reconnect, self.delay);
        Trigger::Scheduled {
            remaining: self.remaining,
            delay: self.delay,
        }
    }

    /// Consumes one attempt. Called when the reconnect timer fires, right
    /// before the session re-opens.
    pub(crate) fn on_fire(&mut self) -> u32 {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining
    }

    /// Restores the full budget after a successful open.
    pub(crate) fn reset(&mut self) {
        self.remaining = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(max_attempts: u32) -> ReconnectController {
        ReconnectController::new(&ReconnectConfig {
            enabled: true,
            max_attempts,
            delay: Duration::from_millis(5000),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_schedules_after_delay() {
        let mut timers = TimerSet::default();
        let mut ctl = controller(3);

        let outcome = ctl.trigger(&mut timers);
        assert_eq!(
            outcome,
            Trigger::Scheduled {
                remaining: 3,
                delay: Duration::from_millis(5000)
            }
        );
        assert_eq!(
            timers.deadline(TimerKind::Reconnect),
            Some(tokio::time::Instant::now() + Duration::from_millis(5000))
        );
        // Triggering does not consume budget; firing does.
        assert_eq!(ctl.remaining(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_runs_out_after_n_attempts() {
        let mut timers = TimerSet::default();
        let mut ctl = controller(2);

        for expected in [1, 0] {
            assert!(matches!(ctl.trigger(&mut timers), Trigger::Scheduled { .. }));
            assert_eq!(ctl.on_fire(), expected);
        }
        assert_eq!(ctl.trigger(&mut timers), Trigger::Exhausted);
        assert!(!timers.is_armed(TimerKind::Reconnect));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_never_schedules() {
        let mut timers = TimerSet::default();
        let mut ctl = controller(0);
        assert_eq!(ctl.trigger(&mut timers), Trigger::Exhausted);
        assert_eq!(timers.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restores_initial_budget() {
        let mut timers = TimerSet::default();
        let mut ctl = controller(3);
        ctl.trigger(&mut timers);
        ctl.on_fire();
        ctl.on_fire();
        assert_eq!(ctl.remaining(), 1);

        ctl.reset();
        assert_eq!(ctl.remaining(), ctl.initial());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_controller_does_nothing() {
        let mut timers = TimerSet::default();
        let mut ctl = ReconnectController::new(&ReconnectConfig {
            enabled: false,
            max_attempts: 3,
            delay: Duration::from_millis(10),
        });
        assert!(!ctl.enabled());
        assert_eq!(ctl.trigger(&mut timers), Trigger::Disabled);
        assert!(!timers.is_armed(TimerKind::Reconnect));
    }
}

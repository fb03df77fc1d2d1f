//! Deadline-based timers owned by the session task.
//!
//! Every timer kind has a single slot. Arming a slot replaces whatever was
//! there, so a kind can never have two live instances. Because the session
//! task is the only reader, cancelling a slot before its deadline is enough
//! to guarantee it never fires.

use std::time::Duration;

use tokio::time::Instant;

/// The three timer categories a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TimerKind {
    /// Waits out the reconnect delay before the next open attempt.
    Reconnect,
    /// Heartbeat idle timer (timeout mode) or probe ticker (count mode).
    Heartbeat,
    /// Watchdog waiting for the peer to answer a probe.
    ServerTimeout,
}

impl TimerKind {
    /// Firing order for timers sharing a deadline: a watchdog is judged
    /// before the next probe goes out.
    const ALL: [TimerKind; 3] = [
        TimerKind::ServerTimeout,
        TimerKind::Heartbeat,
        TimerKind::Reconnect,
    ];

    fn slot(self) -> usize {
        match self {
            TimerKind::ServerTimeout => 0,
            TimerKind::Heartbeat => 1,
            TimerKind::Reconnect => 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    deadline: Instant,
    period: Option<Duration>,
}

/// Named set of optional timers with cancel-before-replace semantics.
#[derive(Debug, Default)]
pub(crate) struct TimerSet {
    slots: [Option<Timer>; 3],
}

impl TimerSet {
    /// Arms a single-shot timer, replacing any live timer of the same kind.
    pub(crate) fn arm(&mut self, kind: TimerKind, delay: Duration) {
        self.slots[kind.slot()] = Some(Timer {
            deadline: Instant::now() + delay,
            period: None,
        });
    }

    /// Arms a repeating timer whose first expiry is one `period` from now.
    pub(crate) fn arm_repeating(&mut self, kind: TimerKind, period: Duration) {
        self.slots[kind.slot()] = Some(Timer {
            deadline: Instant::now() + period,
            period: Some(period),
        });
    }

    /// Cancels a timer. Returns `true` if one was live.
    pub(crate) fn cancel(&mut self, kind: TimerKind) -> bool {
        self.slots[kind.slot()].take().is_some()
    }

    pub(crate) fn cancel_all(&mut self) {
        self.slots = [None; 3];
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self, kind: TimerKind) -> bool {
        self.slots[kind.slot()].is_some()
    }

    pub(crate) fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.slots[kind.slot()].map(|t| t.deadline)
    }

    /// Earliest deadline across all live timers.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().flatten().map(|t| t.deadline).min()
    }

    /// Removes and returns the earliest timer whose deadline has passed.
    ///
    /// Repeating timers are re-armed one period later; if the session fell
    /// behind by more than a period the next expiry is pushed out from `now`
    /// instead of firing a burst.
    pub(crate) fn pop_expired(&mut self, now: Instant) -> Option<TimerKind> {
        let kind = TimerKind::ALL
            .into_iter()
            .filter_map(|k| self.deadline(k).map(|d| (d, k)))
            .filter(|(d, _)| *d <= now)
            .min_by_key(|(d, _)| *d)
            .map(|(_, k)| k)?;

        let slot = &mut self.slots[kind.slot()];
        *slot = slot.and_then(|timer| {
            timer.period.map(|period| {
                let next = timer.deadline + period;
                Timer {
                    deadline: if next <= now { now + period } else { next },
                    period: Some(period),
                }
            })
        });
        Some(kind)
    }
}

/// Sleeps until `deadline`, or forever when no timer is armed.
pub(crate) async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

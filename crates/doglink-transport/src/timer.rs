//! Software one-shot timers.
//!
//! Time is a monotonically increasing millisecond counter owned by the bank.
//! The host loop advances it; the state machines only arm and cancel.

use tracing::trace;

use crate::traits::Timers;

/// Timers used by the link state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Inter-byte watchdog while a frame is being received.
    ReceiveWatchdog,
    /// Inter-byte watchdog while a frame is being transmitted.
    TransmitWatchdog,
    /// Session lost-link deadline.
    LostLink,
}

impl TimerId {
    /// Number of distinct timers.
    pub const COUNT: usize = 3;

    /// All timers in slot order.
    pub const ALL: [TimerId; Self::COUNT] = [
        TimerId::ReceiveWatchdog,
        TimerId::TransmitWatchdog,
        TimerId::LostLink,
    ];

    fn slot(self) -> usize {
        match self {
            TimerId::ReceiveWatchdog => 0,
            TimerId::TransmitWatchdog => 1,
            TimerId::LostLink => 2,
        }
    }

    /// Short name for logs.
    pub fn name(self) -> &'static str {
        match self {
            TimerId::ReceiveWatchdog => "receive-watchdog",
            TimerId::TransmitWatchdog => "transmit-watchdog",
            TimerId::LostLink => "lost-link",
        }
    }
}

/// A fixed set of one-shot timers driven by an external clock.
#[derive(Debug, Default, Clone)]
pub struct TimerBank {
    now_ms: u64,
    deadlines: [Option<u64>; TimerId::COUNT],
}

impl TimerBank {
    /// Create a bank with the clock at zero and nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current clock value in milliseconds.
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Whether `id` is currently armed.
    pub fn is_armed(&self, id: TimerId) -> bool {
        self.deadlines[id.slot()].is_some()
    }

    /// Absolute deadline of `id`, if armed.
    pub fn deadline(&self, id: TimerId) -> Option<u64> {
        self.deadlines[id.slot()]
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.deadlines.iter().flatten().copied().min()
    }

    /// Advance the clock by `elapsed_ms` and collect expired timers.
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<TimerId> {
        let now = self.now_ms.saturating_add(elapsed_ms);
        self.advance_to(now)
    }

    /// Move the clock to `now_ms` and collect expired timers in deadline order.
    ///
    /// The clock never runs backwards; an earlier `now_ms` is ignored.
    /// Each expired timer is disarmed and reported once.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<TimerId> {
        self.now_ms = self.now_ms.max(now_ms);

        let mut expired: Vec<(u64, TimerId)> = TimerId::ALL
            .iter()
            .filter_map(|&id| match self.deadlines[id.slot()] {
                Some(deadline) if deadline <= self.now_ms => Some((deadline, id)),
                _ => None,
            })
            .collect();
        expired.sort_by_key(|&(deadline, id)| (deadline, id.slot()));

        for &(_, id) in &expired {
            self.deadlines[id.slot()] = None;
            trace!(timer = id.name(), now = self.now_ms, "timer expired");
        }

        expired.into_iter().map(|(_, id)| id).collect()
    }
}

impl Timers for TimerBank {
    fn arm(&mut self, id: TimerId, duration_ms: u64) {
        self.deadlines[id.slot()] = Some(self.now_ms.saturating_add(duration_ms));
    }

    fn cancel(&mut self, id: TimerId) {
        self.deadlines[id.slot()] = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_at_deadline() {
        let mut bank = TimerBank::new();
        bank.arm(TimerId::ReceiveWatchdog, 10);

        assert!(bank.advance(9).is_empty());
        assert_eq!(bank.advance(1), vec![TimerId::ReceiveWatchdog]);
        assert!(bank.advance(100).is_empty());
        assert!(!bank.is_armed(TimerId::ReceiveWatchdog));
    }

    #[test]
    fn rearm_replaces_deadline() {
        let mut bank = TimerBank::new();
        bank.arm(TimerId::LostLink, 10);
        bank.advance(8);
        bank.arm(TimerId::LostLink, 10);

        assert!(bank.advance(5).is_empty());
        assert_eq!(bank.deadline(TimerId::LostLink), Some(18));
        assert_eq!(bank.advance(5), vec![TimerId::LostLink]);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut bank = TimerBank::new();
        bank.arm(TimerId::TransmitWatchdog, 5);
        bank.cancel(TimerId::TransmitWatchdog);
        assert!(bank.advance(50).is_empty());
    }

    #[test]
    fn expiries_reported_in_deadline_order() {
        let mut bank = TimerBank::new();
        bank.arm(TimerId::LostLink, 3);
        bank.arm(TimerId::ReceiveWatchdog, 7);
        bank.arm(TimerId::TransmitWatchdog, 3);

        assert_eq!(bank.next_deadline(), Some(3));
        assert_eq!(
            bank.advance_to(10),
            vec![
                TimerId::TransmitWatchdog,
                TimerId::LostLink,
                TimerId::ReceiveWatchdog
            ]
        );
        assert_eq!(bank.next_deadline(), None);
    }

    #[test]
    fn clock_never_runs_backwards() {
        let mut bank = TimerBank::new();
        bank.advance_to(100);
        bank.advance_to(40);
        assert_eq!(bank.now(), 100);
    }
}

//! Deadline scheduling for the single-threaded event loop.
//!
//! All timed behavior in the widget (interim decay, delayed restart, the
//! copy acknowledgment) runs off one primitive: a deadline that the main
//! loop polls each tick. Arming again before expiry replaces the previous
//! deadline, which is the cancel-on-supersede debounce the widget needs.

use std::time::{Duration, Instant};

/// A one-shot deadline that can be re-armed or cancelled at any time.
#[derive(Debug, Default)]
pub struct Countdown {
    deadline: Option<Instant>,
}

impl Countdown {
    /// Schedule (or reschedule) the deadline `after` from `now`.
    pub fn arm(&mut self, now: Instant, after: Duration) {
        self.deadline = Some(now + after);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// True exactly once when the deadline has passed; disarms on fire.
    pub fn fired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

//! Typing indicator debounce.
//!
//! Pure state: callers pass the current instant and emit the returned
//! signals, so the rules can be checked without timers.

use std::time::Duration;

use tokio::time::Instant;

/// Default idle time after the last keystroke
pub const TYPING_IDLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct TypingDebouncer {
    idle: Duration,
    /// Set while typing; `typing:stop` is due once it passes
    deadline: Option<Instant>,
}

impl Default for TypingDebouncer {
    fn default() -> Self {
        Self::new(TYPING_IDLE)
    }
}

impl TypingDebouncer {
    pub fn new(idle: Duration) -> Self {
        Self {
            idle,
            deadline: None,
        }
    }

    pub fn is_typing(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Record a keystroke. Returns true when `typing:start` should be sent.
    pub fn keystroke(&mut self, now: Instant) -> bool {
        let started = self.deadline.is_none();
        self.deadline = Some(now + self.idle);
        started
    }

    /// Returns true when the idle deadline has passed and `typing:stop`
    /// should be sent.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Stop immediately (message sent). Returns true when `typing:stop`
    /// should be sent.
    pub fn stop(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

//! Server-driven countdown display.
//!
//! The server is the only clock. [`TimerSync`] never counts down on its own:
//! the displayed value changes only when a tick arrives or a phase change
//! resets it to the round maximum.

use std::fmt;

/// Seconds at or below which the countdown is shown as urgent.
pub const URGENT_THRESHOLD: i32 = 10;

/// Seconds at or below which the countdown is shown as a warning.
pub const WARNING_THRESHOLD: i32 = 15;

/// Seconds at or below which the countdown ring pulses.
pub const PULSE_THRESHOLD: i32 = 5;

/// Display color band for the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerZone {
    /// More than 15 seconds left.
    Normal,
    /// 11 to 15 seconds left.
    Warning,
    /// 10 seconds or less.
    Urgent,
}

impl TimerZone {
    /// Classifies a remaining-seconds value.
    pub fn for_seconds(seconds: i32) -> Self {
        if seconds <= URGENT_THRESHOLD {
            Self::Urgent
        } else if seconds <= WARNING_THRESHOLD {
            Self::Warning
        } else {
            Self::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for TimerZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last countdown value reported by the server.
#[derive(Debug, Clone)]
pub struct TimerSync {
    round_seconds: i32,
    remaining: i32,
}

impl TimerSync {
    /// Creates a timer showing the full round.
    pub fn new(round_seconds: i32) -> Self {
        Self {
            round_seconds,
            remaining: round_seconds,
        }
    }

    /// Replaces the displayed value with a server tick.
    pub fn tick(&mut self, remaining_seconds: i32) {
        self.remaining = remaining_seconds;
    }

    /// Shows the full round again until the next tick arrives.
    pub fn reset(&mut self) {
        self.remaining = self.round_seconds;
    }

    pub fn remaining(&self) -> i32 {
        self.remaining
    }

    pub fn round_seconds(&self) -> i32 {
        self.round_seconds
    }

    pub fn zone(&self) -> TimerZone {
        TimerZone::for_seconds(self.remaining)
    }

    /// Fraction of the round left, in `0.0..=1.0` for well-formed ticks.
    pub fn progress(&self) -> f64 {
        if self.round_seconds <= 0 {
            return 0.0;
        }
        (f64::from(self.remaining) / f64::from(self.round_seconds)).max(0.0)
    }

    pub fn is_pulsing(&self) -> bool {
        self.remaining <= PULSE_THRESHOLD
    }
}

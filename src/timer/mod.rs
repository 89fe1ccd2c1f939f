//! # Timers with thread-safe callback invalidation.
//!
//! A timer is created, bound to a native callback plus the context it must run on,
//! started, and eventually released. Fires travel through two liveness checks:
//!
//! ```text
//! TimerSource task ── tick ──► deliver_timer_fire(token)
//!                                 │ lock table: bound? ── no ──► drop
//!                                 ▼ yes
//!                         post to bound context
//!                                 │ lock table: still bound? ── no ──► drop
//!                                 ▼ yes (lock released)
//!                         native.timer_call(callback, context)
//! ```
//!
//! `release` clears the binding under the same lock before cancelling the
//! schedule, so once it returns no new invocation can begin.

mod bridge;
mod source;

pub use bridge::TimerBridge;
pub use source::{FireFn, TimerSource, TokioTimerSource};

use std::fmt;
use std::time::Duration;

/// Opaque timer identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

impl TimerToken {
    /// Rebuilds a token from the value handed to the native side.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// How a started timer fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerMode {
    /// Single fire after the period.
    OneShot,
    /// Fire immediately, then every period.
    Repeating,
}

/// Resolved schedule of a running timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// Fires once after `delay`.
    Once { delay: Duration },
    /// Fires after `initial`, then every `period`.
    Repeating { initial: Duration, period: Duration },
}

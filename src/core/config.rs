//! # Bridge configuration.
//!
//! Provides [`BridgeConfig`], the settings consumed by [`BridgeBuilder`](crate::BridgeBuilder).
//!
//! ## Sentinel values
//! - `grace = 0s` → shutdown does not wait for execution contexts to drain
//! - `min_timer_period = 0s` → treated as 1ms (a repeating timer must make progress)

use std::time::Duration;

/// Configuration for a [`Bridge`](crate::Bridge).
///
/// ## Field semantics
/// - `main_context_name`: name of [`ContextId::MAIN`](crate::ContextId::MAIN) in logs
/// - `observe_method`: method invoked on subscribers for every native notification
/// - `grace`: maximum wait for contexts to stop on shutdown (`0s` = no wait)
/// - `min_timer_period`: lower clamp for repeating periods
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over checking sentinels directly.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Name of the main execution context.
    pub main_context_name: String,

    /// Subscriber method called as `observe_method(type: int, payload: Object)`.
    pub observe_method: String,

    /// Maximum time to wait for execution contexts during shutdown.
    ///
    /// If exceeded, [`Bridge::shutdown`](crate::Bridge::shutdown) returns
    /// [`BridgeError::GraceExceeded`](crate::BridgeError::GraceExceeded).
    pub grace: Duration,

    /// Repeating periods shorter than this are raised to it.
    pub min_timer_period: Duration,
}

impl BridgeConfig {
    /// Returns the shutdown grace as an `Option`.
    ///
    /// - `None` → do not wait
    /// - `Some(d)` → wait at most `d`
    #[inline]
    pub fn shutdown_grace(&self) -> Option<Duration> {
        if self.grace.is_zero() {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Returns the minimum repeating period, never below 1ms.
    #[inline]
    pub fn min_timer_period_clamped(&self) -> Duration {
        self.min_timer_period.max(Duration::from_millis(1))
    }
}

impl Default for BridgeConfig {
    /// Default configuration:
    ///
    /// - `main_context_name = "main"`
    /// - `observe_method = "onObserve"`
    /// - `grace = 5s`
    /// - `min_timer_period = 1ms`
    fn default() -> Self {
        Self {
            main_context_name: "main".to_string(),
            observe_method: "onObserve".to_string(),
            grace: Duration::from_secs(5),
            min_timer_period: Duration::from_millis(1),
        }
    }
}

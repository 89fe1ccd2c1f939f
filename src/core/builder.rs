use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{bridge::Bridge, config::BridgeConfig};
use crate::{
    error::BridgeError,
    executor::ExecutionContexts,
    native::NativeCore,
    notify::NotificationHub,
    timer::{TimerBridge, TimerSource, TokioTimerSource},
};

/// Builder for constructing a [`Bridge`] with optional components.
pub struct BridgeBuilder {
    cfg: BridgeConfig,
    native: Arc<dyn NativeCore>,
    timer_source: Option<Arc<dyn TimerSource>>,
}

impl BridgeBuilder {
    /// Creates a new builder over `native` with the given configuration.
    pub fn new(cfg: BridgeConfig, native: Arc<dyn NativeCore>) -> Self {
        Self {
            cfg,
            native,
            timer_source: None,
        }
    }

    /// Replaces the default tokio-backed timer source.
    pub fn with_timer_source(mut self, source: Arc<dyn TimerSource>) -> Self {
        self.timer_source = Some(source);
        self
    }

    /// Builds the bridge.
    ///
    /// Spawns the main execution context, allocates the native listener and wires
    /// the timer bridge. Must be called from within a tokio runtime.
    pub fn build(self) -> Result<Bridge, BridgeError> {
        let root = CancellationToken::new();
        let contexts = ExecutionContexts::new(self.cfg.main_context_name.as_str(), root.clone());

        let hub = NotificationHub::new(
            Arc::clone(&self.native),
            contexts.main().clone(),
            self.cfg.observe_method.as_str(),
        )?;

        let source = self
            .timer_source
            .unwrap_or_else(|| Arc::new(TokioTimerSource::new()));
        let timers = TimerBridge::new(
            self.native,
            Arc::clone(&contexts),
            source,
            self.cfg.min_timer_period_clamped(),
        );

        Ok(Bridge::new_internal(
            self.cfg,
            contexts,
            Arc::new(hub),
            timers,
            root,
        ))
    }
}

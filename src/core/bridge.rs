//! # Bridge: the surface the native core talks to.
//!
//! The [`Bridge`] owns the execution contexts, the [`NotificationHub`] and the
//! [`TimerBridge`], and exposes the two entry points the native side calls into.
//!
//! ## Architecture
//! ```text
//! native core
//!   ├─ deliver_event(type, payload) ──► NotificationHub ──► WeakSubscriberSet ──► [main ctx]
//!   └─ deliver_timer_fire(token)    ──► TimerBridge ── bound? ──► [bound ctx] ──► timer_call
//!
//! Shutdown path:
//!   shutdown()
//!     └─► hub.release_now() on the main context (unregister all types, free listener)
//!     └─► timers.release_all()
//!     └─► root token cancelled → every context worker stops
//!     └─► wait up to cfg.grace:
//!            ├─ all stopped → Ok(())
//!            └─ timeout     → Err(BridgeError::GraceExceeded)
//! ```
//!
//! ## Example
//! ```rust,ignore
//! let bridge = Bridge::builder(BridgeConfig::default(), native).build()?;
//! bridge.hub().subscribe(NotificationType::new(3), &observer)?;
//! bridge.deliver_event(NotificationType::new(3), Value::from("ready"));
//! bridge.shutdown().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{builder::BridgeBuilder, config::BridgeConfig};
use crate::error::BridgeError;
use crate::executor::{ContextId, ExecutionContext, ExecutionContexts};
use crate::native::NativeCore;
use crate::notify::{NotificationHub, NotificationType};
use crate::subscribers::Value;
use crate::timer::{TimerBridge, TimerToken};

/// Entry point tying notifications, timers and execution contexts together.
pub struct Bridge {
    cfg: BridgeConfig,
    contexts: Arc<ExecutionContexts>,
    hub: Arc<NotificationHub>,
    timers: Arc<TimerBridge>,
    root: CancellationToken,
}

impl Bridge {
    /// Starts building a bridge over `native`.
    pub fn builder(cfg: BridgeConfig, native: Arc<dyn NativeCore>) -> BridgeBuilder {
        BridgeBuilder::new(cfg, native)
    }

    pub(super) fn new_internal(
        cfg: BridgeConfig,
        contexts: Arc<ExecutionContexts>,
        hub: Arc<NotificationHub>,
        timers: Arc<TimerBridge>,
        root: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            contexts,
            hub,
            timers,
            root,
        }
    }

    /// Native → managed notification.
    pub fn deliver_event(&self, ty: NotificationType, payload: Value) {
        self.hub.on_native_event(ty, payload);
    }

    /// Native → managed timer tick, for timers driven outside the configured source.
    pub fn deliver_timer_fire(&self, token: TimerToken) {
        self.timers.deliver_timer_fire(token);
    }

    /// Returns the notification hub.
    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    /// Returns the timer bridge.
    pub fn timers(&self) -> &Arc<TimerBridge> {
        &self.timers
    }

    /// Returns the main execution context.
    pub fn main_context(&self) -> &ExecutionContext {
        self.contexts.main()
    }

    /// Spawns an additional execution context.
    pub fn spawn_context(&self, name: impl Into<Arc<str>>) -> ExecutionContext {
        self.contexts.spawn(name)
    }

    /// Looks up a context by id.
    pub fn context(&self, id: ContextId) -> Result<ExecutionContext, BridgeError> {
        self.contexts.get(id)
    }

    /// Returns the configuration the bridge was built with.
    pub fn config(&self) -> &BridgeConfig {
        &self.cfg
    }

    /// True once shutdown has begun.
    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Releases the hub and every timer, then stops all execution contexts.
    ///
    /// Returns [`BridgeError::GraceExceeded`] if the contexts did not stop within
    /// [`BridgeConfig::grace`]. Calling it again is harmless.
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        self.release_hub_on_main().await;

        let timers = self.timers.release_all();
        debug!(timers, "timers released for shutdown");

        let grace = self.cfg.shutdown_grace().unwrap_or(Duration::ZERO);
        if self.contexts.shutdown(grace).await {
            debug!("bridge shut down");
            Ok(())
        } else {
            warn!(?grace, "bridge shutdown exceeded grace");
            Err(BridgeError::GraceExceeded { grace })
        }
    }

    async fn release_hub_on_main(&self) {
        let (tx, rx) = oneshot::channel();
        let hub = Arc::clone(&self.hub);
        let posted = self.contexts.main().post_or_run(move || {
            hub.release_now();
            let _ = tx.send(());
        });

        // A closed context drops the job, and with it the sender.
        if posted.is_err() || rx.await.is_err() {
            self.hub.release_now();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use parking_lot::Mutex;

    use super::*;
    use crate::native::CallbackRef;
    use crate::native::mock::{MockNative, NativeCall};
    use crate::subscribers::{MethodTable, Observe, Subscriber};
    use crate::timer::TimerMode;

    #[derive(Default)]
    struct Inbox {
        got: Mutex<Vec<(i32, Value)>>,
    }

    impl Observe for Inbox {
        fn methods() -> &'static MethodTable<Self> {
            static TABLE: LazyLock<MethodTable<Inbox>> = LazyLock::new(|| {
                MethodTable::new()
                    .method2("handle", |i: &Inbox, ty: i32, payload: Value| {
                        i.got.lock().push((ty, payload));
                        Ok(())
                    })
            });
            &TABLE
        }
    }

    fn bridge(native: &Arc<MockNative>) -> Bridge {
        let cfg = BridgeConfig {
            observe_method: "handle".to_string(),
            grace: Duration::from_secs(1),
            ..BridgeConfig::default()
        };
        let core: Arc<dyn NativeCore> = native.clone();
        Bridge::builder(cfg, core).build().unwrap()
    }

    async fn drain(ctx: &ExecutionContext) {
        let (tx, rx) = oneshot::channel();
        ctx.post(move || {
            let _ = tx.send(());
        })
        .unwrap();
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn events_use_configured_method() {
        let native = MockNative::new();
        let bridge = bridge(&native);
        let inbox = Arc::new(Inbox::default());
        let sub: Arc<dyn Subscriber> = inbox.clone();

        bridge.hub().subscribe(NotificationType::new(3), &sub).unwrap();
        bridge.deliver_event(NotificationType::new(3), Value::Int(42));
        drain(bridge.main_context()).await;

        assert_eq!(*inbox.got.lock(), vec![(3, Value::Int(42))]);
    }

    #[tokio::test(start_paused = true)]
    async fn timers_call_back_through_native() {
        let native = MockNative::new();
        let bridge = bridge(&native);
        let timers = bridge.timers();

        let t = timers.create_timer();
        timers.bind(t, CallbackRef(9), ContextId::MAIN).unwrap();
        timers
            .start(t, TimerMode::OneShot, Duration::from_millis(20))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(native.fires().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_releases_everything() {
        let native = MockNative::new();
        let bridge = bridge(&native);
        let inbox = Arc::new(Inbox::default());
        let sub: Arc<dyn Subscriber> = inbox.clone();
        bridge.hub().subscribe(NotificationType::new(1), &sub).unwrap();
        let extra = bridge.spawn_context("extra");
        let t = bridge.timers().create_timer();

        bridge.shutdown().await.unwrap();

        assert!(bridge.is_shut_down());
        assert!(bridge.hub().is_released());
        assert!(bridge.main_context().is_closed());
        assert!(extra.is_closed());
        assert_eq!(bridge.timers().timer_count(), 0);
        assert!(!bridge.timers().is_bound(t));
        assert_eq!(native.count(|c| *c == NativeCall::Unregister(1)), 1);
        assert_eq!(native.count(|c| matches!(c, NativeCall::Free { .. })), 1);

        bridge.shutdown().await.unwrap();
        assert_eq!(native.count(|c| matches!(c, NativeCall::Free { .. })), 1);
    }

    #[tokio::test]
    async fn zero_grace_does_not_wait() {
        let native = MockNative::new();
        let core: Arc<dyn NativeCore> = native.clone();
        let cfg = BridgeConfig {
            grace: Duration::ZERO,
            ..BridgeConfig::default()
        };
        let bridge = Bridge::builder(cfg, core).build().unwrap();

        bridge.shutdown().await.unwrap();
        assert!(bridge.hub().is_released());
    }
}

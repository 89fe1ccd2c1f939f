//! # observer-bridge
//!
//! **observer-bridge** connects a native core to Rust observers and timers.
//!
//! Subscribers are held weakly and grouped by integer notification type; the
//! native core is told which types have listeners and calls back when one fires.
//! Timers are driven by tokio and invoke a native callback on a chosen execution
//! context, with invalidation that is safe against concurrent release.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                         ┌──────────────────────────────┐
//!                         │         native core          │
//!                         │   (impl NativeCore for ..)   │
//!                         └──┬───────────────────────▲───┘
//!         deliver_event(ty, v)│                       │register_interest / unregister_interest
//!      deliver_timer_fire(tk) │                       │timer_call / native_free / post_notification
//!                             ▼                       │
//! ┌───────────────────────────────────────────────────┴───────────────┐
//! │  Bridge                                                           │
//! │  - NotificationHub (type → WeakSubscriberSet, listener handle)    │
//! │  - TimerBridge     (token table, TimerSource)                     │
//! │  - ExecutionContexts (main + spawned serialized job queues)       │
//! └──────┬────────────────────────────────────┬───────────────────────┘
//!        ▼                                    ▼
//!   WeakSubscriberSet                   TimerSource task
//!   (ObserverRegistry<WeakRef>)         (sleep / interval)
//!        │ one job per live subscriber        │ tick → bound? → post
//!        ▼                                    ▼
//!   [context queue] ──► sub.invoke()    [context queue] ──► bound? ──► native.timer_call()
//! ```
//!
//! ### Subscription lifecycle
//! ```text
//! subscribe(ty, s) ── first for ty? ──► register_interest(ty) ── Err ──► nothing inserted
//!        │                                    │ Ok
//!        ▼                                    ▼
//!   set[ty].add(Weak(s))  ◄───────────── new set[ty]
//!
//! unsubscribe(ty, s) ─► remove + prune dead ─► empty? ─► unregister_interest(ty), drop set
//! release / Drop     ─► unregister every ty ─► native_free(listener, tag)   (exactly once)
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                               |
//! |-------------------|------------------------------------------------------------------|--------------------------------------------------|
//! | **Registry**      | Ordered observers, safe removal during iteration.                | [`ObserverRegistry`]                             |
//! | **Subscribers**   | Weakly-held fan-out with name-based dispatch.                    | [`WeakSubscriberSet`], [`Subscriber`], [`Observe`], [`MethodTable`] |
//! | **Notifications** | Type-keyed hub mirrored to the native core.                      | [`NotificationHub`], [`NotificationType`]        |
//! | **Timers**        | One-shot and repeating timers with safe invalidation.            | [`TimerBridge`], [`TimerSource`], [`TimerToken`] |
//! | **Contexts**      | Serialized job queues callbacks are marshaled onto.              | [`ExecutionContext`], [`ContextId`]              |
//! | **Native**        | The boundary trait and exactly-once handle ownership.            | [`NativeCore`], [`ResourceHandle`]               |
//! | **Errors**        | Typed errors with stable log labels.                             | [`BridgeError`], [`DispatchError`]               |
//! | **Configuration** | Centralize bridge settings.                                      | [`BridgeConfig`]                                 |
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, LazyLock};
//! use observer_bridge::{
//!     Bridge, BridgeConfig, CallbackRef, ContextId, MethodTable, NativeCore, NativeError,
//!     NotificationType, Observe, RawHandle, Subscriber, Value,
//! };
//!
//! struct Core;
//!
//! impl NativeCore for Core {
//!     fn allocate_listener(&self) -> Result<RawHandle, NativeError> { Ok(1) }
//!     fn register_interest(&self, _: NotificationType) -> Result<(), NativeError> { Ok(()) }
//!     fn unregister_interest(&self, _: NotificationType) -> Result<(), NativeError> { Ok(()) }
//!     fn post_notification(&self, _: NotificationType, _: &Value) -> Result<(), NativeError> { Ok(()) }
//!     fn timer_call(&self, cb: CallbackRef, ctx: ContextId) { println!("{cb} on {ctx}"); }
//!     fn native_free(&self, _: RawHandle, _: u32) -> Result<(), NativeError> { Ok(()) }
//! }
//!
//! struct Screen;
//!
//! impl Observe for Screen {
//!     fn methods() -> &'static MethodTable<Self> {
//!         static TABLE: LazyLock<MethodTable<Screen>> = LazyLock::new(|| {
//!             MethodTable::new().method2("onObserve", |_: &Screen, ty: i32, info: Value| {
//!                 println!("notification {ty}: {info:?}");
//!                 Ok(())
//!             })
//!         });
//!         &TABLE
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bridge = Bridge::builder(BridgeConfig::default(), Arc::new(Core)).build()?;
//!
//!     let screen: Arc<dyn Subscriber> = Arc::new(Screen);
//!     bridge.hub().subscribe(NotificationType::new(3), &screen)?;
//!     bridge.deliver_event(NotificationType::new(3), Value::from("ready"));
//!
//!     bridge.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod executor;
mod native;
mod notify;
mod registry;
mod subscribers;
mod timer;

// ---- Public re-exports ----

pub use self::core::{Bridge, BridgeBuilder, BridgeConfig};
pub use error::{BridgeError, DispatchError, NativeError, RegistryError};
pub use executor::{ContextId, ExecutionContext, ExecutionContexts, Job};
pub use native::{CallbackRef, NativeCore, RawHandle, ResourceHandle, ResourceType};
pub use notify::{NotificationHub, NotificationType};
pub use registry::{Iter, ObserverRegistry};
pub use subscribers::{
    DispatchReport, FromValue, MethodResult, MethodTable, Observe, ParamType, Signature,
    Subscriber, Value, WeakRef, WeakSubscriberSet,
};
pub use timer::{FireFn, Schedule, TimerBridge, TimerMode, TimerSource, TimerToken, TokioTimerSource};

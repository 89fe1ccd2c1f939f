//! # Native core boundary.
//!
//! The bridge talks to the native runtime only through the [`NativeCore`] trait.
//! Everything the bridge *consumes* from the native side is a method here; the
//! calls the native side makes *into* the bridge live on [`Bridge`](crate::Bridge)
//! (`deliver_event`, `deliver_timer_fire`).
//!
//! ```text
//!   managed side (this crate)                       native core
//!   ─────────────────────────                       ───────────
//!   NotificationHub ── register_interest(type) ───►
//!                   ── unregister_interest(type) ─►
//!                   ── post_notification(..) ─────►
//!   ResourceHandle  ── native_free(id, tag) ──────►
//!   TimerBridge     ── timer_call(cb, ctx) ───────►
//!
//!   Bridge ◄── deliver_event(type, payload) ────────
//!          ◄── deliver_timer_fire(token) ───────────
//! ```
//!
//! Implementations must be callable from any thread. The native runtime is
//! assumed to be loaded before the bridge is built.

mod handle;
#[cfg(test)]
pub(crate) mod mock;

pub use handle::ResourceHandle;

use std::fmt;

use crate::error::NativeError;
use crate::executor::ContextId;
use crate::notify::NotificationType;
use crate::subscribers::Value;

/// Raw identifier of a native-owned object.
pub type RawHandle = u64;

/// Tag passed to [`NativeCore::native_free`] so the native side knows which
/// deallocator to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Native counterpart of a [`NotificationHub`](crate::NotificationHub).
    Listener,
    /// Native timer state.
    Timer,
    /// Implementation-defined resource kind.
    Other(u32),
}

impl ResourceType {
    /// Numeric tag understood by the native deallocation entry point.
    pub fn as_tag(self) -> u32 {
        match self {
            ResourceType::Listener => 1,
            ResourceType::Timer => 2,
            ResourceType::Other(tag) => tag,
        }
    }
}

/// Opaque reference to a native callback target, bound to a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackRef(pub u64);

impl fmt::Display for CallbackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cb#{:x}", self.0)
    }
}

/// Entry points the bridge consumes from the native runtime.
///
/// ### Implementation requirements
/// - Methods may be called from arbitrary threads, including execution context workers.
/// - Methods must not call back into the bridge synchronously while holding their own locks.
/// - `register_interest` / `unregister_interest` may deliver events into the hub,
///   but must not subscribe or unsubscribe from inside the call.
/// - `native_free` and `unregister_interest` run during teardown; their errors are logged and dropped.
pub trait NativeCore: Send + Sync + 'static {
    /// Allocates the native counterpart of a notification hub.
    fn allocate_listener(&self) -> Result<RawHandle, NativeError>;

    /// Declares interest in notifications of `ty`.
    fn register_interest(&self, ty: NotificationType) -> Result<(), NativeError>;

    /// Withdraws interest in notifications of `ty`.
    fn unregister_interest(&self, ty: NotificationType) -> Result<(), NativeError>;

    /// Posts a managed-side notification into the native core.
    fn post_notification(&self, ty: NotificationType, payload: &Value) -> Result<(), NativeError>;

    /// Invokes the native callback bound to a timer.
    ///
    /// Called on the execution context the timer was bound to.
    fn timer_call(&self, callback: CallbackRef, context: ContextId);

    /// Releases a native object.
    fn native_free(&self, id: RawHandle, tag: u32) -> Result<(), NativeError>;

    /// Returns the name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

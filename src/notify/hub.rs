//! # NotificationHub: type → subscriber set, mirrored to the native core.
//!
//! ## Rules
//! - Exactly one `register_interest(type)` per empty → non-empty transition.
//! - Exactly one `unregister_interest(type)` per non-empty → empty transition
//!   (dead references are pruned before the emptiness check).
//! - A failed registration inserts nothing and is returned to the caller.
//! - Native events for a type with no entry are dropped.
//! - Teardown unregisters every remaining type (continuing past failures) and
//!   then frees the listener handle, exactly once, whether through
//!   [`NotificationHub::release`] or `Drop`.
//! - `register_interest` / `unregister_interest` run with the type map
//!   unlocked, so the native side may deliver events from inside them.
//!   Transitions are serialized by a second lock; native code must not
//!   subscribe or unsubscribe from inside those two calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::NotificationType;
use crate::error::BridgeError;
use crate::executor::ExecutionContext;
use crate::native::{NativeCore, ResourceHandle, ResourceType};
use crate::subscribers::{Subscriber, Value, WeakSubscriberSet};

type SubscriberSet = WeakSubscriberSet<dyn Subscriber>;

/// Routes native notifications to weakly-held subscribers.
pub struct NotificationHub {
    types: Mutex<HashMap<NotificationType, Arc<SubscriberSet>>>,
    transitions: Mutex<()>,
    handle: Mutex<ResourceHandle>,
    native: Arc<dyn NativeCore>,
    context: ExecutionContext,
    observe_method: Arc<str>,
    released: AtomicBool,
}

impl NotificationHub {
    /// Allocates the native listener and creates an empty hub.
    ///
    /// Subscribers are invoked on `context` with `observe_method(type, payload)`.
    pub fn new(
        native: Arc<dyn NativeCore>,
        context: ExecutionContext,
        observe_method: impl Into<Arc<str>>,
    ) -> Result<Self, BridgeError> {
        let id = native
            .allocate_listener()
            .map_err(|e| BridgeError::native("allocate_listener", e))?;
        debug!(listener = id, native = native.name(), "notification hub created");

        Ok(Self {
            types: Mutex::new(HashMap::new()),
            transitions: Mutex::new(()),
            handle: Mutex::new(ResourceHandle::new(
                id,
                ResourceType::Listener,
                Arc::clone(&native),
            )),
            native,
            context,
            observe_method: observe_method.into(),
            released: AtomicBool::new(false),
        })
    }

    /// Adds `subscriber` for `ty`, registering interest on the first one.
    pub fn subscribe(
        &self,
        ty: NotificationType,
        subscriber: &Arc<dyn Subscriber>,
    ) -> Result<(), BridgeError> {
        if self.is_released() {
            return Err(BridgeError::Released);
        }
        if self.add_to_existing(ty, subscriber) {
            return Ok(());
        }

        let _transition = self.transitions.lock();
        if self.is_released() {
            return Err(BridgeError::Released);
        }
        if self.add_to_existing(ty, subscriber) {
            return Ok(());
        }

        self.native
            .register_interest(ty)
            .map_err(|e| BridgeError::native("register_interest", e))?;

        let set = SubscriberSet::new(self.context.clone());
        set.add_observer(subscriber);
        self.types.lock().insert(ty, Arc::new(set));
        debug!(notification_type = %ty, "interest registered");
        Ok(())
    }

    /// Adds to the set for `ty` if one exists; `false` means none does.
    fn add_to_existing(&self, ty: NotificationType, subscriber: &Arc<dyn Subscriber>) -> bool {
        let types = self.types.lock();
        let Some(set) = types.get(&ty) else {
            return false;
        };
        if !set.add_observer(subscriber) {
            debug!(notification_type = %ty, subscriber = subscriber.name(), "already subscribed");
        }
        true
    }

    /// Removes `subscriber` from `ty`; returns `false` if it was not subscribed.
    ///
    /// When no live subscriber remains the type is unregistered natively.
    pub fn unsubscribe(&self, ty: NotificationType, subscriber: &Arc<dyn Subscriber>) -> bool {
        let _transition = self.transitions.lock();
        let (removed, emptied) = {
            let mut types = self.types.lock();
            let Some(set) = types.get(&ty) else {
                return false;
            };

            let removed = set.remove_observer(subscriber);
            let pruned = set.purge();
            if pruned > 0 {
                trace!(notification_type = %ty, pruned, "dead subscribers pruned");
            }

            let emptied = set.is_empty();
            if emptied {
                types.remove(&ty);
            }
            (removed, emptied)
        };

        if emptied {
            self.unregister(ty);
        }
        removed
    }

    /// Entry point for notifications raised by the native core.
    ///
    /// Runs inline when already on the hub's context, otherwise one job per
    /// subscriber is posted there.
    pub fn on_native_event(&self, ty: NotificationType, payload: Value) {
        let Some(set) = self.types.lock().get(&ty).cloned() else {
            trace!(notification_type = %ty, "no subscribers; event dropped");
            return;
        };

        let args = vec![Value::Int(ty.get()), payload];
        if self.context.is_current() {
            let report = set.notify_immediate(&self.observe_method, &args);
            trace!(notification_type = %ty, ?report, "notification delivered inline");
        } else {
            let posted = set.notify(&self.observe_method, args);
            trace!(notification_type = %ty, posted, "notification queued");
        }
    }

    /// Sends a notification from this side into the native core.
    pub fn post(&self, ty: NotificationType, payload: &Value) -> Result<(), BridgeError> {
        if self.is_released() {
            return Err(BridgeError::Released);
        }
        self.native
            .post_notification(ty, payload)
            .map_err(|e| BridgeError::native("post_notification", e))
    }

    /// Tears the hub down on its owning context.
    ///
    /// Runs inline when already there; falls back to inline teardown when the
    /// context no longer accepts jobs.
    pub fn release(self: &Arc<Self>) {
        let hub = Arc::clone(self);
        if let Err(err) = self.context.post_or_run(move || hub.release_now()) {
            debug!(error = %err, "owning context closed; releasing inline");
            self.release_now();
        }
    }

    /// Tears the hub down on the calling thread.
    ///
    /// Idempotent. Native failures are logged and suppressed.
    pub fn release_now(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let _transition = self.transitions.lock();
        let drained: Vec<NotificationType> = {
            let mut types = self.types.lock();
            let mut keys: Vec<NotificationType> = types.keys().copied().collect();
            keys.sort_unstable();
            types.clear();
            keys
        };
        for ty in drained {
            self.unregister(ty);
        }
        self.handle.lock().free();
        debug!("notification hub released");
    }

    /// True once teardown has started.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Returns the types that currently have a subscriber entry, sorted.
    pub fn subscribed_types(&self) -> Vec<NotificationType> {
        let mut types: Vec<NotificationType> = self.types.lock().keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Returns the number of live subscribers for `ty`.
    pub fn subscriber_count(&self, ty: NotificationType) -> usize {
        let set = self.types.lock().get(&ty).cloned();
        set.map_or(0, |s| s.live_count())
    }

    fn unregister(&self, ty: NotificationType) {
        match self.native.unregister_interest(ty) {
            Ok(()) => debug!(notification_type = %ty, "interest unregistered"),
            Err(err) => {
                warn!(notification_type = %ty, error = %err, "unregister_interest failed")
            }
        }
    }
}

impl Drop for NotificationHub {
    fn drop(&mut self) {
        self.release_now();
    }
}

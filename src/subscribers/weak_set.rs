//! # Weakly-held subscriber set with context-marshaled fan-out.
//!
//! [`WeakSubscriberSet`] stores [`Weak`] references in an [`ObserverRegistry`], so
//! registration never keeps a subscriber alive. Fan-out skips entries whose
//! target is gone.
//!
//! ## Architecture
//! ```text
//! notify("onObserve", args)
//!     │
//!     ├─ A (alive) ──► post ──► [context queue] ──► A.invoke()
//!     ├─ B (dead)  ──► skipped
//!     └─ C (alive) ──► post ──► [context queue] ──► C.invoke()
//!                                                     └─► error / panic → logged
//! ```
//!
//! ## Rules
//! - Adding the same subscriber twice is a no-op.
//! - Each live subscriber gets its own job; jobs run in iteration order on the context.
//! - The job holds a strong reference, so a subscriber dropped after posting still runs once.
//! - Per-subscriber failures are logged and counted, never propagated.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use tracing::{trace, warn};

use super::subscriber::Subscriber;
use super::value::Value;
use crate::error::{DispatchError, panic_message};
use crate::executor::ExecutionContext;
use crate::registry::ObserverRegistry;

/// Weak reference compared by target identity.
pub struct WeakRef<S: ?Sized>(Weak<S>);

impl<S: ?Sized> WeakRef<S> {
    /// Downgrades `target`.
    pub fn new(target: &Arc<S>) -> Self {
        Self(Arc::downgrade(target))
    }

    /// Returns the target when it is still alive.
    pub fn upgrade(&self) -> Option<Arc<S>> {
        self.0.upgrade()
    }

    /// True when this reference points at `target`.
    pub fn points_to(&self, target: &Arc<S>) -> bool {
        std::ptr::addr_eq(self.0.as_ptr(), Arc::as_ptr(target))
    }

    /// True once the target has been dropped.
    pub fn is_dead(&self) -> bool {
        self.0.strong_count() == 0
    }
}

impl<S: ?Sized> Clone for WeakRef<S> {
    fn clone(&self) -> Self {
        Self(Weak::clone(&self.0))
    }
}

impl<S: ?Sized> PartialEq for WeakRef<S> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(self.0.as_ptr(), other.0.as_ptr())
    }
}

impl<S: ?Sized> fmt::Debug for WeakRef<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakRef")
            .field(&self.0.as_ptr().cast::<()>())
            .finish()
    }
}

/// Outcome of an immediate fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscribers whose method completed successfully.
    pub delivered: usize,
    /// Subscribers whose method failed or panicked.
    pub failed: usize,
    /// Entries skipped because the target was gone.
    pub skipped_dead: usize,
}

/// Set of weakly-held subscribers dispatched on one execution context.
pub struct WeakSubscriberSet<S: ?Sized + Subscriber> {
    observers: ObserverRegistry<WeakRef<S>>,
    context: ExecutionContext,
}

impl<S: ?Sized + Subscriber> WeakSubscriberSet<S> {
    /// Creates an empty set whose deferred fan-out runs on `context`.
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            observers: ObserverRegistry::new(),
            context,
        }
    }

    /// Returns the context deferred fan-out runs on.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Adds `observer`; returns `false` if it was already present.
    pub fn add_observer(&self, observer: &Arc<S>) -> bool {
        let weak = WeakRef::new(observer);
        if self.observers.contains(&weak) {
            return false;
        }
        self.observers.add(weak).is_ok()
    }

    /// Removes `observer`; returns `false` if it was not present.
    pub fn remove_observer(&self, observer: &Arc<S>) -> bool {
        self.observers
            .remove_first(|w| w.points_to(observer))
            .is_some()
    }

    /// True when no entries remain, dead or alive.
    ///
    /// Slots removed during an in-flight pass do not count.
    pub fn is_empty(&self) -> bool {
        self.observers.live_len() == 0
    }

    /// Number of entries whose target is still alive.
    pub fn live_count(&self) -> usize {
        self.observers
            .iter()
            .filter(|w| !w.is_dead())
            .count()
    }

    /// Drops entries whose target is gone; returns how many were removed.
    pub fn purge(&self) -> usize {
        self.observers.remove_all(WeakRef::is_dead)
    }

    /// Posts one job per live subscriber to the set's context.
    ///
    /// Returns the number of jobs posted.
    pub fn notify(&self, method: &str, args: Vec<Value>) -> usize {
        let method: Arc<str> = method.into();
        let args: Arc<[Value]> = args.into();
        let mut posted = 0;

        for weak in self.observers.iter() {
            let Some(target) = weak.upgrade() else {
                trace!(%method, "skipping dead subscriber");
                continue;
            };
            let method_for_job = Arc::clone(&method);
            let args_for_job = Arc::clone(&args);
            let job = move || {
                let _ = dispatch(&*target, &method_for_job, &args_for_job);
            };
            match self.context.post(job) {
                Ok(()) => posted += 1,
                Err(err) => {
                    warn!(%method, context = %self.context.id(), error = %err, "fan-out job rejected");
                }
            }
        }
        posted
    }

    /// Invokes `method` on every live subscriber synchronously on the calling thread.
    pub fn notify_immediate(&self, method: &str, args: &[Value]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for weak in self.observers.iter() {
            let Some(target) = weak.upgrade() else {
                report.skipped_dead += 1;
                continue;
            };
            match dispatch(&*target, method, args) {
                Ok(()) => report.delivered += 1,
                Err(_) => report.failed += 1,
            }
        }
        report
    }
}

impl<S: ?Sized + Subscriber> fmt::Debug for WeakSubscriberSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSubscriberSet")
            .field("entries", &self.observers.live_len())
            .field("context", &self.context.id())
            .finish()
    }
}

/// Invokes one subscriber with panic isolation; failures are logged here.
fn dispatch<S: ?Sized + Subscriber>(
    target: &S,
    method: &str,
    args: &[Value],
) -> Result<(), DispatchError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| target.invoke(method, args)))
        .unwrap_or_else(|payload| {
            Err(DispatchError::Panicked {
                method: method.to_string(),
                info: panic_message(&*payload),
            })
        });

    if let Err(err) = &result {
        warn!(
            subscriber = target.name(),
            method,
            label = err.as_label(),
            error = %err,
            "subscriber dispatch failed"
        );
    }
    result
}

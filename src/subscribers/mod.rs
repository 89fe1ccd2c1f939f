//! # Subscribers and name-based dispatch.
//!
//! Everything needed to call "method `name` with these arguments" on an observer
//! whose concrete type the caller does not know.
//!
//! ## Architecture
//! ```text
//! WeakSubscriberSet<dyn Subscriber>
//!     │  Weak refs in an ObserverRegistry
//!     ▼
//! Subscriber::invoke(method, &[Value])
//!     │  blanket impl for Observe types
//!     ▼
//! MethodTable<T> ── (name, Signature::of(args)) ──► handler(&T, args)
//! ```
//!
//! ## Contents
//! - [`Value`], [`ParamType`] tagged arguments and their narrowed slots
//! - [`MethodTable`], [`Signature`], [`FromValue`] per-type callable registry
//! - [`Subscriber`], [`Observe`] the dispatch seam
//! - [`WeakSubscriberSet`], [`DispatchReport`] weakly-held fan-out

mod method;
mod subscriber;
mod value;
mod weak_set;

pub use method::{FromValue, MethodResult, MethodTable, Signature};
pub use subscriber::{Observe, Subscriber};
pub use value::{ParamType, Value};
pub use weak_set::{DispatchReport, WeakRef, WeakSubscriberSet};
